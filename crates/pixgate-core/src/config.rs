//! Pixgate configuration.
//!
//! Provides [`ProxyConfig`], the immutable settings injected into every
//! pipeline stage. Values are loaded from environment variables once at
//! startup and never mutated afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Default `User-Agent` sent to origins.
const DEFAULT_USER_AGENT: &str = concat!("pixgate/", env!("CARGO_PKG_VERSION"));

/// Pixgate service configuration.
///
/// # Examples
///
/// ```
/// use pixgate_core::config::ProxyConfig;
///
/// let config = ProxyConfig::builder()
///     .whitelist(vec!["images.example.com".into()])
///     .build();
/// assert_eq!(config.max_dimension, 1000);
/// assert_eq!(config.max_redirects, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Bind address for the gateway (e.g. `"0.0.0.0:8080"`).
    #[builder(default = String::from("0.0.0.0:8080"))]
    pub gateway_listen: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Hosts images may be fetched from. Subdomains of an entry are allowed.
    #[builder(default)]
    pub whitelist: Vec<String>,

    /// Deadline for the whole fetch, redirects and body included.
    #[builder(default = 5_000)]
    pub fetch_timeout_ms: u64,

    /// Maximum number of redirects followed per fetch.
    #[builder(default = 10)]
    pub max_redirects: usize,

    /// Largest accepted width or height.
    #[builder(default = 1000)]
    pub max_dimension: u32,

    /// Largest origin body buffered, in bytes.
    #[builder(default = 20 * 1024 * 1024)]
    pub max_body_bytes: usize,

    /// `max-age` of the `Cache-Control` header on renditions, in seconds.
    #[builder(default = 31_536_000)]
    pub cache_max_age: u64,

    /// Quality used when encoding JPEG renditions, `1..=100`.
    #[builder(default = 85)]
    pub jpeg_quality: u8,

    /// `User-Agent` sent to origins.
    #[builder(default = String::from(DEFAULT_USER_AGENT))]
    pub user_agent: String,

    /// Whether origins with invalid TLS certificates are accepted.
    #[builder(default = false)]
    pub accept_invalid_certs: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ProxyConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:8080` |
    /// | `LOG_LEVEL` | `info` |
    /// | `PIXGATE_WHITELIST` | *(empty)* |
    /// | `PIXGATE_FETCH_TIMEOUT_MS` | `5000` |
    /// | `PIXGATE_MAX_REDIRECTS` | `10` |
    /// | `PIXGATE_MAX_DIMENSION` | `1000` |
    /// | `PIXGATE_MAX_BODY_BYTES` | `20971520` |
    /// | `PIXGATE_CACHE_MAX_AGE` | `31536000` |
    /// | `PIXGATE_JPEG_QUALITY` | `85` |
    /// | `PIXGATE_USER_AGENT` | `pixgate/<version>` |
    /// | `PIXGATE_ACCEPT_INVALID_CERTS` | `false` |
    ///
    /// Unparseable numeric values are ignored and the default kept.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Used by [`from_env`](Self::from_env); tests pass a map instead of
    /// touching the process environment.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = lookup("PIXGATE_WHITELIST") {
            config.whitelist = parse_list(&v);
        }
        if let Some(n) = lookup("PIXGATE_FETCH_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.fetch_timeout_ms = n;
        }
        if let Some(n) = lookup("PIXGATE_MAX_REDIRECTS").and_then(|v| v.parse().ok()) {
            config.max_redirects = n;
        }
        if let Some(n) = lookup("PIXGATE_MAX_DIMENSION").and_then(|v| v.parse().ok()) {
            config.max_dimension = n;
        }
        if let Some(n) = lookup("PIXGATE_MAX_BODY_BYTES").and_then(|v| v.parse().ok()) {
            config.max_body_bytes = n;
        }
        if let Some(n) = lookup("PIXGATE_CACHE_MAX_AGE").and_then(|v| v.parse().ok()) {
            config.cache_max_age = n;
        }
        if let Some(n) = lookup("PIXGATE_JPEG_QUALITY").and_then(|v| v.parse().ok()) {
            config.jpeg_quality = n;
        }
        if let Some(v) = lookup("PIXGATE_USER_AGENT") {
            config.user_agent = v;
        }
        if let Some(v) = lookup("PIXGATE_ACCEPT_INVALID_CERTS") {
            config.accept_invalid_certs = parse_bool(&v);
        }

        config
    }

    /// The fetch deadline as a [`Duration`].
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// The `Cache-Control` value attached to renditions.
    #[must_use]
    pub fn cache_control(&self) -> String {
        format!("max-age={}, public", self.cache_max_age)
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
