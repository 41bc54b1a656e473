//! Request policy: scheme, host whitelist, and dimension bounds.
//!
//! The validator is built once from [`ProxyConfig`] and shared read-only by
//! every request. It is applied twice in a request's life: to the decoded
//! request before any network I/O, and to each redirect target while the
//! fetch pipeline follows a chain.

use pixgate_model::{DecodedRequest, Dimension, ProxyError, ProxyRequest, ProxyResult, SourceUri};
use url::Url;

use crate::config::ProxyConfig;

/// Set of hosts images may be fetched from.
///
/// An entry matches the identical host and every subdomain of it, ignoring
/// ASCII case: `example.com` matches `example.com` and `cdn.example.com`
/// but not `badexample.com`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    entries: Vec<String>,
}

impl Whitelist {
    /// Build a whitelist, normalizing case and stripping leading/trailing dots.
    #[must_use]
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|e| e.as_ref().trim().trim_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { entries }
    }

    /// Whether `host` is allowed.
    #[must_use]
    pub fn allows(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.entries.iter().any(|entry| {
            host == *entry
                || host
                    .strip_suffix(entry.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Whether the whitelist is empty (and therefore rejects every host).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Enforces scheme, host, and dimension rules.
#[derive(Debug, Clone)]
pub struct PolicyValidator {
    whitelist: Whitelist,
    max_dimension: u32,
}

impl PolicyValidator {
    /// Create a validator.
    #[must_use]
    pub fn new(whitelist: Whitelist, max_dimension: u32) -> Self {
        Self {
            whitelist,
            max_dimension,
        }
    }

    /// Create a validator from the service configuration.
    #[must_use]
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(Whitelist::new(&config.whitelist), config.max_dimension)
    }

    /// Validate a decoded request.
    ///
    /// Rules are checked in a fixed order and the first violation wins:
    /// scheme, non-empty host, whitelist, width, height.
    pub fn validate(&self, request: DecodedRequest) -> ProxyResult<ProxyRequest> {
        self.check_source(&request.source)?;
        let width = self.check_dimension(request.width, Dimension::Width)?;
        let height = self.check_dimension(request.height, Dimension::Height)?;

        let SourceUri::Absolute(url) = request.source else {
            // check_source rejects every host-less source.
            return Err(ProxyError::EmptyHost);
        };
        Ok(ProxyRequest::new_unchecked(url, width, height, request.output))
    }

    /// Validate a URL the pipeline is about to request, e.g. a redirect target.
    pub fn check_url(&self, url: &Url) -> ProxyResult<()> {
        self.check_source(&SourceUri::Absolute(url.clone()))
    }

    fn check_source(&self, source: &SourceUri) -> ProxyResult<()> {
        let scheme = source.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ProxyError::UnsupportedScheme {
                scheme: scheme.to_owned(),
            });
        }

        let Some(host) = source.host() else {
            return Err(ProxyError::EmptyHost);
        };

        if !self.whitelist.allows(host) {
            return Err(ProxyError::HostNotWhitelisted {
                host: host.to_owned(),
            });
        }

        Ok(())
    }

    fn check_dimension(&self, value: i64, dimension: Dimension) -> ProxyResult<u32> {
        if value > i64::from(self.max_dimension) {
            return Err(ProxyError::DimensionTooLarge {
                dimension,
                max: self.max_dimension,
            });
        }
        if value < 1 {
            return Err(ProxyError::DimensionTooSmall { dimension });
        }
        u32::try_from(value).map_err(|_| ProxyError::DimensionTooLarge {
            dimension,
            max: self.max_dimension,
        })
    }
}
