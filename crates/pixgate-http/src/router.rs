//! Request routing.
//!
//! Pixgate serves a single resource, `GET /:url/:width/:height(.:ext)?`,
//! plus health probes. Segments are handed on still percent-encoded; the
//! decoder owns their interpretation.

use http::Method;
use pixgate_model::ProxyError;

/// Paths answered with a health payload.
const HEALTH_PATHS: [&str; 2] = ["/_health", "/health"];

/// The raw segments of an image request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRoute {
    /// Base64 source URL segment.
    pub url: String,
    /// Width segment.
    pub width: String,
    /// Height segment, possibly with a `.extension`.
    pub height: String,
}

/// What a request is asking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Liveness probe.
    Health,
    /// A resize request.
    Image(ImageRoute),
}

/// Resolve a request to a [`Route`].
///
/// Anything other than a `GET` with exactly three non-empty segments is
/// [`ProxyError::RouteNotFound`]. A single trailing slash is tolerated.
pub fn resolve(method: &Method, path: &str) -> Result<Route, ProxyError> {
    if *method != Method::GET {
        return Err(ProxyError::RouteNotFound);
    }
    if HEALTH_PATHS.contains(&path) {
        return Ok(Route::Health);
    }

    let path = path.strip_prefix('/').ok_or(ProxyError::RouteNotFound)?;
    let path = path.strip_suffix('/').unwrap_or(path);

    let segments: Vec<&str> = path.split('/').collect();
    let [url, width, height] = segments.as_slice() else {
        return Err(ProxyError::RouteNotFound);
    };
    if [url, width, height].iter().any(|s| s.is_empty()) {
        return Err(ProxyError::RouteNotFound);
    }

    Ok(Route::Image(ImageRoute {
        url: (*url).to_owned(),
        width: (*width).to_owned(),
        height: (*height).to_owned(),
    }))
}
