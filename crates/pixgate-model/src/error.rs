//! Error types for the Pixgate request pipeline.
//!
//! Every stage of the pipeline (decoding, policy, fetch, transform) reports
//! failures as a [`ProxyError`]. The `Display` text of the client-facing
//! variants is the exact body returned to the caller, so it is part of the
//! public contract and must not change casually.

use std::fmt;
use std::time::Duration;

use http::StatusCode;

/// The requested dimension an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// The `:width` path segment.
    Width,
    /// The `:height` path segment.
    Height,
}

impl Dimension {
    /// Returns the dimension name as used in error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Width => "width",
            Self::Height => "height",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a [`ProxyError`].
///
/// The kind alone decides the HTTP status code of the error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed path: bad base64, URL, integers or extension.
    Decode,
    /// Request is well-formed but violates the configured policy.
    Policy,
    /// The origin answered, but not with an acceptable image.
    Fetch,
    /// The whole fetch did not finish before its deadline.
    Timeout,
    /// Transport, transform, or otherwise unexpected failure.
    Internal,
}

/// Terminal error for a single proxied request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    /// The request path does not match `/:url/:width/:height(.:ext)?`.
    #[error("Not Found")]
    RouteNotFound,

    /// The URL segment is not valid base64 or does not hold a URL.
    #[error("Expected a valid URL")]
    InvalidUrl,

    /// A dimension segment is not a base-10 integer.
    #[error("Expected {0} to be an integer")]
    NotAnInteger(Dimension),

    /// The height segment carries an unknown `.extension`.
    #[error("Expected extension to be gif, jpeg, png or jpg")]
    UnsupportedExtension {
        /// The extension as sent by the client.
        extension: String,
    },

    /// The source URL scheme is neither `http` nor `https`.
    #[error("Expected URI scheme to be HTTP or HTTPS")]
    UnsupportedScheme {
        /// The rejected scheme.
        scheme: String,
    },

    /// The source URL has no host.
    #[error("Expected URI host to be non-empty")]
    EmptyHost,

    /// The source (or redirect target) host is not whitelisted.
    #[error("Expected URI host to be whitelisted")]
    HostNotWhitelisted {
        /// The rejected host.
        host: String,
    },

    /// A dimension is above the configured ceiling.
    #[error("Expected {dimension} to be less than or equal to {max}")]
    DimensionTooLarge {
        /// Which dimension was rejected.
        dimension: Dimension,
        /// The configured ceiling.
        max: u32,
    },

    /// A dimension is zero or negative.
    #[error("Expected {dimension} to be greater than or equal to 1")]
    DimensionTooSmall {
        /// Which dimension was rejected.
        dimension: Dimension,
    },

    /// The origin answered with something other than `200`.
    ///
    /// A `301`/`302` without a usable `Location` reports the redirect's own
    /// status here, not the status of some later hop.
    #[error("Expected response code 200, got {0}")]
    UnexpectedStatus(u16),

    /// The origin's `Content-Type` is missing or not an allowed image type.
    #[error("Expected content type image/gif, image/jpeg, image/png, image/jpg, got {0}")]
    UnsupportedContentType(String),

    /// The redirect chain exceeded the hop limit or looped.
    #[error("Expected at most {0} redirects")]
    TooManyRedirects(usize),

    /// The origin body exceeded the configured size cap.
    #[error("Expected response body to be at most {0} bytes")]
    BodyTooLarge(usize),

    /// The fetch deadline expired.
    #[error("origin did not respond within {0:?}")]
    Timeout(Duration),

    /// The origin could not be reached or the connection failed mid-way.
    #[error("origin request failed: {0}")]
    Origin(String),

    /// The resize transform failed.
    #[error("image transform failed: {0}")]
    Transform(String),

    /// Any other unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RouteNotFound
            | Self::InvalidUrl
            | Self::NotAnInteger(_)
            | Self::UnsupportedExtension { .. } => ErrorKind::Decode,
            Self::UnsupportedScheme { .. }
            | Self::EmptyHost
            | Self::HostNotWhitelisted { .. }
            | Self::DimensionTooLarge { .. }
            | Self::DimensionTooSmall { .. } => ErrorKind::Policy,
            Self::UnexpectedStatus(_)
            | Self::UnsupportedContentType(_)
            | Self::TooManyRedirects(_)
            | Self::BodyTooLarge(_) => ErrorKind::Fetch,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Origin(_) | Self::Transform(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status code for the error response.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Decode | ErrorKind::Policy | ErrorKind::Fetch => StatusCode::NOT_FOUND,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The body shown to the client, if any.
    ///
    /// Timeouts and internal failures expose nothing.
    #[must_use]
    pub fn public_message(&self) -> Option<String> {
        match self.kind() {
            ErrorKind::Decode | ErrorKind::Policy | ErrorKind::Fetch => Some(self.to_string()),
            ErrorKind::Timeout | ErrorKind::Internal => None,
        }
    }
}

/// Convenience result type for pipeline stages.
pub type ProxyResult<T> = Result<T, ProxyError>;
