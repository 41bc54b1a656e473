//! Request and result types flowing through the pipeline.

use bytes::Bytes;
use url::Url;

use crate::format::ImageFormat;

/// The source URL as decoded from the path, before policy checks.
///
/// URLs like `http://` cannot be represented by [`Url`] at all, yet they
/// must reach the policy stage so the caller learns the host is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceUri {
    /// A fully parsed absolute URL.
    Absolute(Url),
    /// An absolute URL with an empty authority.
    MissingHost {
        /// The scheme, lowercased.
        scheme: String,
    },
}

impl SourceUri {
    /// The URL scheme, lowercased.
    #[must_use]
    pub fn scheme(&self) -> &str {
        match self {
            Self::Absolute(url) => url.scheme(),
            Self::MissingHost { scheme } => scheme,
        }
    }

    /// The host, if present and non-empty.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Absolute(url) => url.host_str().filter(|h| !h.is_empty()),
            Self::MissingHost { .. } => None,
        }
    }
}

/// A request as read off the path, not yet checked against policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRequest {
    /// Where to fetch the image from.
    pub source: SourceUri,
    /// Requested width; any integer at this stage.
    pub width: i64,
    /// Requested height; any integer at this stage.
    pub height: i64,
    /// Output format from the `.extension`, `None` for the native format.
    pub output: Option<ImageFormat>,
}

/// A request that passed every policy check.
///
/// The URL is `http`/`https` with a whitelisted host and both dimensions
/// lie in `1..=max_dimension`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    url: Url,
    width: u32,
    height: u32,
    output: Option<ImageFormat>,
}

impl ProxyRequest {
    /// Assemble a validated request.
    ///
    /// Only the policy validator should call this; it is public so the
    /// validator can live in another crate.
    #[must_use]
    pub fn new_unchecked(url: Url, width: u32, height: u32, output: Option<ImageFormat>) -> Self {
        Self {
            url,
            width,
            height,
            output,
        }
    }

    /// The source URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Target width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Target height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The requested output format, if any.
    #[must_use]
    pub fn output(&self) -> Option<ImageFormat> {
        self.output
    }
}

/// A validated origin response: an allowed image content type and the
/// fully buffered body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// The image bytes.
    pub bytes: Bytes,
    /// The origin's content type.
    pub content_type: ImageFormat,
}

/// A resized image ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    /// Encoded image bytes.
    pub bytes: Bytes,
    /// Format the bytes are encoded in.
    pub format: ImageFormat,
    /// Value for the `Cache-Control` header.
    pub cache_control: String,
}
