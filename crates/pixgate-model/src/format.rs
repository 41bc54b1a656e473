//! Image formats accepted from origins and produced for clients.

use std::fmt;

use mime::Mime;

/// Content types an origin may answer with, in the order they are reported.
pub const ALLOWED_CONTENT_TYPES: [&str; 4] = ["image/gif", "image/jpeg", "image/png", "image/jpg"];

/// An image format, either as a requested `.extension` or as an origin
/// content type.
///
/// `Jpg` and `Jpeg` are kept apart because both spellings appear on the
/// wire; they encode identically and are served as `image/jpeg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// `gif` / `image/gif`.
    Gif,
    /// `jpeg` / `image/jpeg`.
    Jpeg,
    /// `png` / `image/png`.
    Png,
    /// `jpg` / `image/jpg`.
    Jpg,
}

impl ImageFormat {
    /// Look up a path extension (without the leading dot).
    ///
    /// Matching is exact: `PNG` is not `png`.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "gif" => Some(Self::Gif),
            "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "jpg" => Some(Self::Jpg),
            _ => None,
        }
    }

    /// Look up a bare content type (parameters already stripped).
    ///
    /// Matching is case-sensitive against [`ALLOWED_CONTENT_TYPES`].
    #[must_use]
    pub fn from_content_type(essence: &str) -> Option<Self> {
        match essence {
            "image/gif" => Some(Self::Gif),
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/jpg" => Some(Self::Jpg),
            _ => None,
        }
    }

    /// The canonical extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Jpg => "jpg",
        }
    }

    /// Collapse `Jpg` into `Jpeg`.
    #[must_use]
    pub fn canonical(self) -> Self {
        match self {
            Self::Jpg => Self::Jpeg,
            other => other,
        }
    }

    /// The content type served for an image encoded in this format.
    #[must_use]
    pub fn mime(self) -> Mime {
        match self.canonical() {
            Self::Gif => mime::IMAGE_GIF,
            Self::Png => mime::IMAGE_PNG,
            Self::Jpeg | Self::Jpg => mime::IMAGE_JPEG,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
