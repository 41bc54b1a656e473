//! Image resizing.
//!
//! [`Transform`] is the seam between the gateway and the image library.
//! Implementations are synchronous and CPU bound; the gateway runs them on
//! the blocking pool.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use pixgate_model::{ImageFormat, ProxyError};

use crate::config::ProxyConfig;

/// Failure decoding, resizing, or encoding an image.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// The source bytes are not a decodable image.
    #[error("failed to decode source image: {0}")]
    Decode(#[source] image::ImageError),

    /// The resized image could not be encoded.
    #[error("failed to encode {format}: {source}")]
    Encode {
        /// Target format.
        format: ImageFormat,
        /// Underlying encoder error.
        #[source]
        source: image::ImageError,
    },

    /// The worker running the transform failed.
    #[error("transform worker failed: {0}")]
    Worker(String),
}

impl From<TransformError> for ProxyError {
    fn from(err: TransformError) -> Self {
        Self::Transform(err.to_string())
    }
}

/// Resizes an encoded image into another encoded image.
pub trait Transform: Send + Sync + 'static {
    /// Resize `bytes` to fit `width` x `height` and encode it as `format`.
    fn resize(
        &self,
        bytes: &[u8],
        width: u32,
        height: u32,
        format: ImageFormat,
    ) -> Result<Bytes, TransformError>;
}

/// [`Transform`] backed by the `image` crate.
///
/// The image is scaled to fit inside the target box with its aspect ratio
/// preserved, so one side may come out smaller than requested.
#[derive(Debug, Clone, Copy)]
pub struct ImageResizer {
    jpeg_quality: u8,
    filter: FilterType,
}

impl Default for ImageResizer {
    fn default() -> Self {
        Self {
            jpeg_quality: 85,
            filter: FilterType::Lanczos3,
        }
    }
}

impl ImageResizer {
    /// Create a resizer with the default quality and filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resizer using the configured JPEG quality.
    #[must_use]
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new().with_jpeg_quality(config.jpeg_quality)
    }

    /// Set the JPEG quality, clamped to `1..=100`.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    fn encode(&self, img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, TransformError> {
        let mut buf = Cursor::new(Vec::new());
        let result = match format.canonical() {
            ImageFormat::Jpeg | ImageFormat::Jpg => {
                let encoder = JpegEncoder::new_with_quality(&mut buf, self.jpeg_quality);
                img.to_rgb8().write_with_encoder(encoder)
            }
            ImageFormat::Png => img.to_rgba8().write_to(&mut buf, image::ImageFormat::Png),
            ImageFormat::Gif => img.to_rgba8().write_to(&mut buf, image::ImageFormat::Gif),
        };
        result.map_err(|source| TransformError::Encode { format, source })?;
        Ok(buf.into_inner())
    }
}

impl Transform for ImageResizer {
    fn resize(
        &self,
        bytes: &[u8],
        width: u32,
        height: u32,
        format: ImageFormat,
    ) -> Result<Bytes, TransformError> {
        let img = image::load_from_memory(bytes).map_err(TransformError::Decode)?;
        let resized = img.resize(width, height, self.filter);
        self.encode(&resized, format).map(Bytes::from)
    }
}
