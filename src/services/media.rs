use std::io::Cursor;

use async_trait::async_trait;
use image::{imageops::FilterType, ImageFormat};

/// Contract for media post-processing.
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Produce square thumbnail bytes of `edge` pixels from source bytes.
    async fn thumbnail(
        &self,
        content_type: &str,
        data: &[u8],
        edge: u32,
    ) -> Result<Vec<u8>, MediaError>;
}

/// Thumbnail generation backed by the `image` crate.
///
/// Source images are center-cropped to a square and re-encoded as PNG.
pub struct ImageMediaProcessor;

#[async_trait]
impl MediaProcessor for ImageMediaProcessor {
    async fn thumbnail(
        &self,
        content_type: &str,
        data: &[u8],
        edge: u32,
    ) -> Result<Vec<u8>, MediaError> {
        let format = ImageFormat::from_mime_type(content_type)
            .ok_or_else(|| MediaError::UnsupportedContentType(content_type.to_string()))?;

        let source = image::load_from_memory_with_format(data, format)?;
        let thumbnail = source.resize_to_fill(edge, edge, FilterType::Lanczos3);

        let mut out = Cursor::new(Vec::new());
        thumbnail.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),
}
