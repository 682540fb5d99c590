//! Resize engine - turns an original image into one bounded derivative.
//!
//! Fits the image within `max_dimension` on both axes while keeping the
//! aspect ratio, never upscaling past the original's own dimensions, and
//! encodes the result as baseline JPEG.
//!
//! Uses `spawn_blocking` for the CPU-intensive decode/resize/encode so the
//! async runtime is never blocked.

use crate::error::{PipelineError, Result};
use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// Default JPEG quality for derivatives.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Result of one resize pass.
#[derive(Debug)]
pub struct ResizedImage {
    /// JPEG-encoded derivative
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
}

/// Resize processor bound to one pixel ceiling.
pub struct ResizeProcessor {
    max_dimension: u32,
    quality: u8,
}

impl ResizeProcessor {
    pub fn new(max_dimension: u32, quality: u8) -> Self {
        Self {
            max_dimension,
            quality,
        }
    }

    /// Generate a derivative from the given image bytes (blocking version).
    ///
    /// CPU-bound; call `generate_async` from async code.
    pub fn generate(&self, original_data: &[u8]) -> Result<ResizedImage> {
        let img = image::load_from_memory(original_data)
            .map_err(|e| PipelineError::Decode(e.to_string()))?;

        let (orig_w, orig_h) = img.dimensions();
        debug!(
            original_width = orig_w,
            original_height = orig_h,
            max_dimension = self.max_dimension,
            "Resizing image"
        );

        // Already within bounds: re-encode without scaling (no upscaling)
        if orig_w <= self.max_dimension && orig_h <= self.max_dimension {
            let data = self.encode_jpeg(&img)?;
            return Ok(ResizedImage {
                data,
                width: orig_w,
                height: orig_h,
            });
        }

        let (new_w, new_h) = self.fit_dimensions(orig_w, orig_h);
        let resized = img.resize_exact(new_w.max(1), new_h.max(1), FilterType::Triangle);
        let data = self.encode_jpeg(&resized)?;

        debug!(
            width = new_w,
            height = new_h,
            size = data.len(),
            "Derivative generated"
        );

        Ok(ResizedImage {
            data,
            width: new_w,
            height: new_h,
        })
    }

    /// Generate a derivative on the blocking thread pool.
    pub async fn generate_async(self: Arc<Self>, original_data: Bytes) -> Result<ResizedImage> {
        let processor = self.clone();

        tokio::task::spawn_blocking(move || processor.generate(&original_data))
            .await
            .map_err(|e| PipelineError::Transient(format!("resize task panicked: {e}")))?
    }

    /// Scale both axes so the longer one lands exactly on the ceiling.
    fn fit_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let max_dim = self.max_dimension;

        if width > height {
            let ratio = max_dim as f32 / width as f32;
            (max_dim, ((height as f32) * ratio).round() as u32)
        } else {
            let ratio = max_dim as f32 / height as f32;
            (((width as f32) * ratio).round() as u32, max_dim)
        }
    }

    fn encode_jpeg(&self, img: &DynamicImage) -> Result<Bytes> {
        let mut buf = Vec::new();
        let mut cursor = Cursor::new(&mut buf);

        img.write_to(&mut cursor, ImageOutputFormat::Jpeg(self.quality))
            .map_err(|e| PipelineError::Decode(format!("jpeg encode failed: {e}")))?;

        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn jpeg_fixture(width: u32, height: u32) -> Bytes {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb([120, 80, 40]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Jpeg(90))
            .unwrap();
        Bytes::from(buf)
    }

    #[test]
    fn fit_dimensions_landscape() {
        let processor = ResizeProcessor::new(600, DEFAULT_JPEG_QUALITY);
        assert_eq!(processor.fit_dimensions(1200, 800), (600, 400));
    }

    #[test]
    fn fit_dimensions_portrait() {
        let processor = ResizeProcessor::new(600, DEFAULT_JPEG_QUALITY);
        assert_eq!(processor.fit_dimensions(800, 1200), (400, 600));
    }

    #[test]
    fn fit_dimensions_square() {
        let processor = ResizeProcessor::new(200, DEFAULT_JPEG_QUALITY);
        assert_eq!(processor.fit_dimensions(1000, 1000), (200, 200));
    }

    #[test]
    fn derivative_stays_within_bounds_and_aspect() {
        let processor = ResizeProcessor::new(200, DEFAULT_JPEG_QUALITY);
        let result = processor.generate(&jpeg_fixture(1000, 500)).unwrap();
        assert_eq!((result.width, result.height), (200, 100));

        let decoded = image::load_from_memory(&result.data).unwrap();
        assert_eq!(decoded.dimensions(), (200, 100));
    }

    #[test]
    fn small_image_is_not_upscaled() {
        let processor = ResizeProcessor::new(500, DEFAULT_JPEG_QUALITY);
        let result = processor.generate(&jpeg_fixture(120, 80)).unwrap();
        assert_eq!((result.width, result.height), (120, 80));
    }

    #[test]
    fn corrupt_payload_is_a_decode_error() {
        let processor = ResizeProcessor::new(200, DEFAULT_JPEG_QUALITY);
        let err = processor.generate(b"definitely not an image").unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
        assert!(!err.is_retryable());
    }
}
