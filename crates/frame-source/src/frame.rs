//! Video frame types and conversions

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, Luma, RgbImage};

use crate::SourceError;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixels
    pub image: RgbImage,
    /// Capture timestamp (nanoseconds since the source was opened)
    pub timestamp_ns: u64,
    /// Frame sequence number within the source
    pub sequence: u64,
}

impl VideoFrame {
    /// Wrap an already decoded RGB image
    pub fn new(image: RgbImage, timestamp_ns: u64, sequence: u64) -> Self {
        Self {
            image,
            timestamp_ns,
            sequence,
        }
    }

    /// Decode a compressed image (JPEG, PNG, BMP, ...) into a frame
    pub fn decode(bytes: &[u8]) -> Result<Self, SourceError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(Self::new(img.to_rgb8(), 0, 0))
    }

    /// Frame width
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.image.get_pixel_checked(x, y).map(|p| p.0)
    }

    /// Convert to single-channel luminance
    pub fn to_grayscale(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            let [r, g, b] = self.image.get_pixel(x, y).0;
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let luma = r as f32 * 0.299 + g as f32 * 0.587 + b as f32 * 0.114;
            Luma([luma.round().min(255.0) as u8])
        })
    }

    /// Encode the frame as a baseline JPEG
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, SourceError> {
        encode_jpeg(&self.image, quality)
    }
}

/// Encode an RGB image as a baseline JPEG
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, SourceError> {
    let mut buffer = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    encoder
        .encode_image(image)
        .map_err(|e| SourceError::Encode(e.to_string()))?;
    Ok(buffer.into_inner())
}
