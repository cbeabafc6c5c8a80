//! Render buffer to compressed image encoding

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};

use super::frame::{Frame, FrameFormat};
use crate::game::RenderBuffer;
use crate::util::time::unix_millis;

/// Frame encoding errors. Never fatal to the clock.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Empty render buffer ({width}x{height})")]
    EmptyBuffer { width: u32, height: u32 },

    #[error("Render buffer holds {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Encodes RGB8 render buffers. Output is deterministic for a given buffer
/// and configuration.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    format: FrameFormat,
    quality: u8,
}

impl FrameEncoder {
    pub fn new(format: FrameFormat, quality: u8) -> Self {
        Self {
            format,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn encode(&self, buffer: &RenderBuffer, tick: u64) -> Result<Frame, EncodeError> {
        let (width, height) = (buffer.width(), buffer.height());
        if width == 0 || height == 0 {
            return Err(EncodeError::EmptyBuffer { width, height });
        }
        let pixels = buffer.as_bytes();
        if pixels.len() != buffer.expected_len() {
            return Err(EncodeError::SizeMismatch {
                expected: buffer.expected_len(),
                actual: pixels.len(),
            });
        }

        // Rough guess: compressed frames rarely exceed a tenth of the raw size
        let mut out = Vec::with_capacity(pixels.len() / 10);
        match self.format {
            FrameFormat::Jpeg => JpegEncoder::new_with_quality(&mut out, self.quality)
                .write_image(pixels, width, height, ColorType::Rgb8)?,
            FrameFormat::Png => {
                PngEncoder::new(&mut out).write_image(pixels, width, height, ColorType::Rgb8)?
            }
        }

        Ok(Frame {
            tick,
            timestamp_ms: unix_millis(),
            format: self.format,
            width,
            height,
            payload: Bytes::from(out),
        })
    }
}
