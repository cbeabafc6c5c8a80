//! RGB8 software render target

use super::SimError;

pub type Rgb = [u8; 3];

/// Packed RGB8 pixel buffer, row-major, no padding
#[derive(Debug, Clone)]
pub struct RenderBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RenderBuffer {
    pub const BYTES_PER_PIXEL: usize = 3;

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * Self::BYTES_PER_PIXEL],
        }
    }

    /// Wrap raw bytes. The length is not checked here; the encoder rejects
    /// buffers whose size does not match the dimensions.
    #[cfg(test)]
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * Self::BYTES_PER_PIXEL
    }

    pub fn fill(&mut self, color: Rgb) {
        for px in self.pixels.chunks_exact_mut(Self::BYTES_PER_PIXEL) {
            px.copy_from_slice(&color);
        }
    }

    /// Fill an axis-aligned rectangle, clipped to the buffer
    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Rgb) -> Result<(), SimError> {
        if self.pixels.len() != self.expected_len() {
            return Err(SimError::Render(format!(
                "buffer holds {} bytes, expected {}",
                self.pixels.len(),
                self.expected_len()
            )));
        }

        let x0 = x.max(0) as u32;
        let y0 = y.max(0) as u32;
        let x1 = (x.saturating_add(w as i32)).clamp(0, self.width as i32) as u32;
        let y1 = (y.saturating_add(h as i32)).clamp(0, self.height as i32) as u32;
        if x0 >= x1 || y0 >= y1 {
            return Ok(());
        }

        let stride = self.width as usize * Self::BYTES_PER_PIXEL;
        for row in y0..y1 {
            let start = row as usize * stride + x0 as usize * Self::BYTES_PER_PIXEL;
            let end = row as usize * stride + x1 as usize * Self::BYTES_PER_PIXEL;
            for px in self.pixels[start..end].chunks_exact_mut(Self::BYTES_PER_PIXEL) {
                px.copy_from_slice(&color);
            }
        }
        Ok(())
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * Self::BYTES_PER_PIXEL;
        self.pixels.get(i..i + 3).map(|p| [p[0], p[1], p[2]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_rect_clips_to_bounds() {
        let mut buf = RenderBuffer::new(10, 10);
        buf.fill_rect(-5, 8, 8, 10, [255, 0, 0]).unwrap();

        assert_eq!(buf.pixel(0, 9), Some([255, 0, 0]));
        assert_eq!(buf.pixel(2, 8), Some([255, 0, 0]));
        assert_eq!(buf.pixel(3, 8), Some([0, 0, 0]));
        assert_eq!(buf.pixel(0, 7), Some([0, 0, 0]));
    }

    #[test]
    fn fill_rect_outside_is_noop() {
        let mut buf = RenderBuffer::new(4, 4);
        buf.fill_rect(10, 10, 3, 3, [1, 2, 3]).unwrap();
        assert!(buf.as_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn mismatched_buffer_is_a_render_error() {
        let mut buf = RenderBuffer::from_raw(4, 4, vec![0; 5]);
        assert!(matches!(
            buf.fill_rect(0, 0, 1, 1, [0, 0, 0]),
            Err(SimError::Render(_))
        ));
    }
}
