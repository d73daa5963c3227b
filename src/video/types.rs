use std::path::PathBuf;
use std::sync::Arc;

use image::{ImageBuffer, Rgb, RgbImage};

/// The raster surface every output frame is painted into.
///
/// One `Frame` is allocated per export and repainted for each output frame;
/// its contents are only valid until the next frame is composed.
#[derive(Clone, Debug)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        Self {
            buffer: ImageBuffer::new(width, height),
        }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self {
            buffer: ImageBuffer::from_pixel(width, height, Rgb(color)),
        }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Blend `color` over the pixel at (x, y) with `alpha` in [0, 1].
    /// Coordinates outside the frame are ignored.
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: [u8; 3], alpha: f32) {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return;
        }
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        let pixel = self.buffer.get_pixel_mut(x as u32, y as u32);
        for (dst, src) in pixel.0.iter_mut().zip(color) {
            *dst = blend_channel(*dst, src, alpha);
        }
    }

    /// Darken a full row towards black by `alpha`
    pub fn darken_row(&mut self, y: u32, alpha: f32) {
        if y >= self.height() {
            return;
        }
        let keep = 1.0 - alpha.clamp(0.0, 1.0);
        let width = self.width() as usize;
        let start = y as usize * width * 3;
        for channel in &mut (*self.buffer)[start..start + width * 3] {
            *channel = (*channel as f32 * keep).round() as u8;
        }
    }

    /// Raw RGB24 bytes, row-major
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Mutable raw RGB24 bytes, row-major
    pub fn as_rgb_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.buffer.save(path)
    }
}

pub(crate) fn blend_channel(dst: u8, src: u8, alpha: f32) -> u8 {
    (dst as f32 + (src as f32 - dst as f32) * alpha).round() as u8
}

/// Where a scene's image comes from, before decoding
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// An image file on disk
    File(PathBuf),
    /// Encoded image bytes (PNG/JPEG), e.g. returned by an image generator
    Encoded(Arc<[u8]>),
}

impl ImageSource {
    /// Human-readable description for logs and errors
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Encoded(bytes) => format!("<{} encoded bytes>", bytes.len()),
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Encoded(bytes.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_pixel() {
        let mut frame = Frame::new_black(4, 4);
        frame.blend_pixel(1, 1, [200, 100, 0], 0.5);
        assert_eq!(frame.get_pixel(1, 1), [100, 50, 0]);

        frame.blend_pixel(1, 1, [200, 100, 0], 1.0);
        assert_eq!(frame.get_pixel(1, 1), [200, 100, 0]);
    }

    #[test]
    fn test_blend_outside_is_ignored() {
        let mut frame = Frame::new_black(2, 2);
        frame.blend_pixel(-1, 0, [255, 255, 255], 1.0);
        frame.blend_pixel(0, 5, [255, 255, 255], 1.0);
        assert!(frame.as_rgb_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_darken_row() {
        let mut frame = Frame::new_filled(3, 2, [200, 200, 200]);
        frame.darken_row(1, 0.5);
        assert_eq!(frame.get_pixel(0, 0), [200, 200, 200]);
        assert_eq!(frame.get_pixel(2, 1), [100, 100, 100]);
    }
}
