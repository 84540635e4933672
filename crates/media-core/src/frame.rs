//! Decoded video frames.

use image::{Rgba, RgbaImage};

/// One decoded RGBA8 frame with its presentation timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Pixel data, tightly packed RGBA8.
    pub image: RgbaImage,

    /// Presentation timestamp in nanoseconds.
    pub pts_ns: u64,
}

impl VideoFrame {
    /// Wrap an existing image.
    pub fn new(image: RgbaImage, pts_ns: u64) -> Self {
        Self { image, pts_ns }
    }

    /// Build a frame from raw RGBA bytes; `None` if the length does not match.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>, pts_ns: u64) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(|image| Self { image, pts_ns })
    }

    /// A frame filled with one colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4], pts_ns: u64) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba(rgba)),
            pts_ns,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pixel at `(x, y)`; panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    /// Raw RGBA bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }
}
