pub mod composite;
mod loopback;
pub mod overlay;

pub use loopback::LoopbackSink;

use anyhow::Result;
use image::{imageops, DynamicImage, RgbImage, RgbaImage};

/// Trait for rendering targets
pub trait RenderSink {
    /// Present one composed frame
    fn submit(&mut self, frame: &RgbaImage) -> Result<()>;
}

/// Drawing surface the loop copies the current video frame into each tick
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            image: RgbaImage::new(1, 1),
        }
    }

    /// Copy a captured frame in at the configured (scaled) resolution
    pub fn copy_frame(&mut self, frame: &RgbImage, width: u32, height: u32) {
        let resized = if frame.dimensions() != (width, height) {
            imageops::resize(frame, width, height, imageops::FilterType::Triangle)
        } else {
            frame.clone()
        };

        self.image = DynamicImage::ImageRgb8(resized).into_rgba8();
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_applies_requested_resolution() {
        let frame = RgbImage::from_pixel(8, 6, image::Rgb([10, 20, 30]));
        let mut canvas = Canvas::new();

        canvas.copy_frame(&frame, 4, 3);
        assert_eq!(canvas.image().dimensions(), (4, 3));
        assert_eq!(canvas.image().get_pixel(0, 0).0, [10, 20, 30, 255]);

        canvas.copy_frame(&frame, 8, 6);
        assert_eq!(canvas.image().dimensions(), (8, 6));
    }
}
