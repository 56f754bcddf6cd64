use super::composite::flatten_over;
use super::RenderSink;
use anyhow::{Context, Result};
use image::{Rgb, RgbImage, RgbaImage};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use v4l::video::Output;
use v4l::{Device, Format, FourCC};

/// Background color matte frames are flattened over before hitting the wire
const MATTE_BACKGROUND: Rgb<u8> = Rgb([0, 255, 0]);

/// Render sink backed by a v4l2loopback device.
///
/// The device is switched to YUYV at a fixed output resolution once at
/// startup; composed frames are resampled to it on every submit.
pub struct LoopbackSink {
    file: File,
    width: u32,
    height: u32,
}

impl LoopbackSink {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{})",
            path.display(),
            width,
            height
        );

        let device = Device::with_path(path)
            .with_context(|| format!("Failed to open loopback device at {}", path.display()))?;
        let format = Format::new(width, height, FourCC::new(b"YUYV"));
        Output::set_format(&device, &format)
            .context("Failed to set loopback output format")?;
        drop(device);

        // v4l2loopback accepts raw frame data written to the device file
        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open loopback device at {}", path.display()))?;

        tracing::info!("Loopback device ready");

        Ok(Self {
            file,
            width,
            height,
        })
    }

    /// Convert an RGB frame to packed YUV422 (YUYV)
    fn rgb_to_yuyv(rgb_image: &RgbImage) -> Vec<u8> {
        let (width, height) = rgb_image.dimensions();
        let mut yuyv = Vec::with_capacity((width * height * 2) as usize);

        for y in 0..height {
            for x in (0..width).step_by(2) {
                let pixel1 = rgb_image.get_pixel(x, y);
                let pixel2 = if x + 1 < width {
                    rgb_image.get_pixel(x + 1, y)
                } else {
                    pixel1
                };

                let (y1, u1, v1) = rgb_to_yuv(pixel1[0], pixel1[1], pixel1[2]);
                let (y2, u2, v2) = rgb_to_yuv(pixel2[0], pixel2[1], pixel2[2]);

                // U and V are shared by the pixel pair
                let u = ((u1 as u16 + u2 as u16) / 2) as u8;
                let v = ((v1 as u16 + v2 as u16) / 2) as u8;

                yuyv.push(y1);
                yuyv.push(u);
                yuyv.push(y2);
                yuyv.push(v);
            }
        }

        yuyv
    }
}

fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let y = (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 255.0) as u8;
    let u = ((-0.147 * r - 0.289 * g + 0.436 * b) + 128.0).clamp(0.0, 255.0) as u8;
    let v = ((0.615 * r - 0.515 * g - 0.100 * b) + 128.0).clamp(0.0, 255.0) as u8;

    (y, u, v)
}

impl RenderSink for LoopbackSink {
    fn submit(&mut self, frame: &RgbaImage) -> Result<()> {
        let flat = flatten_over(frame, MATTE_BACKGROUND);

        let flat = if flat.dimensions() != (self.width, self.height) {
            image::imageops::resize(
                &flat,
                self.width,
                self.height,
                image::imageops::FilterType::Triangle,
            )
        } else {
            flat
        };

        let yuyv_data = Self::rgb_to_yuyv(&flat);

        self.file
            .write_all(&yuyv_data)
            .context("Failed to write frame to loopback device")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_packs_two_pixels_per_word() {
        let frame = RgbImage::from_pixel(4, 2, Rgb([255, 255, 255]));
        let yuyv = LoopbackSink::rgb_to_yuyv(&frame);

        assert_eq!(yuyv.len(), 4 * 2 * 2);
        // White maps to full luma, neutral chroma
        assert_eq!(yuyv[0], 255);
        assert!((yuyv[1] as i16 - 128).abs() <= 1);
        assert_eq!(yuyv[2], 255);
        assert!((yuyv[3] as i16 - 128).abs() <= 1);
    }
}
