use crate::model::MatteMask;
use image::{Rgb, RgbImage, RgbaImage};

/// Substitute the frame's alpha channel with the matte, per pixel.
///
/// Color channels are left untouched; this avoids re-rendering the color
/// planes on every completed pass. A mask computed for a different canvas
/// size (the scale changed mid-pass) is resampled first.
pub fn apply_matte(image: &mut RgbaImage, mask: &MatteMask) {
    let (width, height) = image.dimensions();

    if (mask.width, mask.height) != (width, height) {
        let resized = mask.resized(width, height);
        substitute_alpha(image, &resized.data);
    } else {
        substitute_alpha(image, &mask.data);
    }
}

fn substitute_alpha(image: &mut RgbaImage, alpha: &[u8]) {
    for (pixel, &value) in image.pixels_mut().zip(alpha.iter()) {
        pixel[3] = value;
    }
}

/// Flatten an alpha-composited frame over a solid background.
///
/// Needed for wire formats without an alpha channel.
pub fn flatten_over(image: &RgbaImage, background: Rgb<u8>) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let pixel = image.get_pixel(x, y);
        let alpha = pixel[3] as u16;

        let blend = |foreground: u8, back: u8| -> u8 {
            ((foreground as u16 * alpha + back as u16 * (255 - alpha)) / 255) as u8
        };

        Rgb([
            blend(pixel[0], background[0]),
            blend(pixel[1], background[1]),
            blend(pixel[2], background[2]),
        ])
    })
}
