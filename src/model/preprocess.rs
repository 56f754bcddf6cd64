use super::MatteMask;
use image::{imageops, GrayImage, RgbaImage};
use ndarray::Array4;

/// Preprocessor for converting canvas pixels to model input tensors
pub struct Preprocessor {
    mean: [f32; 3],
    std: [f32; 3],
}

impl Preprocessor {
    pub fn new(mean: [f32; 3], std: [f32; 3]) -> Self {
        Self { mean, std }
    }

    /// Preprocess an RGBA frame into a normalized NCHW tensor.
    ///
    /// The frame is resized so its shortest edge matches `size`, preserving
    /// aspect ratio. Returns the tensor and the reshaped input size
    /// (width, height) that detection coordinates refer to.
    pub fn to_tensor(&self, image: &RgbaImage, size: u32) -> (Array4<f32>, (u32, u32)) {
        let _span = tracing::debug_span!("preprocess").entered();

        let (width, height) = image.dimensions();
        let (target_width, target_height) = shortest_edge_size(width, height, size);

        let resized = if (width, height) != (target_width, target_height) {
            imageops::resize(
                image,
                target_width,
                target_height,
                imageops::FilterType::Triangle,
            )
        } else {
            image.clone()
        };

        let mut tensor =
            Array4::<f32>::zeros((1, 3, target_height as usize, target_width as usize));

        for y in 0..target_height {
            for x in 0..target_width {
                let pixel = resized.get_pixel(x, y);

                for c in 0..3 {
                    let value = pixel[c] as f32 / 255.0;
                    tensor[[0, c, y as usize, x as usize]] =
                        (value - self.mean[c]) / self.std[c];
                }
            }
        }

        (tensor, (target_width, target_height))
    }
}

/// Dimensions after resizing so the shortest edge equals `size`
pub fn shortest_edge_size(width: u32, height: u32, size: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (size, size);
    }

    if width <= height {
        let scaled = (height as f32 * size as f32 / width as f32).round() as u32;
        (size, scaled.max(1))
    } else {
        let scaled = (width as f32 * size as f32 / height as f32).round() as u32;
        (scaled.max(1), size)
    }
}

/// Postprocess raw alpha values into a mask aligned to the frame.
///
/// Model output is f32 in [0, 1] at the model's own resolution; the mask is
/// scaled to [0, 255] and resampled to the frame dimensions.
pub fn matte_to_mask(
    alpha: &[f32],
    alpha_width: u32,
    alpha_height: u32,
    frame_width: u32,
    frame_height: u32,
) -> MatteMask {
    let _span = tracing::debug_span!("postprocess").entered();

    let gray = GrayImage::from_fn(alpha_width, alpha_height, |x, y| {
        let idx = (y * alpha_width + x) as usize;
        let value = (alpha[idx] * 255.0).clamp(0.0, 255.0) as u8;
        image::Luma([value])
    });

    let resized = if (alpha_width, alpha_height) != (frame_width, frame_height) {
        imageops::resize(
            &gray,
            frame_width,
            frame_height,
            imageops::FilterType::Triangle,
        )
    } else {
        gray
    };

    MatteMask {
        data: resized.into_raw(),
        width: frame_width,
        height: frame_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn shortest_edge_preserves_aspect_ratio() {
        assert_eq!(shortest_edge_size(640, 480, 128), (171, 128));
        assert_eq!(shortest_edge_size(480, 640, 128), (128, 171));
        assert_eq!(shortest_edge_size(256, 256, 128), (128, 128));
    }

    #[test]
    fn tensor_has_nchw_shape_and_normalized_values() {
        let mut image = RgbaImage::new(4, 4);
        for pixel in image.pixels_mut() {
            *pixel = Rgba([255, 0, 128, 255]);
        }

        let preprocessor = Preprocessor::new([0.5, 0.5, 0.5], [0.5, 0.5, 0.5]);
        let (tensor, input_size) = preprocessor.to_tensor(&image, 4);

        assert_eq!(input_size, (4, 4));
        assert_eq!(tensor.shape(), &[1, 3, 4, 4]);
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 0, 0]] + 1.0).abs() < 1e-6);
        assert!((tensor[[0, 2, 0, 0]] - 0.003_921_6).abs() < 1e-4);
    }

    #[test]
    fn matte_values_scale_to_bytes() {
        let alpha = vec![0.0, 0.25, 0.5, 1.0];
        let mask = matte_to_mask(&alpha, 2, 2, 2, 2);

        assert_eq!(mask.width, 2);
        assert_eq!(mask.height, 2);
        assert_eq!(mask.data, vec![0, 63, 127, 255]);
    }

    #[test]
    fn matte_resamples_to_frame_dimensions() {
        let alpha = vec![1.0; 4];
        let mask = matte_to_mask(&alpha, 2, 2, 6, 4);

        assert_eq!(mask.width, 6);
        assert_eq!(mask.height, 4);
        assert_eq!(mask.data.len(), 24);
        assert!(mask.data.iter().all(|&v| v == 255));
    }
}
