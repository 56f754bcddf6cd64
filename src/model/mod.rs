mod backend;
mod detector;
mod labels;
mod matting;
mod preprocess;

pub use backend::{build_session, ExecutionBackend, Precision};
pub use detector::SsdDetector;
pub use labels::class_label;
pub use matting::ModnetMatting;
pub use preprocess::Preprocessor;

use anyhow::Result;
use image::{imageops, GrayImage, RgbaImage};
use std::path::Path;

/// One frame handed to the in-flight pass, together with the control values
/// snapshotted at dispatch time.
pub struct InferenceRequest {
    /// Canvas pixels at the scaled display resolution
    pub pixels: RgbaImage,
    /// Shortest edge of the model input, in pixels
    pub model_size: u32,
}

/// A single detection in the coordinate space of the model's reshaped input,
/// not the display size.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub score: f32,
    pub class_id: u32,
}

/// Per-pixel foreground opacity, aligned to the frame it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct MatteMask {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl MatteMask {
    /// Resample the mask to a new resolution
    ///
    /// Needed when the display scale changed while the pass that produced
    /// this mask was still in flight.
    pub fn resized(&self, width: u32, height: u32) -> MatteMask {
        if (self.width, self.height) == (width, height) {
            return self.clone();
        }

        let gray = GrayImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| GrayImage::new(self.width, self.height));
        let resized = imageops::resize(&gray, width, height, imageops::FilterType::Triangle);

        MatteMask {
            data: resized.into_raw(),
            width,
            height,
        }
    }
}

/// Output of one completed inference pass
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutput {
    Detections {
        items: Vec<Detection>,
        /// Reshaped model input size (width, height) the coordinates refer to
        input_size: (u32, u32),
    },
    Matte(MatteMask),
}

/// Trait for model passes
/// Allows swapping between detector and matting backends behind one seam.
pub trait FramePass: Send {
    /// Preprocess, run the model, and postprocess one frame
    fn process(&mut self, request: InferenceRequest) -> Result<PassOutput>;
}

/// Which model family a page variant runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PassKind {
    /// Object detector with bounding-box overlays
    Detect,
    /// Background matting with alpha compositing
    Matte,
}

/// Build the configured pass from an ONNX file
pub fn create_pass(
    kind: PassKind,
    model_path: &Path,
    backend: ExecutionBackend,
    precision: Precision,
) -> Result<Box<dyn FramePass>> {
    match kind {
        PassKind::Detect => Ok(Box::new(SsdDetector::new(model_path, backend, precision)?)),
        PassKind::Matte => Ok(Box::new(ModnetMatting::new(model_path, backend, precision)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resized_mask_is_identity_at_same_dimensions() {
        let mask = MatteMask {
            data: vec![0, 64, 128, 255],
            width: 2,
            height: 2,
        };
        assert_eq!(mask.resized(2, 2), mask);
    }

    #[test]
    fn resized_mask_preserves_uniform_values() {
        let mask = MatteMask {
            data: vec![200; 4],
            width: 2,
            height: 2,
        };
        let resized = mask.resized(4, 4);
        assert_eq!(resized.width, 4);
        assert_eq!(resized.height, 4);
        assert!(resized.data.iter().all(|&v| v == 200));
    }
}
