use super::preprocess::{matte_to_mask, Preprocessor};
use super::{ExecutionBackend, FramePass, InferenceRequest, PassOutput, Precision};
use anyhow::{Context, Result};
use ndarray::IxDyn;
use ort::Session;
use std::path::Path;

/// MODNet portrait matting model
///
/// Stateless per frame; the output is a `[1, 1, H, W]` alpha map in [0, 1]
/// at the model's working resolution.
pub struct ModnetMatting {
    session: Session,
    preprocessor: Preprocessor,
}

impl ModnetMatting {
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        backend: ExecutionBackend,
        precision: Precision,
    ) -> Result<Self> {
        let session = super::build_session(model_path.as_ref(), backend, precision)?;
        let preprocessor = Preprocessor::new([0.5, 0.5, 0.5], [0.5, 0.5, 0.5]);

        Ok(Self {
            session,
            preprocessor,
        })
    }
}

impl FramePass for ModnetMatting {
    fn process(&mut self, request: InferenceRequest) -> Result<PassOutput> {
        let _span = tracing::debug_span!("matting_pass").entered();

        let (frame_width, frame_height) = request.pixels.dimensions();
        let (input_tensor, _input_size) = self
            .preprocessor
            .to_tensor(&request.pixels, request.model_size);

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs!["input" => input_tensor.view()]?)
            .context("Failed to run inference")?;
        drop(_infer_span);

        let alpha = outputs[0]
            .try_extract_tensor::<f32>()?
            .view()
            .to_owned()
            .into_dimensionality::<IxDyn>()?;

        let shape = alpha.shape();
        let alpha_height = shape[shape.len() - 2] as u32;
        let alpha_width = shape[shape.len() - 1] as u32;

        let flat: Vec<f32> = alpha.iter().copied().collect();
        let mask = matte_to_mask(&flat, alpha_width, alpha_height, frame_width, frame_height);

        Ok(PassOutput::Matte(mask))
    }
}
