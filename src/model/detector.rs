use super::labels::class_label;
use super::preprocess::Preprocessor;
use super::{Detection, ExecutionBackend, FramePass, InferenceRequest, PassOutput, Precision};
use anyhow::{Context, Result};
use ndarray::IxDyn;
use ort::Session;
use std::path::Path;

/// SSD-MobileNet object detector
///
/// The exported graph carries its own decoding head: the single output tensor
/// already holds `[xmin, ymin, xmax, ymax, score, class_id]` rows in the
/// coordinate space of the reshaped input. No NMS is applied here.
pub struct SsdDetector {
    session: Session,
    preprocessor: Preprocessor,
}

impl SsdDetector {
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

impl FramePass for SsdDetector {
    fn process(&mut self, request: InferenceRequest) -> Result<PassOutput> {
        let _span = tracing::debug_span!("detector_pass").entered();

        let (input_tensor, input_size) = self
            .preprocessor
            .to_tensor(&request.pixels, request.model_size);

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![input_tensor.view()]?)
            .context("Failed to run inference")?;
        drop(_infer_span);

        let rows = outputs[0]
            .try_extract_tensor::<f32>()?
            .view()
            .to_owned()
            .into_dimensionality::<IxDyn>()?;

        let flat: Vec<f32> = rows.iter().copied().collect();
        let items = decode_detection_rows(&flat);

        for detection in &items {
            tracing::debug!(
                "{} ({:.2}%)",
                class_label(detection.class_id),
                detection.score * 100.0
            );
        }

        Ok(PassOutput::Detections { items, input_size })
    }
}

/// Decode flattened `[N, 6]` output rows into detections
fn decode_detection_rows(data: &[f32]) -> Vec<Detection> {
    data.chunks_exact(6)
        .map(|row| Detection {
            xmin: row[0],
            ymin: row[1],
            xmax: row[2],
            ymax: row[3],
            score: row[4],
            class_id: row[5].max(0.0) as u32,
        })
        .collect()
}
