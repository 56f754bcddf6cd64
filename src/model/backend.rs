use anyhow::{Context, Result};
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::{GraphOptimizationLevel, Session};
use std::path::Path;

/// Hardware/software path used to run the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExecutionBackend {
    Cuda,
    TensorRt,
    Cpu,
}

/// Numeric precision requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Precision {
    Fp16,
    Fp32,
}

/// Build an ONNX Runtime session on the requested backend.
///
/// Provider registration is configured to fail the build rather than fall
/// back silently; choosing a different backend after a failure is the
/// caller's decision, made before the pipeline loop starts.
pub fn build_session(
    model_path: &Path,
    backend: ExecutionBackend,
    precision: Precision,
) -> Result<Session> {
    tracing::info!(
        "Building inference session on {:?} ({:?}) from {}",
        backend,
        precision,
        model_path.display()
    );

    let builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?;

    let builder = match backend {
        ExecutionBackend::Cuda => builder.with_execution_providers([CUDAExecutionProvider::default()
            .build()
            .error_on_failure()])?,
        ExecutionBackend::TensorRt => {
            let mut provider = TensorRTExecutionProvider::default();
            if precision == Precision::Fp16 {
                provider = provider.with_fp16(true);
            }
            builder.with_execution_providers([provider.build().error_on_failure()])?
        }
        ExecutionBackend::Cpu => builder,
    };

    let session = builder
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load model from {}", model_path.display()))?;

    tracing::info!("Inference session ready");

    Ok(session)
}
