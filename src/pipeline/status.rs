/// What the status surface currently shows
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStatus {
    LoadingModel,
    Ready,
    /// Instantaneous frame rate between successive pass completions
    Fps(f64),
    Error(String),
}

/// Text sink for pipeline state, updated on every completed pass
pub trait StatusSink {
    fn update(&mut self, status: PipelineStatus);
}

/// Status surface backed by the log stream
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn update(&mut self, status: PipelineStatus) {
        match status {
            PipelineStatus::LoadingModel => tracing::info!("Loading model..."),
            PipelineStatus::Ready => tracing::info!("Ready"),
            PipelineStatus::Fps(fps) => tracing::debug!("FPS: {:.2}", fps),
            PipelineStatus::Error(message) => tracing::error!("{message}"),
        }
    }
}
