pub mod clock;
pub mod controls;
pub mod dispatch;
pub mod status;

pub use clock::{FixedDelayClock, RefreshClock, TickClock};
pub use controls::Controls;
pub use dispatch::{DispatchError, PassCompletion, PassDispatcher, WorkerDispatcher};
pub use status::{LogStatus, PipelineStatus, StatusSink};

use crate::capture::FrameSource;
use crate::model::{InferenceRequest, PassOutput};
use crate::render::{composite, overlay, Canvas, RenderSink};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of one frame-processing attempt.
///
/// At most one attempt is `Dispatched` at any time; `Idle` is both the
/// initial state and the state between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Dispatched { since: Instant },
}

/// The frame pipeline loop.
///
/// Owns the frame source, a single in-flight inference slot, and the render
/// sink. Each tick copies the current frame into the canvas at the scaled
/// resolution, dispatches one pass if none is in flight (dropping the frame
/// otherwise), and renders using the most recently completed result. No
/// frame queue ever grows; the effective inference rate self-throttles to
/// whatever the pass can sustain.
pub struct FramePipeline<S, D, R, T, C> {
    source: S,
    dispatcher: D,
    sink: R,
    status: T,
    clock: C,
    controls: Arc<Controls>,
    canvas: Canvas,
    state: PassState,
    last_result: Option<PassOutput>,
    last_completion: Option<Instant>,
    completed_passes: u64,
    total_pass_time: Duration,
    tick_count: u64,
    dropped_frames: u64,
}

impl<S, D, R, T, C> FramePipeline<S, D, R, T, C>
where
    S: FrameSource,
    D: PassDispatcher,
    R: RenderSink,
    T: StatusSink,
    C: TickClock,
{
    pub fn new(
        source: S,
        dispatcher: D,
        sink: R,
        status: T,
        clock: C,
        controls: Arc<Controls>,
    ) -> Self {
        Self {
            source,
            dispatcher,
            sink,
            status,
            clock,
            controls,
            canvas: Canvas::new(),
            state: PassState::Idle,
            last_result: None,
            last_completion: None,
            completed_passes: 0,
            total_pass_time: Duration::ZERO,
            tick_count: 0,
            dropped_frames: 0,
        }
    }

    /// Run until the host tears the process down or a stage fails fatally
    pub fn run(&mut self) -> Result<()> {
        tracing::info!("Starting pipeline loop");
        tracing::info!("Press Ctrl+C to stop");

        loop {
            self.tick()?;
            self.clock.wait_next_tick();
        }
    }

    /// One scheduling tick: frame copy, dispatch-or-skip, render
    pub fn tick(&mut self) -> Result<()> {
        self.tick_count += 1;

        let scale = self.controls.scale();
        let (native_width, native_height) = self.source.native_size();
        let (width, height) = scaled_size(native_width, native_height, scale);

        let frame = self
            .source
            .latest_frame()
            .context("Failed to capture frame")?;
        self.canvas.copy_frame(&frame, width, height);

        self.poll_completion()?;

        if self.state == PassState::Idle {
            let request = InferenceRequest {
                pixels: self.canvas.image().clone(),
                model_size: self.controls.size(),
            };

            match self.dispatcher.dispatch(request) {
                Ok(()) => {
                    self.state = PassState::Dispatched {
                        since: self.clock.now(),
                    };
                }
                Err(DispatchError::Busy) => {
                    tracing::warn!("Dispatcher busy with no pass marked in flight");
                }
                Err(err @ DispatchError::WorkerGone) => {
                    return Err(err).context("Inference worker lost");
                }
            }
        } else {
            // A pass is still in flight: this tick's frame is dropped, not
            // queued, and the render below reuses the last completed result.
            self.dropped_frames += 1;
        }

        self.render().context("Failed to render frame")
    }

    /// Current attempt state, for callers that observe the slot directly
    pub fn pass_state(&self) -> PassState {
        self.state
    }

    pub fn last_result(&self) -> Option<&PassOutput> {
        self.last_result.as_ref()
    }

    fn poll_completion(&mut self) -> Result<()> {
        let PassState::Dispatched { since } = self.state else {
            return Ok(());
        };

        let Some(completion) = self
            .dispatcher
            .poll()
            .context("Inference worker lost while a pass was in flight")?
        else {
            return Ok(());
        };

        // The slot is released on every outcome; a failed pass must never
        // wedge the pipeline.
        self.state = PassState::Idle;
        let now = self.clock.now();

        match completion.outcome {
            Ok(output) => {
                self.completed_passes += 1;
                self.total_pass_time += now.saturating_duration_since(since);

                if let Some(previous) = self.last_completion {
                    let elapsed_ms = now.saturating_duration_since(previous).as_secs_f64() * 1000.0;
                    if elapsed_ms > 0.0 {
                        self.status.update(PipelineStatus::Fps(1000.0 / elapsed_ms));
                    }
                }
                self.last_completion = Some(now);
                self.last_result = Some(output);

                if self.completed_passes % 30 == 0 {
                    let avg_pass_ms = self.total_pass_time.as_secs_f64() * 1000.0
                        / self.completed_passes as f64;
                    tracing::info!(
                        "Pass {}: avg {:.1}ms per pass, {} ticks seen, {} frames dropped",
                        self.completed_passes,
                        avg_pass_ms,
                        self.tick_count,
                        self.dropped_frames
                    );
                }
            }
            Err(err) => {
                tracing::warn!("Inference pass failed: {err:#}");
            }
        }

        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let mut output = self.canvas.image().clone();

        match &self.last_result {
            Some(PassOutput::Detections { items, input_size }) => {
                let threshold = self.controls.threshold();
                overlay::draw_detections(&mut output, items, *input_size, threshold);
            }
            Some(PassOutput::Matte(mask)) => {
                composite::apply_matte(&mut output, mask);
            }
            None => {}
        }

        self.sink.submit(&output)
    }
}

fn scaled_size(width: u32, height: u32, scale: f32) -> (u32, u32) {
    let scaled_width = ((width as f32 * scale).round() as u32).max(1);
    let scaled_height = ((height as f32 * scale).round() as u32).max(1);
    (scaled_width, scaled_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_size_rounds_and_stays_positive() {
        assert_eq!(scaled_size(640, 480, 0.5), (320, 240));
        assert_eq!(scaled_size(641, 480, 0.5), (321, 240));
        assert_eq!(scaled_size(3, 3, 0.1), (1, 1));
    }
}
