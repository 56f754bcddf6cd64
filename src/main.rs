use anyhow::{Context, Result};
use camsight::capture::WebcamSource;
use camsight::model::{self, ExecutionBackend, FramePass, PassKind, Precision};
use camsight::pipeline::{
    controls, Controls, FixedDelayClock, FramePipeline, LogStatus, PipelineStatus, RefreshClock,
    StatusSink, TickClock, WorkerDispatcher,
};
use camsight::render::LoopbackSink;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Which model family to run
    #[arg(long, value_enum, default_value = "detect")]
    mode: PassKind,

    /// Path to the model (ONNX file)
    #[arg(long)]
    model: PathBuf,

    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Output resolution width
    #[arg(long, default_value_t = 1280)]
    output_width: u32,

    /// Output resolution height
    #[arg(long, default_value_t = 720)]
    output_height: u32,

    /// Execution backend for inference
    #[arg(long, value_enum, default_value = "cuda")]
    backend: ExecutionBackend,

    /// Numeric precision requested from the backend
    #[arg(long, value_enum, default_value = "fp32")]
    precision: Precision,

    /// Retry once on the CPU backend if the requested one fails to build
    #[arg(long)]
    fallback_cpu: bool,

    /// Display refresh rate the loop synchronizes to
    #[arg(long, default_value_t = 60)]
    refresh_rate: u32,

    /// Use a fixed inter-tick delay instead of refresh synchronization
    #[arg(long)]
    fixed_tick_ms: Option<u64>,

    /// Minimum confidence score for rendered detections
    #[arg(long, default_value_t = 0.25)]
    threshold: f32,

    /// Model input size (shortest edge, pixels)
    #[arg(long, default_value_t = 128)]
    size: u32,

    /// Capture-to-display scale factor
    #[arg(long, default_value_t = 0.5)]
    scale: f32,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Camsight starting");
    tracing::info!("Mode: {:?}", args.mode);
    tracing::info!("Output: {}x{}", args.output_width, args.output_height);

    let mut status = LogStatus;
    status.update(PipelineStatus::LoadingModel);

    let pass = match build_pass(&args) {
        Ok(pass) => pass,
        Err(err) => {
            status.update(PipelineStatus::Error(format!("{err:#}")));
            return Err(err);
        }
    };

    let source =
        WebcamSource::new(args.input_device).context("Failed to initialize webcam capture")?;

    let sink = LoopbackSink::new(&args.output_device, args.output_width, args.output_height)
        .context("Failed to initialize v4l2loopback output")?;

    let controls = Arc::new(Controls::new(args.threshold, args.size, args.scale));
    controls::spawn_stdin_listener(controls.clone());

    let dispatcher = WorkerDispatcher::spawn(pass);

    let clock: Box<dyn TickClock> = match args.fixed_tick_ms {
        Some(ms) => Box::new(FixedDelayClock::new(Duration::from_millis(ms))),
        None => Box::new(RefreshClock::with_refresh_rate(args.refresh_rate)),
    };

    status.update(PipelineStatus::Ready);

    let mut pipeline = FramePipeline::new(source, dispatcher, sink, status, clock, controls);
    pipeline.run()
}

/// Build the inference pass, deciding any backend fallback before the
/// pipeline loop starts. The loop itself has no recovery policy.
fn build_pass(args: &Args) -> Result<Box<dyn FramePass>> {
    match model::create_pass(args.mode, &args.model, args.backend, args.precision) {
        Ok(pass) => Ok(pass),
        Err(err) if args.fallback_cpu && args.backend != ExecutionBackend::Cpu => {
            tracing::warn!(
                "Backend {:?} failed to build ({err:#}); retrying on CPU",
                args.backend
            );
            model::create_pass(args.mode, &args.model, ExecutionBackend::Cpu, args.precision)
        }
        Err(err) => Err(err),
    }
}
