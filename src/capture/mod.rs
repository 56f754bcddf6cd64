mod webcam;

pub use webcam::WebcamSource;

use anyhow::Result;
use image::RgbImage;

/// Trait for live video sources
pub trait FrameSource {
    /// Sample the current frame from the stream
    fn latest_frame(&mut self) -> Result<RgbImage>;

    /// Native resolution of the underlying stream
    ///
    /// This never changes while the stream is open; display scaling happens
    /// at the canvas copy, not here.
    fn native_size(&self) -> (u32, u32);
}
