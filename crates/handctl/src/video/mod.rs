//! Camera frame sources.

mod blank;
#[cfg(target_os = "linux")]
pub mod webcam;

use crate::{config::CameraConfig, image::Image, timer::Timer};

pub use blank::BlankFrames;

/// A source of camera frames.
pub trait FrameSource {
    /// Returns the next frame, blocking until one is available.
    fn capture_frame(&mut self) -> anyhow::Result<Image>;

    /// Releases the underlying device. Further captures fail.
    fn release(&mut self);

    /// Returns the source's own profiling timers, logged alongside the frame rate.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

/// Opens the frame source selected by `config`.
pub fn open(config: &CameraConfig) -> anyhow::Result<Box<dyn FrameSource>> {
    if !config.enabled {
        log::info!("camera disabled, using blank frames");
        return Ok(Box::new(BlankFrames::new(config.fps)));
    }
    open_webcam(config)
}

#[cfg(target_os = "linux")]
fn open_webcam(config: &CameraConfig) -> anyhow::Result<Box<dyn FrameSource>> {
    Ok(Box::new(webcam::Webcam::open(
        config.name.as_deref(),
        config.fps,
    )?))
}

#[cfg(not(target_os = "linux"))]
fn open_webcam(_config: &CameraConfig) -> anyhow::Result<Box<dyn FrameSource>> {
    anyhow::bail!("webcam capture is only supported on Linux (use --no-camera)")
}
