//! Hand landmark detection.
//!
//! The landmark model itself runs outside of this crate. [`HandDetector`] is the seam the control
//! loop uses; [`SubprocessDetector`] talks to a model running in a child process.

mod bridge;

use std::io;

use thiserror::Error;

use crate::{hand::HandObservation, image::Image};

pub use bridge::SubprocessDetector;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("I/O error while talking to the detector")]
    Io(#[from] io::Error),
    #[error("detector process exited")]
    Exited,
    #[error("malformed detector response")]
    Json(#[from] serde_json::Error),
}

/// Finds hands in camera frames.
pub trait HandDetector {
    /// Detects the hands visible in `image`.
    ///
    /// Finding no hands is not an error; an empty list is returned instead.
    fn detect(&mut self, image: &Image) -> Result<Vec<HandObservation>, DetectError>;
}

/// A detector that never finds any hands.
///
/// Used when no detector is configured, so that the preview and the toggle UI still work.
#[derive(Debug, Default)]
pub struct NoHands;

impl HandDetector for NoHands {
    fn detect(&mut self, _image: &Image) -> Result<Vec<HandObservation>, DetectError> {
        Ok(Vec::new())
    }
}
