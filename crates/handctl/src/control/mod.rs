//! OS controls driven by gestures.
//!
//! The control loop only talks to the OS through the [`VolumeControl`], [`BrightnessControl`]
//! and [`CursorControl`] traits. [`command`] provides implementations that run user-configured
//! shell commands.

pub mod command;

use std::io;

use thiserror::Error;

use crate::{gesture::ControlRange, image::Resolution};

/// An error reported by an OS control.
///
/// Control errors are never fatal: the control loop logs them and tries again with the next frame.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("failed to run `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    Exited {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("could not parse output of `{command}` ({output:?})")]
    Parse { command: String, output: String },
    #[error("{0}")]
    Unsupported(&'static str),
}

/// Access to the system audio volume.
pub trait VolumeControl {
    /// The range of volume levels accepted by [`VolumeControl::set_level`].
    ///
    /// This is queried once at startup.
    fn volume_range(&self) -> ControlRange;

    /// Returns the current volume level.
    fn current_level(&mut self) -> Result<f32, ControlError>;

    /// Sets the volume to `level`, which lies within [`VolumeControl::volume_range`].
    fn set_level(&mut self, level: f32) -> Result<(), ControlError>;
}

/// Access to the display brightness, in percent.
pub trait BrightnessControl {
    fn current_brightness(&mut self) -> Result<u8, ControlError>;

    /// Sets the brightness to `percent` (`0..=100`).
    fn set_brightness(&mut self, percent: u8) -> Result<(), ControlError>;
}

/// Access to the mouse pointer.
pub trait CursorControl {
    /// Size of the screen the pointer moves on, in pixels.
    fn screen_size(&self) -> Resolution;

    /// Moves the pointer to `(x, y)` in screen coordinates.
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), ControlError>;
}
