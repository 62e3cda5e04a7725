//! Hand gesture control of system volume, screen brightness and the mouse pointer.
//!
//! Hands are found in camera frames by a [`detect::HandDetector`]. The [`control_loop`] then
//! maps the distance between thumb and index finger tip to a control value:
//!
//! - the **left** hand controls the screen brightness,
//! - the **right** hand controls the system volume,
//! - the index finger tip of either hand can move the mouse pointer (the right hand wins if both
//!   are visible, unless configured otherwise).
//!
//! A toggle panel drawn over the camera preview enables or disables each control, and can lock
//! all of them at once.
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | `v` | toggle volume control |
//! | `b` | toggle brightness control |
//! | `m` | toggle mouse control |
//! | `l` | show/hide hand landmarks |
//! | `g` | lock/unlock all controls |
//! | `f` | maximize/minimize the preview |
//! | Space, Escape | quit |
//!
//! # Environment Variables
//!
//! * `RUST_LOG`: overrides the default log filter (see [`init_logger!`]).

pub mod config;
pub mod control;
pub mod control_loop;
pub mod detect;
pub mod gesture;
pub mod gui;
pub mod hand;
pub mod image;
pub mod state;
pub mod termination;
pub mod timer;
pub mod ui;
pub mod video;

use log::LevelFilter;

pub use handctl_macros::main;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and `handctl` log at *debug* level, `wgpu` at *warn* level. The `RUST_LOG`
/// environment variable is applied on top of that.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn run<F, R>(cb: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: termination::Termination + Send,
{
    gui::run(cb)
}
