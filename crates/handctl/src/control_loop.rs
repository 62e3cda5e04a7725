//! The per-frame gesture control loop.
//!
//! Each iteration captures a frame, mirrors it, detects hands, applies the gestures of the
//! enabled controls, draws the overlays and the toggle panel, presents the frame and finally
//! processes user input. See [`ControlLoop::step`].

use std::time::Duration;

use thiserror::Error;

use crate::{
    config::{Config, UiConfig},
    control::{BrightnessControl, CursorControl, VolumeControl},
    detect::HandDetector,
    gesture::{
        level_to_percent, map_pinch_to_range, to_percent, to_screen, ControlRange, PINCH_DOMAIN,
    },
    gui::{Display, WindowMode},
    hand::{Handedness, Hands},
    image::{draw, Color, Image, Resolution},
    state::{ControlState, Toggle},
    timer::{FpsCounter, Timer},
    ui::ToggleUi,
    video::FrameSource,
};

/// How long each iteration waits for user input.
const POLL_TIMEOUT: Duration = Duration::from_millis(1);

const OVERLAY_COLOR: Color = Color::YELLOW;

#[derive(Debug, Error)]
pub enum LoopError {
    /// The camera failed to deliver a frame. The loop cannot continue without frames.
    #[error("failed to capture frame: {0:#}")]
    Capture(anyhow::Error),
}

/// The collaborators driven by a [`ControlLoop`].
pub struct Devices<'a> {
    pub camera: &'a mut dyn FrameSource,
    pub detector: &'a mut dyn HandDetector,
    pub volume: &'a mut dyn VolumeControl,
    pub brightness: &'a mut dyn BrightnessControl,
    pub cursor: &'a mut dyn CursorControl,
    pub display: &'a mut dyn Display,
}

#[derive(Debug, Clone)]
pub struct LoopOptions {
    /// Hand that moves the pointer when both hands are visible.
    pub cursor_hand: Handedness,
    /// Window size used while not maximized.
    pub window: Resolution,
    /// Initial state of the toggles.
    pub toggles: UiConfig,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            cursor_hand: Handedness::Right,
            window: Resolution::RES_720P,
            toggles: UiConfig::default(),
        }
    }
}

impl From<&Config> for LoopOptions {
    fn from(config: &Config) -> Self {
        Self {
            cursor_hand: config.cursor.hand,
            toggles: config.ui.clone(),
            ..Self::default()
        }
    }
}

/// Owns the [`ControlState`] and drives all [`Devices`].
///
/// The camera and the display are released exactly once: when the loop ends because of a capture
/// failure, or when the [`ControlLoop`] is dropped, whichever happens first.
pub struct ControlLoop<'a> {
    devices: Devices<'a>,
    state: ControlState,
    ui: ToggleUi,
    volume_range: ControlRange,
    cursor_hand: Handedness,
    window: Resolution,
    quit: bool,
    released: bool,
    fps: FpsCounter,
    t_capture: Timer,
    t_detect: Timer,
}

impl<'a> ControlLoop<'a> {
    /// Creates a control loop, querying the initial volume and brightness from the OS.
    ///
    /// If a query fails, the corresponding percentage starts out at 0.
    pub fn new(devices: Devices<'a>, options: LoopOptions) -> Self {
        let volume_range = devices.volume.volume_range();
        log::debug!("volume range: {volume_range:?}");

        let volume_percent = match devices.volume.current_level() {
            Ok(level) => level_to_percent(level, volume_range),
            Err(e) => {
                log::warn!("failed to query volume: {e}");
                0
            }
        };
        let brightness_percent = match devices.brightness.current_brightness() {
            Ok(percent) => percent,
            Err(e) => {
                log::warn!("failed to query brightness: {e}");
                0
            }
        };

        let mut state = ControlState::new(volume_percent, brightness_percent);
        let toggles = &options.toggles;
        for (toggle, on) in [
            (Toggle::Volume, toggles.volume),
            (Toggle::Brightness, toggles.brightness),
            (Toggle::Mouse, toggles.mouse),
            (Toggle::Landmarks, toggles.landmarks),
            (Toggle::Locked, toggles.locked),
            (Toggle::Maximized, toggles.maximized),
        ] {
            state.set(toggle, on);
        }
        log::info!("{}", state.status_text());

        Self {
            devices,
            state,
            ui: ToggleUi::new(),
            volume_range,
            cursor_hand: options.cursor_hand,
            window: options.window,
            quit: false,
            released: false,
            fps: FpsCounter::new("control loop"),
            t_capture: Timer::new("capture"),
            t_detect: Timer::new("detect"),
        }
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ControlState {
        &mut self.state
    }

    pub fn volume_range(&self) -> ControlRange {
        self.volume_range
    }

    /// Returns whether a quit was requested.
    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    /// Runs the loop until the user quits or capturing a frame fails.
    pub fn run(mut self) -> Result<(), LoopError> {
        log::info!("starting control loop");
        while self.step()? {}
        log::info!("control loop stopped");
        Ok(())
    }

    /// Runs a single iteration of the loop.
    ///
    /// Returns whether the loop should keep running. Once a quit was requested, no further frames
    /// are captured.
    pub fn step(&mut self) -> Result<bool, LoopError> {
        if self.quit {
            return Ok(false);
        }

        let frame = self.t_capture.time(|| self.devices.camera.capture_frame());
        let mut frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("failed to capture frame: {e:#}");
                self.quit = true;
                self.release();
                return Err(LoopError::Capture(e));
            }
        };

        // Mirror the frame, so that moving the hand to the right moves the pointer to the right.
        frame.flip_horizontal_in_place();

        let observations = match self.t_detect.time(|| self.devices.detector.detect(&frame)) {
            Ok(observations) => observations,
            Err(e) => {
                log::warn!("hand detection failed: {e}");
                Vec::new()
            }
        };
        let hands = Hands::classify(observations);

        if self.state.show_landmarks() {
            for hand in hands.iter() {
                hand.draw(&mut frame);
            }
        }

        if !self.state.locked() {
            self.apply_gestures(&hands, &mut frame);
        }

        self.ui.draw(&mut frame, &self.state);

        let mode = if self.state.maximized() {
            WindowMode::Fullscreen
        } else {
            WindowMode::Windowed(self.window)
        };
        if let Err(e) = self.devices.display.show(&frame, mode) {
            log::error!("failed to display frame: {e}");
            self.quit = true;
        }

        for input in self.devices.display.poll_input(POLL_TIMEOUT) {
            if let Some(event) = self.ui.translate(&input) {
                if self.ui.apply(&mut self.state, event) {
                    self.quit = true;
                }
            }
        }

        let source_timers = self.devices.camera.timers();
        self.fps
            .tick_with([&self.t_capture, &self.t_detect].into_iter().chain(source_timers));
        Ok(!self.quit)
    }

    fn apply_gestures(&mut self, hands: &Hands, frame: &mut Image) {
        if let Some(left) = hands.left().filter(|_| self.state.brightness_enabled()) {
            let value = map_pinch_to_range(
                left.thumb_tip(),
                left.index_finger_tip(),
                PINCH_DOMAIN,
                ControlRange::PERCENT,
            );
            let percent = to_percent(value);
            match self.devices.brightness.set_brightness(percent) {
                Ok(()) => self.state.set_brightness_percent(percent),
                Err(e) => log::warn!("failed to set brightness to {percent}%: {e}"),
            }
            overlay(frame, 70, &format!("Brightness: {percent}%"));
        }

        if let Some(right) = hands.right().filter(|_| self.state.volume_enabled()) {
            let level = map_pinch_to_range(
                right.thumb_tip(),
                right.index_finger_tip(),
                PINCH_DOMAIN,
                self.volume_range,
            );
            let percent = level_to_percent(level, self.volume_range);
            match self.devices.volume.set_level(level) {
                Ok(()) => self.state.set_volume_percent(percent),
                Err(e) => log::warn!("failed to set volume to {level:.2}: {e}"),
            }
            overlay(frame, 40, &format!("Volume: {percent}%"));
        }

        if let Some(hand) = hands
            .prefer(self.cursor_hand)
            .filter(|_| self.state.mouse_enabled())
        {
            let screen = self.devices.cursor.screen_size();
            let (x, y) = to_screen(hand.index_finger_tip(), screen);
            if let Err(e) = self.devices.cursor.move_to(x, y) {
                log::warn!("failed to move pointer to ({x}, {y}): {e}");
            }
            overlay(frame, 100, &format!("Mouse: ({x}, {y})"));
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.devices.camera.release();
        self.devices.display.close();
        log::debug!("released camera and display");
    }
}

impl Drop for ControlLoop<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

fn overlay(frame: &mut Image, y: i32, text: &str) {
    draw::text(frame, 10, y, text)
        .color(OVERLAY_COLOR)
        .align_left();
}
