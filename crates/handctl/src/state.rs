//! The mutable state shared by the control loop and the toggle UI.

use std::fmt;

/// Names one of the boolean flags of a [`ControlState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toggle {
    Volume,
    Brightness,
    Mouse,
    Landmarks,
    Maximized,
    Locked,
}

impl Toggle {
    pub const ALL: [Toggle; 6] = [
        Toggle::Volume,
        Toggle::Brightness,
        Toggle::Mouse,
        Toggle::Landmarks,
        Toggle::Maximized,
        Toggle::Locked,
    ];
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Toggle::Volume => "volume control",
            Toggle::Brightness => "brightness control",
            Toggle::Mouse => "mouse control",
            Toggle::Landmarks => "hand landmarks",
            Toggle::Maximized => "maximized video",
            Toggle::Locked => "control lock",
        })
    }
}

/// Feature toggles and the most recently applied control values.
///
/// Every flag is independent of the others. `locked` suppresses all OS control while detection and
/// rendering continue, `maximized` only changes the size of the preview window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    volume_enabled: bool,
    brightness_enabled: bool,
    mouse_enabled: bool,
    show_landmarks: bool,
    locked: bool,
    maximized: bool,
    volume_percent: u8,
    brightness_percent: u8,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            volume_enabled: true,
            brightness_enabled: true,
            mouse_enabled: false,
            show_landmarks: true,
            locked: false,
            maximized: false,
            volume_percent: 0,
            brightness_percent: 0,
        }
    }
}

impl ControlState {
    /// Creates the startup state from the volume and brightness percentages queried from the OS.
    pub fn new(volume_percent: u8, brightness_percent: u8) -> Self {
        Self {
            volume_percent: volume_percent.min(100),
            brightness_percent: brightness_percent.min(100),
            ..Self::default()
        }
    }

    pub fn get(&self, toggle: Toggle) -> bool {
        match toggle {
            Toggle::Volume => self.volume_enabled,
            Toggle::Brightness => self.brightness_enabled,
            Toggle::Mouse => self.mouse_enabled,
            Toggle::Landmarks => self.show_landmarks,
            Toggle::Maximized => self.maximized,
            Toggle::Locked => self.locked,
        }
    }

    pub fn set(&mut self, toggle: Toggle, value: bool) {
        let flag = match toggle {
            Toggle::Volume => &mut self.volume_enabled,
            Toggle::Brightness => &mut self.brightness_enabled,
            Toggle::Mouse => &mut self.mouse_enabled,
            Toggle::Landmarks => &mut self.show_landmarks,
            Toggle::Maximized => &mut self.maximized,
            Toggle::Locked => &mut self.locked,
        };
        *flag = value;
    }

    /// Flips the flag named by `toggle` and returns its new value.
    pub fn toggle(&mut self, toggle: Toggle) -> bool {
        let value = !self.get(toggle);
        self.set(toggle, value);
        value
    }

    pub fn volume_enabled(&self) -> bool {
        self.volume_enabled
    }

    pub fn set_volume_enabled(&mut self, enabled: bool) {
        self.volume_enabled = enabled;
    }

    pub fn brightness_enabled(&self) -> bool {
        self.brightness_enabled
    }

    pub fn set_brightness_enabled(&mut self, enabled: bool) {
        self.brightness_enabled = enabled;
    }

    pub fn mouse_enabled(&self) -> bool {
        self.mouse_enabled
    }

    pub fn set_mouse_enabled(&mut self, enabled: bool) {
        self.mouse_enabled = enabled;
    }

    pub fn show_landmarks(&self) -> bool {
        self.show_landmarks
    }

    pub fn set_show_landmarks(&mut self, show: bool) {
        self.show_landmarks = show;
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn maximized(&self) -> bool {
        self.maximized
    }

    pub fn set_maximized(&mut self, maximized: bool) {
        self.maximized = maximized;
    }

    pub fn volume_percent(&self) -> u8 {
        self.volume_percent
    }

    /// Records the last volume applied, in percent of the OS volume range.
    pub fn set_volume_percent(&mut self, percent: u8) {
        self.volume_percent = percent.min(100);
    }

    pub fn brightness_percent(&self) -> u8 {
        self.brightness_percent
    }

    pub fn set_brightness_percent(&mut self, percent: u8) {
        self.brightness_percent = percent.min(100);
    }

    /// Label of the lock button, naming the action a click performs.
    pub fn lock_label(&self) -> &'static str {
        if self.locked {
            "Unlock Control"
        } else {
            "Lock Control"
        }
    }

    /// Label of the maximize button, naming the action a click performs.
    pub fn maximize_label(&self) -> &'static str {
        if self.maximized {
            "Minimize Video"
        } else {
            "Maximize Video"
        }
    }

    pub fn status_text(&self) -> String {
        format!(
            "Status: Volume: {}% Brightness: {}%",
            self.volume_percent, self.brightness_percent
        )
    }
}
