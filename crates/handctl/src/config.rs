//! Configuration file and command line.
//!
//! Every setting has a default, so running without a configuration file gives a working (but
//! dry-run) setup. Command line flags take precedence over the file.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

use crate::{gesture::ControlRange, hand::Handedness, image::Resolution};

/// Name of the configuration file picked up from the working directory when `--config` is not
/// given.
pub const DEFAULT_CONFIG_FILE: &str = "handctl.toml";

/// Control system volume, screen brightness and the mouse pointer with hand gestures.
#[derive(Debug, Default, Parser)]
#[command(version, about)]
pub struct Args {
    /// Path to a TOML configuration file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Name of the webcam to use.
    #[arg(long, value_name = "NAME", conflicts_with = "no_camera")]
    pub camera: Option<String>,

    /// Run on blank frames instead of a camera.
    #[arg(long)]
    pub no_camera: bool,

    /// Command that starts the hand landmark detector.
    #[arg(long, value_name = "CMD")]
    pub detector: Option<String>,

    /// Log control values instead of running the configured commands.
    #[arg(long)]
    pub dry_run: bool,

    /// Hand that moves the mouse pointer when both hands are visible.
    #[arg(long, value_name = "left|right")]
    pub cursor_hand: Option<Handedness>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub volume: VolumeConfig,
    pub brightness: BrightnessConfig,
    pub cursor: CursorConfig,
    pub ui: UiConfig,
    /// Only log control values, never run commands.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    /// Open the webcam. When `false`, blank frames are used.
    pub enabled: bool,
    /// Card name of the webcam; the first compatible device is used if unset.
    pub name: Option<String>,
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: None,
            fps: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    /// Shell command that starts the landmark detector process.
    pub command: Option<String>,
    /// Hands with a lower detection score are ignored.
    pub min_score: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            command: None,
            min_score: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VolumeConfig {
    /// Minimum and maximum volume level (typically in dB).
    pub range: [f32; 2],
    /// Level assumed at startup if no `get` command is configured.
    pub initial: Option<f32>,
    /// Command printing the current level.
    pub get: Option<String>,
    /// Command setting the level; `{level}` and `{percent}` are substituted.
    pub set: Option<String>,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            range: [-65.25, 0.0],
            initial: None,
            get: None,
            set: None,
        }
    }
}

impl VolumeConfig {
    pub fn range(&self) -> anyhow::Result<ControlRange> {
        let [min, max] = self.range;
        if !(min.is_finite() && max.is_finite() && min <= max) {
            anyhow::bail!("invalid volume range [{min}, {max}]");
        }
        Ok(ControlRange::new(min, max))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrightnessConfig {
    /// Brightness assumed at startup if no `get` command is configured.
    pub initial: Option<u8>,
    /// Command printing the current brightness in percent.
    pub get: Option<String>,
    /// Command setting the brightness; `{percent}` is substituted.
    pub set: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CursorConfig {
    /// Screen size in pixels.
    pub screen: [u32; 2],
    /// Command moving the pointer; `{x}` and `{y}` are substituted.
    #[serde(rename = "move")]
    pub move_cmd: Option<String>,
    /// Hand that moves the pointer when both hands are visible.
    pub hand: Handedness,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            screen: [1920, 1080],
            move_cmd: None,
            hand: Handedness::Right,
        }
    }
}

impl CursorConfig {
    pub fn screen(&self) -> Resolution {
        Resolution::new(self.screen[0], self.screen[1])
    }
}

/// Initial state of the toggles.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UiConfig {
    pub volume: bool,
    pub brightness: bool,
    pub mouse: bool,
    pub landmarks: bool,
    pub locked: bool,
    pub maximized: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            volume: true,
            brightness: true,
            mouse: false,
            landmarks: true,
            locked: false,
            maximized: false,
        }
    }
}

impl Config {
    /// Parses a configuration from TOML.
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.volume.range()?;
        Ok(config)
    }

    /// Reads a configuration file.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        Self::from_toml(&s).with_context(|| format!("invalid config file '{}'", path.display()))
    }

    /// Loads the configuration selected by `args` and applies the command line overrides.
    ///
    /// Without `--config`, [`DEFAULT_CONFIG_FILE`] is read if it exists in the working directory.
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::read(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::read(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                log::debug!("no config file found, using defaults");
                Self::default()
            }
        };
        config.apply_args(args);
        Ok(config)
    }

    /// Applies command line overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(name) = &args.camera {
            self.camera.name = Some(name.clone());
            self.camera.enabled = true;
        }
        if args.no_camera {
            self.camera.enabled = false;
        }
        if let Some(command) = &args.detector {
            self.detector.command = Some(command.clone());
        }
        if args.dry_run {
            self.dry_run = true;
        }
        if let Some(hand) = args.cursor_hand {
            self.cursor.hand = hand;
        }
    }
}
