//! Controls backed by shell commands.
//!
//! Each control runs a user-supplied command template through `sh -c` after substituting the new
//! value for its placeholders:
//!
//! - `{level}`: volume level, in units of the configured volume range
//! - `{percent}`: volume or brightness in percent
//! - `{x}`, `{y}`: pointer position in screen pixels
//!
//! Controls without a configured command (or in dry-run mode) only log the values they would set.

use std::process::Command;

use crate::{
    config::{BrightnessConfig, Config, CursorConfig, VolumeConfig},
    gesture::{level_to_percent, ControlRange},
    image::Resolution,
};

use super::{BrightnessControl, ControlError, CursorControl, VolumeControl};

/// Substitutes `{name}` placeholders in `template`.
pub fn render(template: &str, vars: &[(&str, String)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{name}}}"), value)
    })
}

/// Runs `command` with `sh -c` and returns its standard output.
fn run(command: &str) -> Result<String, ControlError> {
    log::trace!("running `{command}`");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .map_err(|source| ControlError::Spawn {
            command: command.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(ControlError::Exited {
            command: command.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parses the first number printed by `command`.
///
/// A trailing `%` is accepted, so that the output of tools like `brightnessctl` or `pamixer` can
/// be used directly.
fn parse_number(command: &str, output: &str) -> Result<f32, ControlError> {
    output
        .split_whitespace()
        .map(|word| word.trim_end_matches('%'))
        .find_map(|word| word.parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .ok_or_else(|| ControlError::Parse {
            command: command.to_string(),
            output: output.trim().to_string(),
        })
}

/// Runs a setter command, skipping it if it is identical to the previous one.
struct Setter {
    name: &'static str,
    template: Option<String>,
    dry_run: bool,
    last: Option<String>,
}

impl Setter {
    fn new(name: &'static str, template: Option<String>, dry_run: bool) -> Self {
        Self {
            name,
            template,
            dry_run,
            last: None,
        }
    }

    fn set(&mut self, display: &str, vars: &[(&str, String)]) -> Result<(), ControlError> {
        let command = match &self.template {
            Some(template) if !self.dry_run => render(template, vars),
            _ => {
                if self.last.as_deref() != Some(display) {
                    log::debug!("{}: {display}", self.name);
                    self.last = Some(display.to_string());
                }
                return Ok(());
            }
        };
        if self.last.as_deref() == Some(command.as_str()) {
            return Ok(());
        }
        run(&command)?;
        self.last = Some(command);
        Ok(())
    }
}

/// Volume control running configurable commands.
pub struct CommandVolume {
    range: ControlRange,
    initial: Option<f32>,
    get: Option<String>,
    setter: Setter,
}

impl CommandVolume {
    pub fn new(config: &VolumeConfig, dry_run: bool) -> anyhow::Result<Self> {
        Ok(Self {
            range: config.range()?,
            initial: config.initial,
            get: config.get.clone(),
            setter: Setter::new("volume", config.set.clone(), dry_run),
        })
    }
}

impl VolumeControl for CommandVolume {
    fn volume_range(&self) -> ControlRange {
        self.range
    }

    fn current_level(&mut self) -> Result<f32, ControlError> {
        match (&self.get, self.initial) {
            (Some(get), _) => {
                let level = parse_number(get, &run(get)?)?;
                Ok(self.range.clamp(level))
            }
            (None, Some(initial)) => Ok(self.range.clamp(initial)),
            (None, None) => Err(ControlError::Unsupported(
                "no volume query command configured",
            )),
        }
    }

    fn set_level(&mut self, level: f32) -> Result<(), ControlError> {
        let percent = level_to_percent(level, self.range);
        self.setter.set(
            &format!("{level:.2} ({percent}%)"),
            &[
                ("level", format!("{level:.2}")),
                ("percent", percent.to_string()),
            ],
        )
    }
}

/// Brightness control running configurable commands.
pub struct CommandBrightness {
    initial: Option<u8>,
    get: Option<String>,
    setter: Setter,
}

impl CommandBrightness {
    pub fn new(config: &BrightnessConfig, dry_run: bool) -> Self {
        Self {
            initial: config.initial,
            get: config.get.clone(),
            setter: Setter::new("brightness", config.set.clone(), dry_run),
        }
    }
}

impl BrightnessControl for CommandBrightness {
    fn current_brightness(&mut self) -> Result<u8, ControlError> {
        match (&self.get, self.initial) {
            (Some(get), _) => {
                let percent = parse_number(get, &run(get)?)?;
                Ok(percent.round().clamp(0.0, 100.0) as u8)
            }
            (None, Some(initial)) => Ok(initial.min(100)),
            (None, None) => Err(ControlError::Unsupported(
                "no brightness query command configured",
            )),
        }
    }

    fn set_brightness(&mut self, percent: u8) -> Result<(), ControlError> {
        self.setter.set(
            &format!("{percent}%"),
            &[("percent", percent.to_string())],
        )
    }
}

/// Pointer control running a configurable command.
pub struct CommandCursor {
    screen: Resolution,
    setter: Setter,
}

impl CommandCursor {
    pub fn new(config: &CursorConfig, dry_run: bool) -> Self {
        Self {
            screen: config.screen(),
            setter: Setter::new("cursor", config.move_cmd.clone(), dry_run),
        }
    }
}

impl CursorControl for CommandCursor {
    fn screen_size(&self) -> Resolution {
        self.screen
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<(), ControlError> {
        self.setter.set(
            &format!("({x}, {y})"),
            &[("x", x.to_string()), ("y", y.to_string())],
        )
    }
}

/// All three controls, configured from a [`Config`].
pub struct CommandBackend {
    pub volume: CommandVolume,
    pub brightness: CommandBrightness,
    pub cursor: CommandCursor,
}

impl CommandBackend {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let dry_run = config.dry_run;
        if dry_run {
            log::info!("dry run: control values will only be logged");
        }
        Ok(Self {
            volume: CommandVolume::new(&config.volume, dry_run)?,
            brightness: CommandBrightness::new(&config.brightness, dry_run),
            cursor: CommandCursor::new(&config.cursor, dry_run),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_placeholders() {
        assert_eq!(
            render(
                "xdotool mousemove {x} {y}",
                &[("x", "10".into()), ("y", "-4".into())]
            ),
            "xdotool mousemove 10 -4"
        );
        assert_eq!(
            render("set {percent}% {percent}", &[("percent", "7".into())]),
            "set 7% 7"
        );
        assert_eq!(render("no {placeholders}", &[]), "no {placeholders}");
    }

    #[test]
    fn parse_output() {
        assert_eq!(parse_number("cmd", "42\n").unwrap(), 42.0);
        assert_eq!(parse_number("cmd", "Volume: 55%").unwrap(), 55.0);
        assert_eq!(parse_number("cmd", "-20.5 dB").unwrap(), -20.5);
        assert!(matches!(
            parse_number("cmd", "muted"),
            Err(ControlError::Parse { .. })
        ));
    }

    #[test]
    fn dry_run_never_runs_commands() {
        let config = VolumeConfig {
            set: Some("exit 1".into()),
            ..VolumeConfig::default()
        };
        let mut volume = CommandVolume::new(&config, true).unwrap();
        volume.set_level(-10.0).unwrap();
    }

    #[test]
    fn initial_values() {
        let mut volume = CommandVolume::new(
            &VolumeConfig {
                initial: Some(-100.0),
                ..VolumeConfig::default()
            },
            false,
        )
        .unwrap();
        assert_eq!(volume.current_level().unwrap(), -65.25);

        let mut brightness = CommandBrightness::new(&BrightnessConfig::default(), false);
        assert!(matches!(
            brightness.current_brightness(),
            Err(ControlError::Unsupported(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn runs_commands() {
        let mut brightness = CommandBrightness::new(
            &BrightnessConfig {
                get: Some("echo 64%".into()),
                set: Some("test {percent} -eq 30".into()),
                ..BrightnessConfig::default()
            },
            false,
        );
        assert_eq!(brightness.current_brightness().unwrap(), 64);
        brightness.set_brightness(30).unwrap();
        assert!(matches!(
            brightness.set_brightness(31),
            Err(ControlError::Exited { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn skips_repeated_values() {
        let dir = std::env::temp_dir().join(format!("handctl-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let log = dir.join("moves");
        let mut cursor = CommandCursor::new(
            &CursorConfig {
                move_cmd: Some(format!("echo {{x}},{{y}} >> '{}'", log.display())),
                ..CursorConfig::default()
            },
            false,
        );
        cursor.move_to(1, 2).unwrap();
        cursor.move_to(1, 2).unwrap();
        cursor.move_to(3, 4).unwrap();

        let moves = std::fs::read_to_string(&log).unwrap();
        std::fs::remove_dir_all(&dir).ok();
        assert_eq!(moves, "1,2\n3,4\n");
    }
}
