//! Detector running in a child process.
//!
//! # Protocol
//!
//! The child is started with `sh -c <command>`. Once its model is loaded it prints a single line
//! containing `READY`. After that, for every frame, it is sent:
//!
//! - a 12-byte header: `width`, `height` and `channels` (always 4) as little-endian `u32`s,
//! - `width * height * 4` bytes of RGBA pixel data,
//!
//! and answers with one line of JSON:
//!
//! ```json
//! {"hands": [{"handedness": "Left", "score": 0.93, "landmarks": [{"x": 0.1, "y": 0.2}, ...]}],
//!  "error": null}
//! ```
//!
//! Landmarks may carry additional fields (like `z`), which are ignored.

use std::{
    io::{BufRead, BufReader, BufWriter, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::{
    hand::{HandObservation, Handedness, Landmark, NUM_LANDMARKS},
    image::Image,
};

use super::{DetectError, HandDetector};

#[derive(Debug, Deserialize)]
struct LandmarkJson {
    x: f32,
    y: f32,
}

#[derive(Debug, Deserialize)]
struct HandJson {
    handedness: Handedness,
    #[serde(default = "default_score")]
    score: f32,
    landmarks: Vec<LandmarkJson>,
}

fn default_score() -> f32 {
    1.0
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

/// Parses one response line, dropping malformed hands and hands scoring below `min_score`.
///
/// A hand is malformed if it does not have exactly [`NUM_LANDMARKS`] landmarks, or if any of them
/// is not finite or lies far outside of the frame.
pub(crate) fn parse_response(
    line: &str,
    min_score: f32,
) -> Result<Vec<HandObservation>, DetectError> {
    let response: Response = serde_json::from_str(line)?;
    if let Some(error) = response.error {
        log::debug!("detector reported error: {error}");
        return Ok(Vec::new());
    }

    let hands = response
        .hands
        .into_iter()
        .filter_map(|hand| {
            if hand.score < min_score {
                log::trace!(
                    "dropping {} hand with score {:.2} < {:.2}",
                    hand.handedness,
                    hand.score,
                    min_score
                );
                return None;
            }
            let landmarks = hand
                .landmarks
                .iter()
                .map(|lm| Landmark::new(lm.x, lm.y))
                .collect::<Vec<_>>();
            if let Some(lm) = landmarks.iter().find(|lm| !lm.is_plausible()) {
                log::warn!(
                    "dropping {} hand with landmark outside of the frame: ({}, {})",
                    hand.handedness,
                    lm.x,
                    lm.y
                );
                return None;
            }
            match HandObservation::from_slice(hand.handedness, &landmarks) {
                Some(obs) => Some(obs.with_score(hand.score)),
                None => {
                    log::warn!(
                        "dropping {} hand with {} landmarks (expected {})",
                        hand.handedness,
                        landmarks.len(),
                        NUM_LANDMARKS
                    );
                    None
                }
            }
        })
        .collect();
    Ok(hands)
}

/// A [`HandDetector`] that forwards frames to an external process.
///
/// The process is killed when the detector is dropped.
pub struct SubprocessDetector {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    min_score: f32,
    line: String,
}

impl SubprocessDetector {
    /// Starts `command` and waits until it reports that it is ready.
    pub fn spawn(command: &str, min_score: f32) -> anyhow::Result<Self> {
        log::info!("starting detector `{command}`");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to start detector `{command}`"))?;

        let stdin = child.stdin.take().context("detector stdin not captured")?;
        let stdout = child.stdout.take().context("detector stdout not captured")?;
        let mut this = Self {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
            min_score,
            line: String::new(),
        };

        this.read_line()
            .context("failed to read ready signal from detector")?;
        if this.line.trim() != "READY" {
            bail!(
                "detector did not signal readiness, got {:?}",
                this.line.trim()
            );
        }
        log::info!("detector ready");

        Ok(this)
    }

    fn read_line(&mut self) -> Result<(), DetectError> {
        self.line.clear();
        if self.stdout.read_line(&mut self.line)? == 0 {
            return Err(DetectError::Exited);
        }
        Ok(())
    }

    fn send_frame(&mut self, image: &Image) -> Result<(), DetectError> {
        let mut header = [0; 12];
        header[0..4].copy_from_slice(&image.width().to_le_bytes());
        header[4..8].copy_from_slice(&image.height().to_le_bytes());
        header[8..12].copy_from_slice(&4u32.to_le_bytes());
        self.stdin.write_all(&header)?;
        self.stdin.write_all(image.data())?;
        self.stdin.flush()?;
        Ok(())
    }
}

impl HandDetector for SubprocessDetector {
    fn detect(&mut self, image: &Image) -> Result<Vec<HandObservation>, DetectError> {
        self.send_frame(image)?;
        self.read_line()?;
        parse_response(&self.line, self.min_score)
    }
}

impl Drop for SubprocessDetector {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            log::debug!("failed to kill detector process: {e}");
        }
        self.child.wait().ok();
    }
}

#[cfg(test)]
mod tests {
    use std::iter;

    use itertools::Itertools;

    use super::*;

    fn hand_json(handedness: &str, score: f32, count: usize) -> String {
        let landmarks = iter::repeat(r#"{"x":0.25,"y":0.75,"z":-0.01}"#)
            .take(count)
            .join(",");
        format!(r#"{{"handedness":"{handedness}","score":{score},"landmarks":[{landmarks}]}}"#)
    }

    #[test]
    fn parses_hands() {
        let line = format!(
            r#"{{"hands":[{},{}],"error":null}}"#,
            hand_json("Left", 0.9, 21),
            hand_json("Right", 0.8, 21)
        );
        let hands = parse_response(&line, 0.7).unwrap();
        assert_eq!(hands.len(), 2);
        assert_eq!(hands[0].handedness(), Handedness::Left);
        assert_eq!(hands[1].handedness(), Handedness::Right);
        assert_eq!(hands[1].score(), 0.8);
        assert_eq!(hands[0].thumb_tip(), Landmark::new(0.25, 0.75));
    }

    #[test]
    fn filters_hands() {
        let line = format!(
            r#"{{"hands":[{},{},{}]}}"#,
            hand_json("Left", 0.5, 21),
            hand_json("Right", 0.9, 20),
            hand_json("right", 0.95, 21)
        );
        let hands = parse_response(&line, 0.7).unwrap();
        assert_eq!(hands.len(), 1);
        assert_eq!(hands[0].handedness(), Handedness::Right);
        assert_eq!(hands[0].score(), 0.95);
    }

    #[test]
    fn filters_implausible_landmarks() {
        let good = hand_json("Right", 0.9, 21);
        // `1e39` overflows `f32` and parses as infinity.
        let overflowing = good.replacen(r#""x":0.25"#, r#""x":1e39"#, 1);
        let far_off = good.replacen(r#""y":0.75"#, r#""y":-40.0"#, 1);
        let line = format!(r#"{{"hands":[{overflowing},{far_off},{good}]}}"#);
        let hands = parse_response(&line, 0.7).unwrap();
        assert_eq!(hands.len(), 1);
        assert_eq!(hands[0].thumb_tip(), Landmark::new(0.25, 0.75));
    }

    #[test]
    fn reported_error_is_a_miss() {
        let hands = parse_response(r#"{"hands":[],"error":"decode failed"}"#, 0.7).unwrap();
        assert!(hands.is_empty());
        assert!(parse_response(r#"{"hands":[]}"#, 0.7).unwrap().is_empty());
    }

    #[test]
    fn malformed_response() {
        assert!(matches!(
            parse_response("not json", 0.7),
            Err(DetectError::Json(_))
        ));
        assert!(matches!(
            parse_response(r#"{"hands":[{"handedness":"Middle","landmarks":[]}]}"#, 0.7),
            Err(DetectError::Json(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn subprocess_roundtrip() {
        // Reads the 12-byte header and 2x1 RGBA frame, then answers with a fixed response.
        let response = format!(r#"{{"hands":[{}]}}"#, hand_json("Right", 1.0, 21));
        let script = format!(
            "echo READY; while head -c 20 > /dev/null; do echo '{response}'; done"
        );
        let mut detector = SubprocessDetector::spawn(&script, 0.5).unwrap();

        let image = Image::new(2, 1);
        for _ in 0..2 {
            let hands = detector.detect(&image).unwrap();
            assert_eq!(hands.len(), 1);
            assert_eq!(hands[0].handedness(), Handedness::Right);
        }
    }

    #[cfg(unix)]
    #[test]
    fn missing_ready_signal() {
        assert!(SubprocessDetector::spawn("echo hello", 0.5).is_err());
        assert!(SubprocessDetector::spawn("exit 0", 0.5).is_err());
    }
}
