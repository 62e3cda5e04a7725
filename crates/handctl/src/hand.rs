//! Hand observations as reported by a [`HandDetector`].
//!
//! [`HandDetector`]: crate::detect::HandDetector

use std::{fmt, ops::RangeInclusive, str::FromStr};

use serde::Deserialize;

use crate::image::{draw, Color, Image};

/// Number of landmarks reported for every hand.
pub const NUM_LANDMARKS: usize = 21;

/// Normalized coordinates a detector may report for landmarks slightly outside of the frame.
pub const PLAUSIBLE_RANGE: RangeInclusive<f32> = -1.0..=2.0;

/// A landmark position, normalized to the `[0, 1]` range relative to the frame.
///
/// `(0, 0)` is the top left corner of the frame, `(1, 1)` the bottom right one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Computes the Euclidean distance between `self` and `other`.
    #[inline]
    pub fn distance(self, other: Landmark) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Returns whether both coordinates are finite and at most one frame size away from the
    /// frame.
    pub fn is_plausible(self) -> bool {
        PLAUSIBLE_RANGE.contains(&self.x) && PLAUSIBLE_RANGE.contains(&self.y)
    }

    /// Converts the normalized position to pixel coordinates in an image of the given size.
    ///
    /// Positions are clamped to [`PLAUSIBLE_RANGE`] first; NaN maps to 0.
    fn to_pixel(self, image: &Image) -> (i32, i32) {
        let scale = |v: f32, size: u32| {
            let v = v.clamp(*PLAUSIBLE_RANGE.start(), *PLAUSIBLE_RANGE.end());
            (v * size as f32).round() as i32
        };
        (scale(self.x, image.width()), scale(self.y, image.height()))
    }
}

/// Which hand an observation belongs to.
///
/// Left hands drive the screen brightness, right hands the system volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    #[serde(alias = "Left")]
    Left,
    #[serde(alias = "Right")]
    Right,
}

impl Handedness {
    /// Returns the other hand.
    pub fn opposite(self) -> Self {
        match self {
            Handedness::Left => Handedness::Right,
            Handedness::Right => Handedness::Left,
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Handedness::Left => "left",
            Handedness::Right => "right",
        })
    }
}

impl FromStr for Handedness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Handedness::Left),
            "right" | "r" => Ok(Handedness::Right),
            _ => Err(format!("invalid hand '{s}' (expected 'left' or 'right')")),
        }
    }
}

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Surround the palm:
        (Wrist, ThumbCmc),
        (ThumbCmc, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

/// A single detected hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandObservation {
    handedness: Handedness,
    landmarks: [Landmark; NUM_LANDMARKS],
    score: f32,
}

impl HandObservation {
    pub fn new(handedness: Handedness, landmarks: [Landmark; NUM_LANDMARKS]) -> Self {
        Self {
            handedness,
            landmarks,
            score: 1.0,
        }
    }

    /// Creates an observation from a slice of landmarks.
    ///
    /// Returns `None` if `landmarks` does not contain exactly [`NUM_LANDMARKS`] entries.
    pub fn from_slice(handedness: Handedness, landmarks: &[Landmark]) -> Option<Self> {
        let landmarks = <[Landmark; NUM_LANDMARKS]>::try_from(landmarks).ok()?;
        Some(Self::new(handedness, landmarks))
    }

    /// Replaces a single landmark.
    pub fn with_landmark(mut self, idx: LandmarkIdx, landmark: Landmark) -> Self {
        self.landmarks[idx as usize] = landmark;
        self
    }

    /// Sets the detection score reported by the detector.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    #[inline]
    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    #[inline]
    pub fn score(&self) -> f32 {
        self.score
    }

    #[inline]
    pub fn landmarks(&self) -> &[Landmark; NUM_LANDMARKS] {
        &self.landmarks
    }

    #[inline]
    pub fn landmark(&self, idx: LandmarkIdx) -> Landmark {
        self.landmarks[idx as usize]
    }

    #[inline]
    pub fn thumb_tip(&self) -> Landmark {
        self.landmark(LandmarkIdx::ThumbTip)
    }

    #[inline]
    pub fn index_finger_tip(&self) -> Landmark {
        self.landmark(LandmarkIdx::IndexFingerTip)
    }

    /// Draws the hand skeleton onto `image`.
    pub fn draw(&self, image: &mut Image) {
        for (a, b) in CONNECTIVITY {
            let (ax, ay) = self.landmark(*a).to_pixel(image);
            let (bx, by) = self.landmark(*b).to_pixel(image);
            draw::line(image, ax, ay, bx, by)
                .color(Color::WHITE)
                .stroke_width(2);
        }
        for lm in self.landmarks {
            let (x, y) = lm.to_pixel(image);
            draw::marker(image, x, y).color(Color::RED);
        }

        let (x, y) = self.landmark(LandmarkIdx::Wrist).to_pixel(image);
        let label = match self.handedness {
            Handedness::Left => "L",
            Handedness::Right => "R",
        };
        draw::text(image, x, y + 8, label)
            .color(Color::YELLOW)
            .align_top();
    }
}

/// The hands found in a single frame, at most one per side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hands {
    left: Option<HandObservation>,
    right: Option<HandObservation>,
}

impl Hands {
    /// Sorts observations by handedness.
    ///
    /// Detectors should never report two hands with the same handedness in one frame. If they do
    /// anyway, the first observation for a side wins and the others are discarded.
    pub fn classify(observations: impl IntoIterator<Item = HandObservation>) -> Self {
        let mut hands = Hands::default();
        for obs in observations {
            let slot = match obs.handedness() {
                Handedness::Left => &mut hands.left,
                Handedness::Right => &mut hands.right,
            };
            if slot.is_some() {
                log::debug!(
                    "ignoring duplicate {} hand (score={:.2})",
                    obs.handedness(),
                    obs.score()
                );
                continue;
            }
            *slot = Some(obs);
        }
        hands
    }

    #[inline]
    pub fn left(&self) -> Option<&HandObservation> {
        self.left.as_ref()
    }

    #[inline]
    pub fn right(&self) -> Option<&HandObservation> {
        self.right.as_ref()
    }

    pub fn get(&self, handedness: Handedness) -> Option<&HandObservation> {
        match handedness {
            Handedness::Left => self.left(),
            Handedness::Right => self.right(),
        }
    }

    /// Returns the `preferred` hand if it is present, and the other one otherwise.
    pub fn prefer(&self, preferred: Handedness) -> Option<&HandObservation> {
        self.get(preferred)
            .or_else(|| self.get(preferred.opposite()))
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Returns an iterator over the present hands (left first).
    pub fn iter(&self) -> impl Iterator<Item = &HandObservation> + '_ {
        self.left.iter().chain(self.right.iter())
    }
}
