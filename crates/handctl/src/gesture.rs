//! Mapping of hand poses to control values.
//!
//! Everything in here is pure: the same landmarks always yield the same value.

use std::fmt;

use crate::{hand::Landmark, image::Resolution};

/// Pinch distances (in normalized frame units) that are mapped onto the ends of a control range.
///
/// Distances at or below `0.1` map to the minimum of the target range, distances at or above
/// `0.5` to its maximum.
pub const PINCH_DOMAIN: ControlRange = ControlRange {
    min: 0.1,
    max: 0.5,
};

/// An inclusive `min..=max` range of control values.
#[derive(Clone, Copy, PartialEq)]
pub struct ControlRange {
    min: f32,
    max: f32,
}

impl ControlRange {
    /// The `0..=100` range used for brightness and percentages.
    pub const PERCENT: Self = Self {
        min: 0.0,
        max: 100.0,
    };

    /// Creates a range spanning `min..=max`.
    ///
    /// # Panics
    ///
    /// Panics if `min > max` or if either bound is not finite.
    pub fn new(min: f32, max: f32) -> Self {
        assert!(
            min.is_finite() && max.is_finite(),
            "control range bounds must be finite (got {min}..={max})"
        );
        assert!(min <= max, "invalid control range {min}..={max}");
        Self { min, max }
    }

    /// Creates a range that can be used as the input domain of [`interp`].
    ///
    /// Returns `None` if the range is empty (`min >= max`) or not finite, since such a domain
    /// cannot be interpolated from.
    pub fn domain(min: f32, max: f32) -> Option<Self> {
        if min.is_finite() && max.is_finite() && min < max {
            Some(Self { min, max })
        } else {
            None
        }
    }

    #[inline]
    pub fn min(&self) -> f32 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> f32 {
        self.max
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max - self.min
    }

    /// Clamps `value` into this range.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

impl fmt::Debug for ControlRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

/// Linearly maps `x` from `domain` into `range`, clamping at both ends.
///
/// Values below `domain.min()` yield `range.min()`, values above `domain.max()` yield
/// `range.max()`. If `domain` is empty, every `x` at or below its bound maps to `range.min()`.
pub fn interp(x: f32, domain: ControlRange, range: ControlRange) -> f32 {
    if x <= domain.min {
        return range.min;
    }
    if x >= domain.max {
        return range.max;
    }
    let t = (x - domain.min) / domain.width();
    range.clamp(range.min + t * range.width())
}

/// Computes the pinch distance between the thumb tip and index finger tip.
#[inline]
pub fn pinch_distance(thumb: Landmark, index: Landmark) -> f32 {
    thumb.distance(index)
}

/// Maps the distance between `thumb` and `index` from `domain` into `range`.
///
/// The control loop always passes [`PINCH_DOMAIN`] as the domain.
pub fn map_pinch_to_range(
    thumb: Landmark,
    index: Landmark,
    domain: ControlRange,
    range: ControlRange,
) -> f32 {
    interp(pinch_distance(thumb, index), domain, range)
}

/// Converts a `level` inside of `range` to a percentage, rounding to the nearest integer.
///
/// Percentages are rounded, not truncated: a level at 54.99% reads as 55%.
///
/// A degenerate range (`min == max`) is reported as 0%.
pub fn level_to_percent(level: f32, range: ControlRange) -> u8 {
    if range.width() <= 0.0 {
        return 0;
    }
    let percent = (range.clamp(level) - range.min) / range.width() * 100.0;
    percent.round().clamp(0.0, 100.0) as u8
}

/// Converts a value in `0..=100` to a percentage, rounding to the nearest integer.
pub fn to_percent(value: f32) -> u8 {
    ControlRange::PERCENT.clamp(value).round() as u8
}

/// Maps a normalized landmark position to integer screen coordinates.
///
/// The result is clamped to `0..=width` and `0..=height`.
pub fn to_screen(landmark: Landmark, screen: Resolution) -> (i32, i32) {
    let x = interp(
        landmark.x,
        ControlRange::new(0.0, 1.0),
        ControlRange::new(0.0, screen.width() as f32),
    );
    let y = interp(
        landmark.y,
        ControlRange::new(0.0, 1.0),
        ControlRange::new(0.0, screen.height() as f32),
    );
    (x.round() as i32, y.round() as i32)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const VOLUME: ControlRange = ControlRange {
        min: -65.25,
        max: 0.0,
    };

    fn lm(x: f32, y: f32) -> Landmark {
        Landmark::new(x, y)
    }

    #[test]
    fn clamps_outside_domain() {
        assert_eq!(interp(0.0, PINCH_DOMAIN, VOLUME), -65.25);
        assert_eq!(interp(0.1, PINCH_DOMAIN, VOLUME), -65.25);
        assert_eq!(interp(0.5, PINCH_DOMAIN, VOLUME), 0.0);
        assert_eq!(interp(3.0, PINCH_DOMAIN, VOLUME), 0.0);
        assert_eq!(interp(-1.0, PINCH_DOMAIN, ControlRange::PERCENT), 0.0);
    }

    #[test]
    fn interpolates_linearly() {
        assert_relative_eq!(interp(0.3, PINCH_DOMAIN, ControlRange::PERCENT), 50.0, epsilon = 1e-4);
        assert_relative_eq!(interp(0.3, PINCH_DOMAIN, VOLUME), -32.625, epsilon = 1e-4);
    }

    #[test]
    fn monotonic() {
        let mut distances = (0..500)
            .map(|_| fastrand::f32() * 0.8)
            .collect::<Vec<_>>();
        distances.sort_by(f32::total_cmp);

        let mut last = f32::NEG_INFINITY;
        for d in distances {
            let v = interp(d, PINCH_DOMAIN, VOLUME);
            assert!(v >= last, "{v} < {last} at distance {d}");
            assert!(v >= VOLUME.min() && v <= VOLUME.max());
            last = v;
        }
    }

    #[test]
    fn identical_tips_yield_minimum() {
        let p = lm(0.42, 0.17);
        assert_eq!(map_pinch_to_range(p, p, PINCH_DOMAIN, VOLUME), -65.25);
        assert_eq!(
            map_pinch_to_range(p, p, PINCH_DOMAIN, ControlRange::PERCENT),
            0.0
        );
    }

    #[test]
    fn idempotent() {
        let (thumb, index) = (lm(0.25, 0.4), lm(0.31, 0.7));
        let a = map_pinch_to_range(thumb, index, PINCH_DOMAIN, VOLUME);
        let b = map_pinch_to_range(thumb, index, PINCH_DOMAIN, VOLUME);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn close_pinch_volume() {
        // Distance 0.04 is below the domain.
        let level = map_pinch_to_range(lm(0.30, 0.50), lm(0.30, 0.54), PINCH_DOMAIN, VOLUME);
        assert_eq!(level, -65.25);
        assert_eq!(level_to_percent(level, VOLUME), 0);
    }

    #[test]
    fn wide_pinch_brightness() {
        let thumb = lm(0.20, 0.50);
        let index = lm(0.20, 0.18);
        assert_relative_eq!(pinch_distance(thumb, index), 0.32, epsilon = 1e-5);

        let brightness =
            map_pinch_to_range(thumb, index, PINCH_DOMAIN, ControlRange::PERCENT);
        assert_relative_eq!(brightness, 55.0, epsilon = 1e-3);
        assert_eq!(to_percent(brightness), 55);
    }

    #[test]
    fn percent_rounds_to_nearest() {
        assert_eq!(level_to_percent(-65.25, VOLUME), 0);
        assert_eq!(level_to_percent(0.0, VOLUME), 100);
        assert_eq!(level_to_percent(-32.625, VOLUME), 50);
        // 0.6% of the range rounds up, 0.4% rounds down.
        assert_eq!(level_to_percent(-65.25 + 65.25 * 0.006, VOLUME), 1);
        assert_eq!(level_to_percent(-65.25 + 65.25 * 0.004, VOLUME), 0);
        assert_eq!(level_to_percent(10.0, VOLUME), 100);
        assert_eq!(level_to_percent(5.0, ControlRange::new(5.0, 5.0)), 0);
        assert_eq!(to_percent(99.5), 100);
        assert_eq!(to_percent(-3.0), 0);
    }

    #[test]
    fn degenerate_target_range() {
        let fixed = ControlRange::new(7.0, 7.0);
        assert_eq!(interp(0.05, PINCH_DOMAIN, fixed), 7.0);
        assert_eq!(interp(0.3, PINCH_DOMAIN, fixed), 7.0);
        assert_eq!(interp(0.9, PINCH_DOMAIN, fixed), 7.0);
    }

    #[test]
    fn empty_domain_is_rejected() {
        assert!(ControlRange::domain(0.5, 0.5).is_none());
        assert!(ControlRange::domain(0.5, 0.1).is_none());
        assert!(ControlRange::domain(f32::NAN, 1.0).is_none());
        assert_eq!(ControlRange::domain(0.1, 0.5), Some(PINCH_DOMAIN));
    }

    #[test]
    #[should_panic(expected = "invalid control range")]
    fn inverted_range_panics() {
        ControlRange::new(1.0, 0.0);
    }

    #[test]
    fn screen_mapping() {
        let screen = Resolution::RES_1080P;
        assert_eq!(to_screen(lm(0.0, 0.0), screen), (0, 0));
        assert_eq!(to_screen(lm(0.5, 0.5), screen), (960, 540));
        assert_eq!(to_screen(lm(1.0, 1.0), screen), (1920, 1080));
        assert_eq!(to_screen(lm(-0.2, 1.3), screen), (0, 1080));
    }
}
