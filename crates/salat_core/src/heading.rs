//! crates/salat_core/src/heading.rs
//!
//! Turns raw device-orientation samples into a stable compass heading.
//!
//! The filter is purely reactive: each sample either updates the heading or is
//! dropped by the throttle or the deadzone. There is no queue and no clock of
//! its own; callers pass a monotonic timestamp with every sample.

use std::f64::consts::PI;
use std::time::Duration;

/// Minimum spacing between accepted updates.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(200);
/// Changes smaller than this (in degrees) are treated as jitter once calibrated.
pub const DEFAULT_DEADZONE_DEGREES: f64 = 3.0;
/// Weight of the new sample in the exponential smoothing step.
pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.15;

/// Pitch magnitude (degrees) below which the device is considered held flat.
const FLAT_PITCH_LIMIT: f64 = 45.0;

//=========================================================================================
// Samples
//=========================================================================================

/// One reading from whichever orientation source the platform exposes.
/// Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrientationSample {
    /// Already a compass heading: 0 is true north, increasing clockwise.
    CompassHeading { heading: f64 },
    /// Yaw/pitch/roll fused with the magnetometer, so yaw is anchored to north.
    AbsoluteOrientation { yaw: f64, pitch: f64, roll: f64 },
    /// Gyroscope-only orientation; yaw has no fixed reference.
    RelativeOrientation { yaw: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleConfidence {
    Absolute,
    Relative,
}

impl OrientationSample {
    pub fn confidence(&self) -> SampleConfidence {
        match self {
            OrientationSample::CompassHeading { .. }
            | OrientationSample::AbsoluteOrientation { .. } => SampleConfidence::Absolute,
            OrientationSample::RelativeOrientation { .. } => SampleConfidence::Relative,
        }
    }

    /// The compass heading this sample implies, in [0, 360), or `None` if any
    /// input angle is not finite.
    pub fn raw_heading(&self) -> Option<f64> {
        let heading = match *self {
            OrientationSample::CompassHeading { heading } => heading,
            OrientationSample::AbsoluteOrientation { yaw, pitch, roll } => {
                if !(yaw.is_finite() && pitch.is_finite() && roll.is_finite()) {
                    return None;
                }
                tilt_compensated_heading(yaw, pitch, roll)
            }
            OrientationSample::RelativeOrientation { yaw } => 360.0 - yaw,
        };
        heading.is_finite().then(|| normalize_degrees(heading))
    }
}

/// Heading from a north-referenced yaw/pitch/roll triple (Z-X'-Y'' order).
///
/// Held flat, the heading is where the top edge of the device points. Tilted
/// up, the top edge points at the sky, so the back of the device is used.
fn tilt_compensated_heading(yaw: f64, pitch: f64, roll: f64) -> f64 {
    let (sa, ca) = yaw.to_radians().sin_cos();
    let (sb, cb) = pitch.to_radians().sin_cos();
    let (sg, cg) = roll.to_radians().sin_cos();

    let (east, north) = if pitch.abs() < FLAT_PITCH_LIMIT {
        (-sa * cb, ca * cb)
    } else {
        (-ca * sg - sa * sb * cg, -sa * sg + ca * sb * cg)
    };

    east.atan2(north) * 180.0 / PI
}

//=========================================================================================
// Angle helpers
//=========================================================================================

/// Wraps any angle into [0, 360).
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Signed shortest rotation from `from` to `to`, in (-180, 180].
pub fn shortest_angular_difference(from: f64, to: f64) -> f64 {
    let diff = normalize_degrees(to - from);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

//=========================================================================================
// Filter
//=========================================================================================

/// Why no heading can be produced. Terminal: the filter never recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HeadingError {
    #[error("device has no orientation sensor")]
    Unsupported,
    #[error("orientation permission was denied")]
    PermissionDenied,
}

/// What happened to one fed sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOutcome {
    /// The smoothed heading moved to this value.
    Updated(f64),
    /// Arrived sooner than the minimum interval after the last update.
    Throttled,
    /// Within the deadzone of the current heading.
    BelowDeadzone,
    /// Contained non-finite angles.
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingFilterConfig {
    pub min_interval: Duration,
    pub deadzone_degrees: f64,
    pub smoothing_factor: f64,
}

impl Default for HeadingFilterConfig {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            deadzone_degrees: DEFAULT_DEADZONE_DEGREES,
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
        }
    }
}

/// Circular low-pass filter for compass headings.
#[derive(Debug, Clone)]
pub struct HeadingFilter {
    config: HeadingFilterConfig,
    /// `None` until the first accepted sample calibrates the filter.
    last_heading: Option<f64>,
    last_update: Option<Duration>,
    unavailable: Option<HeadingError>,
}

impl HeadingFilter {
    pub fn new(config: HeadingFilterConfig) -> Self {
        Self {
            config,
            last_heading: None,
            last_update: None,
            unavailable: None,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.last_heading.is_some()
    }

    /// The smoothed heading, `Ok(None)` while uncalibrated.
    pub fn heading(&self) -> Result<Option<f64>, HeadingError> {
        match self.unavailable {
            Some(reason) => Err(reason),
            None => Ok(self.last_heading),
        }
    }

    /// Records that the sensor is missing or permission was refused.
    /// Every later call reports the same error.
    pub fn mark_unavailable(&mut self, reason: HeadingError) {
        self.unavailable = Some(reason);
        self.last_heading = None;
    }

    /// Feeds one sample taken at monotonic time `at`.
    pub fn feed(&mut self, sample: &OrientationSample, at: Duration) -> Result<FilterOutcome, HeadingError> {
        if let Some(reason) = self.unavailable {
            return Err(reason);
        }

        let Some(raw) = sample.raw_heading() else {
            return Ok(FilterOutcome::Invalid);
        };

        if let Some(last) = self.last_update {
            if at.saturating_sub(last) < self.config.min_interval {
                return Ok(FilterOutcome::Throttled);
            }
        }

        let next = match self.last_heading {
            None => raw,
            Some(current) => {
                let diff = shortest_angular_difference(current, raw);
                if diff.abs() < self.config.deadzone_degrees {
                    return Ok(FilterOutcome::BelowDeadzone);
                }
                normalize_degrees(current + diff * self.config.smoothing_factor)
            }
        };

        self.last_heading = Some(next);
        self.last_update = Some(at);
        Ok(FilterOutcome::Updated(next))
    }
}

impl Default for HeadingFilter {
    fn default() -> Self {
        Self::new(HeadingFilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn compass(heading: f64) -> OrientationSample {
        OrientationSample::CompassHeading { heading }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn shortest_difference_stays_in_half_open_range() {
        let mut a = -720.0;
        while a <= 720.0 {
            let mut b = -720.0;
            while b <= 720.0 {
                let d = shortest_angular_difference(a, b);
                assert!(d > -180.0 && d <= 180.0, "a={a} b={b} d={d}");
                let reached = normalize_degrees(a + d);
                let target = normalize_degrees(b);
                assert!(
                    approx(reached, target) || approx((reached - target).abs(), 360.0),
                    "a={a} b={b}"
                );
                b += 7.5;
            }
            a += 11.0;
        }
        assert_eq!(shortest_angular_difference(0.0, 180.0), 180.0);
        assert_eq!(shortest_angular_difference(180.0, 0.0), 180.0);
        assert_eq!(shortest_angular_difference(350.0, 10.0), 20.0);
        assert_eq!(shortest_angular_difference(10.0, 350.0), -20.0);
    }

    #[test]
    fn normalizes_into_range() {
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(725.0), 5.0);
        assert!(normalize_degrees(-1e-15) < 360.0);
    }

    #[test]
    fn first_sample_calibrates_directly() {
        let mut filter = HeadingFilter::default();
        assert_eq!(filter.heading(), Ok(None));
        assert_eq!(filter.feed(&compass(123.0), ms(0)), Ok(FilterOutcome::Updated(123.0)));
        assert!(filter.is_calibrated());
    }

    #[test]
    fn crossing_north_converges_without_jump() {
        let mut filter = HeadingFilter::default();
        let mut previous: Option<f64> = None;

        for (i, raw) in [350.0, 355.0, 2.0, 8.0].into_iter().enumerate() {
            let outcome = filter.feed(&compass(raw), ms(250 * i as u64)).unwrap();
            let FilterOutcome::Updated(heading) = outcome else {
                panic!("sample {raw} was dropped: {outcome:?}");
            };
            assert!((0.0..360.0).contains(&heading));
            assert!(heading >= 345.0 || heading <= 10.0, "jumped to {heading}");
            if let Some(prev) = previous {
                let step = shortest_angular_difference(prev, heading);
                assert!(step > 0.0 && step < 5.0, "step {step}");
            }
            previous = Some(heading);
        }
    }

    #[test]
    fn smoothing_moves_a_fraction_of_the_shortest_path() {
        let mut filter = HeadingFilter::default();
        filter.feed(&compass(350.0), ms(0)).unwrap();
        let outcome = filter.feed(&compass(10.0), ms(300)).unwrap();
        assert_matches!(outcome, FilterOutcome::Updated(h) if approx(h, 353.0));
    }

    #[test]
    fn deadzone_keeps_heading_unchanged() {
        let mut filter = HeadingFilter::default();
        filter.feed(&compass(100.0), ms(0)).unwrap();
        assert_eq!(filter.feed(&compass(101.0), ms(500)), Ok(FilterOutcome::BelowDeadzone));
        assert_eq!(filter.feed(&compass(99.0), ms(1000)), Ok(FilterOutcome::BelowDeadzone));
        assert_eq!(filter.heading(), Ok(Some(100.0)));
    }

    #[test]
    fn throttle_accepts_one_update_per_interval() {
        let mut filter = HeadingFilter::default();
        let mut accepted = Vec::new();

        for step in 0..10u64 {
            let at = ms(step * 50);
            let raw = (step * 20) as f64;
            if let Ok(FilterOutcome::Updated(_)) = filter.feed(&compass(raw), at) {
                accepted.push(at);
            }
        }

        assert_eq!(accepted, vec![ms(0), ms(200), ms(400)]);
    }

    #[test]
    fn relative_orientation_uses_inverted_yaw() {
        let sample = OrientationSample::RelativeOrientation { yaw: 90.0 };
        assert_eq!(sample.raw_heading(), Some(270.0));
        assert_eq!(sample.confidence(), SampleConfidence::Relative);
        assert_eq!(
            OrientationSample::RelativeOrientation { yaw: 0.0 }.raw_heading(),
            Some(0.0)
        );
    }

    #[test]
    fn absolute_orientation_flat_follows_top_edge() {
        let sample = OrientationSample::AbsoluteOrientation { yaw: 90.0, pitch: 10.0, roll: 5.0 };
        assert!(approx(sample.raw_heading().unwrap(), 270.0));
        assert_eq!(sample.confidence(), SampleConfidence::Absolute);
    }

    #[test]
    fn absolute_orientation_tilted_follows_back_of_device() {
        let upright = OrientationSample::AbsoluteOrientation { yaw: 0.0, pitch: 90.0, roll: 0.0 };
        assert!(approx(upright.raw_heading().unwrap(), 0.0));

        let turned = OrientationSample::AbsoluteOrientation { yaw: 90.0, pitch: 80.0, roll: 0.0 };
        assert!(approx(turned.raw_heading().unwrap(), 270.0));
    }

    #[test]
    fn non_finite_samples_are_dropped() {
        let mut filter = HeadingFilter::default();
        let nan = OrientationSample::AbsoluteOrientation { yaw: f64::NAN, pitch: 0.0, roll: 0.0 };
        assert_eq!(filter.feed(&nan, ms(0)), Ok(FilterOutcome::Invalid));
        assert!(!filter.is_calibrated());
    }

    #[test]
    fn unavailable_is_terminal() {
        let mut filter = HeadingFilter::default();
        filter.feed(&compass(45.0), ms(0)).unwrap();
        filter.mark_unavailable(HeadingError::PermissionDenied);

        assert_eq!(filter.heading(), Err(HeadingError::PermissionDenied));
        assert_eq!(
            filter.feed(&compass(50.0), ms(1000)),
            Err(HeadingError::PermissionDenied)
        );
    }
}
