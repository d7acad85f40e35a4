//! services/api/src/adapters/solar.rs
//!
//! This module contains the solar prayer-time calculator, the concrete
//! implementation of the `PrayerTimeCalculator` port.
//!
//! Sun declination and the equation of time are taken from the low-precision
//! almanac formulas (good to about a minute between 1950 and 2050). Dhuhr is
//! solar noon; the other times are the moments the sun crosses a given angle
//! below (or, for asr, above) the horizon.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use salat_core::domain::{
    CalculationMethod, CalculationSettings, DailyPrayerTimes, HighLatitudeRule, Location,
};
use salat_core::ports::{PortError, PortResult, PrayerTimeCalculator};

/// Sun's apparent radius plus refraction at the horizon.
const RISE_SET_ANGLE: f64 = 0.833;

//=========================================================================================
// Method Parameters
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum IshaRule {
    /// Sun depression angle in degrees.
    Angle(f64),
    /// Fixed interval after maghrib.
    MinutesAfterMaghrib(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MethodParameters {
    fajr_angle: f64,
    isha: IshaRule,
    /// Depression angle for maghrib when it is not plain sunset.
    maghrib_angle: Option<f64>,
}

impl MethodParameters {
    const fn angles(fajr: f64, isha: f64) -> Self {
        Self {
            fajr_angle: fajr,
            isha: IshaRule::Angle(isha),
            maghrib_angle: None,
        }
    }
}

fn parameters(method: CalculationMethod) -> MethodParameters {
    use CalculationMethod::*;
    match method {
        MuslimWorldLeague => MethodParameters::angles(18.0, 17.0),
        Egyptian => MethodParameters::angles(19.5, 17.5),
        Karachi => MethodParameters::angles(18.0, 18.0),
        UmmAlQura => MethodParameters {
            fajr_angle: 18.5,
            isha: IshaRule::MinutesAfterMaghrib(90.0),
            maghrib_angle: None,
        },
        Dubai => MethodParameters::angles(18.2, 18.2),
        MoonsightingCommittee => MethodParameters::angles(18.0, 18.0),
        NorthAmerica => MethodParameters::angles(15.0, 15.0),
        Kuwait => MethodParameters::angles(18.0, 17.5),
        Qatar => MethodParameters {
            fajr_angle: 18.0,
            isha: IshaRule::MinutesAfterMaghrib(90.0),
            maghrib_angle: None,
        },
        Singapore => MethodParameters::angles(20.0, 18.0),
        Tehran => MethodParameters {
            fajr_angle: 17.7,
            isha: IshaRule::Angle(14.0),
            maghrib_angle: Some(4.5),
        },
        Turkey => MethodParameters::angles(18.0, 17.0),
    }
}

//=========================================================================================
// Sun Position
//=========================================================================================

#[derive(Debug, Clone, Copy)]
struct SunPosition {
    /// Degrees.
    declination: f64,
    /// Hours.
    equation_of_time: f64,
}

fn sin_deg(d: f64) -> f64 {
    d.to_radians().sin()
}

fn cos_deg(d: f64) -> f64 {
    d.to_radians().cos()
}

fn wrap(value: f64, period: f64) -> f64 {
    value.rem_euclid(period)
}

/// Julian day at 0h UT of the given calendar date.
fn julian_day(date: NaiveDate) -> f64 {
    let (mut year, mut month) = (date.year() as f64, date.month() as f64);
    if month <= 2.0 {
        year -= 1.0;
        month += 12.0;
    }
    let a = (year / 100.0).floor();
    let b = 2.0 - a + (a / 4.0).floor();
    (365.25 * (year + 4716.0)).floor() + (30.6001 * (month + 1.0)).floor() + date.day() as f64 + b
        - 1524.5
}

fn sun_position(jd: f64) -> SunPosition {
    let d = jd - 2451545.0;
    let g = wrap(357.529 + 0.98560028 * d, 360.0);
    let q = wrap(280.459 + 0.98564736 * d, 360.0);
    let l = wrap(q + 1.915 * sin_deg(g) + 0.020 * sin_deg(2.0 * g), 360.0);
    let e = 23.439 - 0.00000036 * d;

    let right_ascension = (cos_deg(e) * sin_deg(l)).atan2(cos_deg(l)).to_degrees() / 15.0;
    SunPosition {
        declination: (sin_deg(e) * sin_deg(l)).asin().to_degrees(),
        equation_of_time: q / 15.0 - wrap(right_ascension, 24.0),
    }
}

/// Solar-time computations for one date and latitude. Results are hours of
/// local mean solar time; `None` means the sun never reaches the angle.
struct SolarDay {
    jd: f64,
    latitude: f64,
}

impl SolarDay {
    fn mid_day(&self, guess_hours: f64) -> f64 {
        let eqt = sun_position(self.jd + guess_hours / 24.0).equation_of_time;
        wrap(12.0 - eqt, 24.0)
    }

    fn sun_angle_time(&self, angle: f64, guess_hours: f64, before_noon: bool) -> Option<f64> {
        let decl = sun_position(self.jd + guess_hours / 24.0).declination;
        let noon = self.mid_day(guess_hours);
        let cos_h = (-sin_deg(angle) - sin_deg(decl) * sin_deg(self.latitude))
            / (cos_deg(decl) * cos_deg(self.latitude));
        if !(-1.0..=1.0).contains(&cos_h) {
            return None;
        }
        let t = cos_h.acos().to_degrees() / 15.0;
        Some(if before_noon { noon - t } else { noon + t })
    }

    fn asr_time(&self, shadow_factor: f64, guess_hours: f64) -> Option<f64> {
        let decl = sun_position(self.jd + guess_hours / 24.0).declination;
        let altitude = (1.0 / (shadow_factor + (self.latitude - decl).abs().to_radians().tan()))
            .atan()
            .to_degrees();
        self.sun_angle_time(-altitude, guess_hours, false)
    }
}

/// Share of the night that bounds fajr/isha at high latitudes.
fn night_portion(rule: HighLatitudeRule, angle: f64, night: f64) -> f64 {
    let share = match rule {
        HighLatitudeRule::MiddleOfTheNight => 0.5,
        HighLatitudeRule::SeventhOfTheNight => 1.0 / 7.0,
        HighLatitudeRule::TwilightAngle => angle / 60.0,
    };
    share * night
}

/// Bounds `time` to within `portion` hours of `base`.
fn bound_by_night(time: Option<f64>, base: f64, portion: f64, before_base: bool) -> f64 {
    match time {
        Some(t) => {
            let gap = if before_base {
                wrap(base - t, 24.0)
            } else {
                wrap(t - base, 24.0)
            };
            if gap > portion {
                bounded(base, portion, before_base)
            } else {
                t
            }
        }
        None => bounded(base, portion, before_base),
    }
}

fn bounded(base: f64, portion: f64, before_base: bool) -> f64 {
    if before_base {
        base - portion
    } else {
        base + portion
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Computes prayer times from the sun's position.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolarCalculator;

impl SolarCalculator {
    pub fn new() -> Self {
        Self
    }
}

impl PrayerTimeCalculator for SolarCalculator {
    fn compute(
        &self,
        date: NaiveDate,
        location: Location,
        settings: &CalculationSettings,
    ) -> PortResult<DailyPrayerTimes> {
        if !location.is_valid() {
            return Err(PortError::InvalidData(format!(
                "coordinates out of range: {}, {}",
                location.latitude, location.longitude
            )));
        }

        let params = parameters(settings.method);
        let day = SolarDay {
            jd: julian_day(date) - location.longitude / (15.0 * 24.0),
            latitude: location.latitude,
        };
        let no_sun = || {
            PortError::Unexpected(format!(
                "the sun does not rise or set on {} at {}, {}",
                date, location.latitude, location.longitude
            ))
        };

        let sunrise = day.sun_angle_time(RISE_SET_ANGLE, 6.0, true).ok_or_else(no_sun)?;
        let sunset = day.sun_angle_time(RISE_SET_ANGLE, 18.0, false).ok_or_else(no_sun)?;
        let dhuhr = day.mid_day(12.0);
        let asr = day
            .asr_time(settings.madhab.shadow_factor(), 13.0)
            .ok_or_else(no_sun)?;
        let maghrib = match params.maghrib_angle {
            Some(angle) => day.sun_angle_time(angle, 18.0, false).unwrap_or(sunset),
            None => sunset,
        };

        let night = 24.0 - (sunset - sunrise);
        let rule = settings.high_latitude_rule;
        let fajr = bound_by_night(
            day.sun_angle_time(params.fajr_angle, 5.0, true),
            sunrise,
            night_portion(rule, params.fajr_angle, night),
            true,
        );
        let isha = match params.isha {
            IshaRule::MinutesAfterMaghrib(minutes) => maghrib + minutes / 60.0,
            IshaRule::Angle(angle) => bound_by_night(
                day.sun_angle_time(angle, 18.0, false),
                sunset,
                night_portion(rule, angle, night),
                false,
            ),
        };

        let midnight = date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .ok_or_else(|| PortError::Unexpected(format!("invalid date {}", date)))?;
        let to_instant = |solar_hours: f64| -> DateTime<Utc> {
            let utc_hours = solar_hours - location.longitude / 15.0;
            midnight + Duration::minutes((utc_hours * 60.0).round() as i64)
        };

        let times = DailyPrayerTimes {
            date,
            fajr: to_instant(fajr),
            sunrise: to_instant(sunrise),
            dhuhr: to_instant(dhuhr),
            asr: to_instant(asr),
            maghrib: to_instant(maghrib),
            isha: to_instant(isha),
        };

        if !times.is_strictly_increasing() {
            return Err(PortError::Unexpected(format!(
                "prayer times out of order on {} at {}, {}",
                date, location.latitude, location.longitude
            )));
        }
        Ok(times)
    }
}
