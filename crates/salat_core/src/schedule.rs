//! crates/salat_core/src/schedule.rs
//!
//! Decides which prayer comes next for a subscriber and whether a notification
//! stage is due at a given instant. Pure functions over computed prayer times.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::domain::{
    DailyPrayerTimes, NotificationPreferences, NotificationStage, Prayer, PrayerOccurrence,
};
use crate::ports::{PortError, PortResult};

/// Parses a stored IANA zone name.
pub fn parse_timezone(name: &str) -> PortResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| PortError::InvalidData(format!("unknown timezone '{}'", name)))
}

/// The calendar date at `now` in the given zone.
pub fn local_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// The first occurrence strictly after `now`, or `None` once isha has passed.
pub fn next_occurrence_today(today: &DailyPrayerTimes, now: DateTime<Utc>) -> Option<PrayerOccurrence> {
    today.occurrences().find(|occ| occ.at > now)
}

/// Resolves the next occurrence, wrapping to fajr of `tomorrow` after isha.
///
/// At high latitudes the previous day's isha can fall after local midnight, so
/// before today's fajr `yesterday` is consulted and its isha wins when it is
/// still ahead and earlier than anything today. `tomorrow` is only evaluated
/// when nothing else remains.
pub fn next_occurrence<Y, F>(
    today: &DailyPrayerTimes,
    now: DateTime<Utc>,
    yesterday: Y,
    tomorrow: F,
) -> PortResult<PrayerOccurrence>
where
    Y: FnOnce() -> PortResult<DailyPrayerTimes>,
    F: FnOnce() -> PortResult<DailyPrayerTimes>,
{
    let pending_isha = if now < today.fajr {
        let yesterday = yesterday()?;
        Some(PrayerOccurrence {
            prayer: Prayer::Isha,
            date: yesterday.date,
            at: yesterday.isha,
        })
        .filter(|occ| occ.at > now)
    } else {
        None
    };

    match (pending_isha, next_occurrence_today(today, now)) {
        (Some(isha), Some(occ)) if occ.at < isha.at => Ok(occ),
        (Some(isha), _) => Ok(isha),
        (None, Some(occ)) => Ok(occ),
        (None, None) => {
            let tomorrow = tomorrow()?;
            Ok(PrayerOccurrence {
                prayer: Prayer::Fajr,
                date: tomorrow.date,
                at: tomorrow.fajr,
            })
        }
    }
}

pub fn day_before(date: NaiveDate) -> PortResult<NaiveDate> {
    date.pred_opt()
        .ok_or_else(|| PortError::InvalidData(format!("no day before {}", date)))
}

pub fn day_after(date: NaiveDate) -> PortResult<NaiveDate> {
    date.succ_opt()
        .ok_or_else(|| PortError::InvalidData(format!("no day after {}", date)))
}

/// The latest occurrence at or before `now`, for display.
///
/// Before today's fajr this is `None`; the caller shows yesterday's isha if it cares.
pub fn current_occurrence(today: &DailyPrayerTimes, now: DateTime<Utc>) -> Option<PrayerOccurrence> {
    today.occurrences().take_while(|occ| occ.at <= now).last()
}

/// The prayer that follows `prayer` on the same day, skipping the sunrise marker.
pub fn following(today: &DailyPrayerTimes, prayer: Prayer) -> Option<PrayerOccurrence> {
    today
        .occurrences()
        .find(|occ| occ.prayer > prayer && occ.prayer.is_notifiable())
}

/// Whole minutes from `now` until `at`, floored.
pub fn minutes_until(at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (at - now).num_seconds().div_euclid(60)
}

/// The stage due for `occurrence` at `now`, if any.
///
/// Matching is on the exact minute; the dedup ledger guards against two
/// cycles landing inside the same minute.
pub fn due_stage(
    occurrence: &PrayerOccurrence,
    now: DateTime<Utc>,
    preferences: &NotificationPreferences,
) -> Option<NotificationStage> {
    if !occurrence.prayer.is_notifiable() || !preferences.is_enabled(occurrence.prayer) {
        return None;
    }

    let minutes = minutes_until(occurrence.at, now);
    if minutes == 0 {
        Some(NotificationStage::Arrival)
    } else if minutes == i64::from(preferences.reminder_lead_minutes) {
        Some(NotificationStage::Lead)
    } else {
        None
    }
}
