//! crates/salat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

/// Telegram chat/user identifier. Stable and unique per subscriber.
pub type UserId = i64;

/// Raised when a stored or submitted string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

//=========================================================================================
// Location
//=========================================================================================

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Moscow, used when a subscriber opts in without sharing coordinates.
    pub const FALLBACK: Location = Location {
        latitude: 55.7558,
        longitude: 37.6173,
    };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both coordinates are finite and inside their geographic range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

//=========================================================================================
// Calculation settings
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CalculationMethod {
    #[default]
    MuslimWorldLeague,
    Egyptian,
    Karachi,
    UmmAlQura,
    Dubai,
    MoonsightingCommittee,
    NorthAmerica,
    Kuwait,
    Qatar,
    Singapore,
    Tehran,
    Turkey,
}

impl CalculationMethod {
    pub const ALL: [CalculationMethod; 12] = [
        CalculationMethod::MuslimWorldLeague,
        CalculationMethod::Egyptian,
        CalculationMethod::Karachi,
        CalculationMethod::UmmAlQura,
        CalculationMethod::Dubai,
        CalculationMethod::MoonsightingCommittee,
        CalculationMethod::NorthAmerica,
        CalculationMethod::Kuwait,
        CalculationMethod::Qatar,
        CalculationMethod::Singapore,
        CalculationMethod::Tehran,
        CalculationMethod::Turkey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationMethod::MuslimWorldLeague => "MuslimWorldLeague",
            CalculationMethod::Egyptian => "Egyptian",
            CalculationMethod::Karachi => "Karachi",
            CalculationMethod::UmmAlQura => "UmmAlQura",
            CalculationMethod::Dubai => "Dubai",
            CalculationMethod::MoonsightingCommittee => "MoonsightingCommittee",
            CalculationMethod::NorthAmerica => "NorthAmerica",
            CalculationMethod::Kuwait => "Kuwait",
            CalculationMethod::Qatar => "Qatar",
            CalculationMethod::Singapore => "Singapore",
            CalculationMethod::Tehran => "Tehran",
            CalculationMethod::Turkey => "Turkey",
        }
    }
}

impl FromStr for CalculationMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CalculationMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVariant::new("calculation method", s))
    }
}

/// Juristic school, which only affects the asr shadow length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Madhab {
    #[default]
    Shafi,
    Hanafi,
}

impl Madhab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Madhab::Shafi => "Shafi",
            Madhab::Hanafi => "Hanafi",
        }
    }

    /// Shadow length factor used for asr.
    pub fn shadow_factor(&self) -> f64 {
        match self {
            Madhab::Shafi => 1.0,
            Madhab::Hanafi => 2.0,
        }
    }
}

impl FromStr for Madhab {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shafi" => Ok(Madhab::Shafi),
            "hanafi" => Ok(Madhab::Hanafi),
            _ => Err(UnknownVariant::new("madhab", s)),
        }
    }
}

/// How fajr and isha are bounded where twilight never fully ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HighLatitudeRule {
    #[default]
    MiddleOfTheNight,
    SeventhOfTheNight,
    TwilightAngle,
}

impl HighLatitudeRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            HighLatitudeRule::MiddleOfTheNight => "MiddleOfTheNight",
            HighLatitudeRule::SeventhOfTheNight => "SeventhOfTheNight",
            HighLatitudeRule::TwilightAngle => "TwilightAngle",
        }
    }
}

impl FromStr for HighLatitudeRule {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            HighLatitudeRule::MiddleOfTheNight,
            HighLatitudeRule::SeventhOfTheNight,
            HighLatitudeRule::TwilightAngle,
        ]
        .into_iter()
        .find(|r| r.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| UnknownVariant::new("high latitude rule", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalculationSettings {
    pub method: CalculationMethod,
    pub madhab: Madhab,
    pub high_latitude_rule: HighLatitudeRule,
}

//=========================================================================================
// Prayers
//=========================================================================================

/// The six daily markers, in chronological order. Sunrise is display-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Prayer {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl Prayer {
    pub const ALL: [Prayer; 6] = [
        Prayer::Fajr,
        Prayer::Sunrise,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Prayer::Fajr => "fajr",
            Prayer::Sunrise => "sunrise",
            Prayer::Dhuhr => "dhuhr",
            Prayer::Asr => "asr",
            Prayer::Maghrib => "maghrib",
            Prayer::Isha => "isha",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Prayer::Fajr => "Fajr",
            Prayer::Sunrise => "Sunrise",
            Prayer::Dhuhr => "Dhuhr",
            Prayer::Asr => "Asr",
            Prayer::Maghrib => "Maghrib",
            Prayer::Isha => "Isha",
        }
    }

    /// Sunrise marks the end of fajr and never triggers a notification.
    pub fn is_notifiable(&self) -> bool {
        !matches!(self, Prayer::Sunrise)
    }
}

impl fmt::Display for Prayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Prayer {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Prayer::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVariant::new("prayer", s))
    }
}

/// The six computed instants for one location and calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyPrayerTimes {
    pub date: NaiveDate,
    pub fajr: DateTime<Utc>,
    pub sunrise: DateTime<Utc>,
    pub dhuhr: DateTime<Utc>,
    pub asr: DateTime<Utc>,
    pub maghrib: DateTime<Utc>,
    pub isha: DateTime<Utc>,
}

impl DailyPrayerTimes {
    pub fn time(&self, prayer: Prayer) -> DateTime<Utc> {
        match prayer {
            Prayer::Fajr => self.fajr,
            Prayer::Sunrise => self.sunrise,
            Prayer::Dhuhr => self.dhuhr,
            Prayer::Asr => self.asr,
            Prayer::Maghrib => self.maghrib,
            Prayer::Isha => self.isha,
        }
    }

    /// All six occurrences in chronological order.
    pub fn occurrences(&self) -> impl Iterator<Item = PrayerOccurrence> + '_ {
        Prayer::ALL.into_iter().map(move |prayer| PrayerOccurrence {
            prayer,
            date: self.date,
            at: self.time(prayer),
        })
    }

    /// Whether the sequence fajr < sunrise < ... < isha holds.
    pub fn is_strictly_increasing(&self) -> bool {
        Prayer::ALL
            .windows(2)
            .all(|pair| self.time(pair[0]) < self.time(pair[1]))
    }
}

/// One prayer on one date at one computed instant. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrayerOccurrence {
    pub prayer: Prayer,
    pub date: NaiveDate,
    pub at: DateTime<Utc>,
}

//=========================================================================================
// Subscribers
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPreferences {
    pub fajr: bool,
    pub dhuhr: bool,
    pub asr: bool,
    pub maghrib: bool,
    pub isha: bool,
    /// Minutes before the prayer at which the reminder fires.
    pub reminder_lead_minutes: u32,
    pub sound: bool,
    pub vibration: bool,
    /// Read by the Mini App, which skips its own in-app alert when set.
    pub this_channel_only: bool,
}

impl NotificationPreferences {
    pub const DEFAULT_LEAD_MINUTES: u32 = 10;

    pub fn is_enabled(&self, prayer: Prayer) -> bool {
        match prayer {
            Prayer::Fajr => self.fajr,
            Prayer::Sunrise => false,
            Prayer::Dhuhr => self.dhuhr,
            Prayer::Asr => self.asr,
            Prayer::Maghrib => self.maghrib,
            Prayer::Isha => self.isha,
        }
    }

    /// Telegram silences sound and vibration together, so a message goes out
    /// silently only when the subscriber wants neither.
    pub fn is_silent(&self) -> bool {
        !self.sound && !self.vibration
    }

    pub fn set_enabled(&mut self, prayer: Prayer, enabled: bool) {
        match prayer {
            Prayer::Fajr => self.fajr = enabled,
            Prayer::Sunrise => {}
            Prayer::Dhuhr => self.dhuhr = enabled,
            Prayer::Asr => self.asr = enabled,
            Prayer::Maghrib => self.maghrib = enabled,
            Prayer::Isha => self.isha = enabled,
        }
    }
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            fajr: true,
            dhuhr: true,
            asr: true,
            maghrib: true,
            isha: true,
            reminder_lead_minutes: Self::DEFAULT_LEAD_MINUTES,
            sound: true,
            vibration: true,
            this_channel_only: false,
        }
    }
}

/// A user opted into prayer reminders. Never hard-deleted; `enabled` is toggled instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscriber {
    pub user_id: UserId,
    pub location: Option<Location>,
    /// IANA zone name, resolved from the location.
    pub timezone: String,
    pub calculation: CalculationSettings,
    pub preferences: NotificationPreferences,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//=========================================================================================
// Notification dedup
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NotificationStage {
    /// Reminder sent `reminder_lead_minutes` before the prayer.
    Lead,
    /// Sent at the minute the prayer time is reached.
    Arrival,
}

impl NotificationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStage::Lead => "lead",
            NotificationStage::Arrival => "arrival",
        }
    }
}

impl FromStr for NotificationStage {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lead" => Ok(NotificationStage::Lead),
            "arrival" => Ok(NotificationStage::Arrival),
            _ => Err(UnknownVariant::new("notification stage", s)),
        }
    }
}

/// Identifies one sent notification. The occurrence instant is part of the key,
/// so a recalculated time yields a new key instead of matching a stale one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    pub user_id: UserId,
    pub prayer: Prayer,
    pub stage: NotificationStage,
    /// Occurrence instant, seconds since the Unix epoch.
    pub occurs_at: i64,
}

impl DedupKey {
    pub fn new(
        user_id: UserId,
        occurrence: &PrayerOccurrence,
        stage: NotificationStage,
    ) -> Self {
        Self {
            user_id,
            prayer: occurrence.prayer,
            stage,
            occurs_at: occurrence.at.timestamp(),
        }
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.user_id,
            self.prayer,
            self.stage.as_str(),
            self.occurs_at
        )
    }
}
