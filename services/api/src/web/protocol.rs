//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the Mini App and the REST API.

use chrono::{DateTime, NaiveDate, Utc};
use salat_core::domain::{CalculationSettings, NotificationPreferences, Subscriber, UserId};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// Requests
//=========================================================================================

/// Opt-in, or a resent location. Both coordinates or neither.
#[derive(Deserialize, Debug, ToSchema)]
pub struct SubscribeRequest {
    pub user_id: UserId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A partial update; absent fields keep their current value.
#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct PreferencesUpdate {
    pub fajr: Option<bool>,
    pub dhuhr: Option<bool>,
    pub asr: Option<bool>,
    pub maghrib: Option<bool>,
    pub isha: Option<bool>,
    /// 1 to 120.
    pub reminder_lead_minutes: Option<u32>,
    pub sound: Option<bool>,
    pub vibration: Option<bool>,
    pub this_channel_only: Option<bool>,
}

#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct SettingsUpdate {
    /// e.g. `MuslimWorldLeague`, `UmmAlQura`.
    pub method: Option<String>,
    /// `Shafi` or `Hanafi`.
    pub madhab: Option<String>,
    /// `MiddleOfTheNight`, `SeventhOfTheNight` or `TwilightAngle`.
    pub high_latitude_rule: Option<String>,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PrayerTimesQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub method: Option<String>,
    pub madhab: Option<String>,
    pub high_latitude_rule: Option<String>,
    /// Local calendar date; today in the resolved zone when absent.
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QiblaQuery {
    pub latitude: f64,
    pub longitude: f64,
    /// Smoothed device heading, when the compass has one.
    pub heading: Option<f64>,
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Serialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct CalculationSettingsDto {
    pub method: String,
    pub madhab: String,
    pub high_latitude_rule: String,
}

impl From<&CalculationSettings> for CalculationSettingsDto {
    fn from(settings: &CalculationSettings) -> Self {
        Self {
            method: settings.method.as_str().to_string(),
            madhab: settings.madhab.as_str().to_string(),
            high_latitude_rule: settings.high_latitude_rule.as_str().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct PreferencesDto {
    pub fajr: bool,
    pub dhuhr: bool,
    pub asr: bool,
    pub maghrib: bool,
    pub isha: bool,
    pub reminder_lead_minutes: u32,
    pub sound: bool,
    pub vibration: bool,
    pub this_channel_only: bool,
}

impl From<&NotificationPreferences> for PreferencesDto {
    fn from(p: &NotificationPreferences) -> Self {
        Self {
            fajr: p.fajr,
            dhuhr: p.dhuhr,
            asr: p.asr,
            maghrib: p.maghrib,
            isha: p.isha,
            reminder_lead_minutes: p.reminder_lead_minutes,
            sound: p.sound,
            vibration: p.vibration,
            this_channel_only: p.this_channel_only,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct SubscriberResponse {
    pub user_id: UserId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: String,
    pub calculation: CalculationSettingsDto,
    pub preferences: PreferencesDto,
    pub enabled: bool,
}

impl From<&Subscriber> for SubscriberResponse {
    fn from(s: &Subscriber) -> Self {
        Self {
            user_id: s.user_id,
            latitude: s.location.map(|l| l.latitude),
            longitude: s.location.map(|l| l.longitude),
            timezone: s.timezone.clone(),
            calculation: CalculationSettingsDto::from(&s.calculation),
            preferences: PreferencesDto::from(&s.preferences),
            enabled: s.enabled,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct PrayerTimeEntry {
    /// Lowercase prayer name, `sunrise` included.
    pub prayer: String,
    pub at: DateTime<Utc>,
    /// `HH:MM` in the resolved zone.
    pub local_time: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct NextPrayer {
    pub prayer: String,
    pub at: DateTime<Utc>,
    pub minutes_until: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct PrayerTimesResponse {
    pub date: NaiveDate,
    pub timezone: String,
    pub times: Vec<PrayerTimeEntry>,
    /// Only reported for today's date.
    pub current: Option<String>,
    pub next: Option<NextPrayer>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct QiblaResponse {
    /// Degrees clockwise from true north.
    pub bearing: f64,
    pub distance_km: f64,
    /// Needle rotation relative to the top of the device; present with `heading`.
    pub needle_rotation: Option<f64>,
    /// Whether the device already faces the qibla; present with `heading`.
    pub facing: Option<bool>,
}
