//! services/api/src/adapters/records.rs
//!
//! "Impure" storage records shared by the PostgreSQL and JSON-file adapters,
//! and their conversions to and from the pure domain types.

use chrono::{DateTime, Utc};
use salat_core::domain::{
    CalculationSettings, DedupKey, Location, NotificationPreferences, Subscriber,
};
use salat_core::ports::{PortError, PortResult};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub user_id: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: String,
    pub calculation_method: String,
    pub madhab: String,
    pub high_latitude_rule: String,
    pub notify_fajr: bool,
    pub notify_dhuhr: bool,
    pub notify_asr: bool,
    pub notify_maghrib: bool,
    pub notify_isha: bool,
    pub reminder_lead_minutes: i32,
    pub sound: bool,
    pub vibration: bool,
    pub this_channel_only: bool,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriberRecord {
    pub fn from_domain(subscriber: &Subscriber) -> Self {
        let prefs = &subscriber.preferences;
        Self {
            user_id: subscriber.user_id,
            latitude: subscriber.location.map(|l| l.latitude),
            longitude: subscriber.location.map(|l| l.longitude),
            timezone: subscriber.timezone.clone(),
            calculation_method: subscriber.calculation.method.as_str().to_string(),
            madhab: subscriber.calculation.madhab.as_str().to_string(),
            high_latitude_rule: subscriber.calculation.high_latitude_rule.as_str().to_string(),
            notify_fajr: prefs.fajr,
            notify_dhuhr: prefs.dhuhr,
            notify_asr: prefs.asr,
            notify_maghrib: prefs.maghrib,
            notify_isha: prefs.isha,
            reminder_lead_minutes: i32::try_from(prefs.reminder_lead_minutes).unwrap_or(i32::MAX),
            sound: prefs.sound,
            vibration: prefs.vibration,
            this_channel_only: prefs.this_channel_only,
            enabled: subscriber.enabled,
            created_at: subscriber.created_at,
            updated_at: subscriber.updated_at,
        }
    }

    pub fn to_domain(self) -> PortResult<Subscriber> {
        let invalid = |e: salat_core::domain::UnknownVariant| {
            PortError::InvalidData(format!("subscriber {}: {}", self.user_id, e))
        };
        let calculation = CalculationSettings {
            method: self.calculation_method.parse().map_err(invalid)?,
            madhab: self.madhab.parse().map_err(invalid)?,
            high_latitude_rule: self.high_latitude_rule.parse().map_err(invalid)?,
        };
        let reminder_lead_minutes = u32::try_from(self.reminder_lead_minutes).map_err(|_| {
            PortError::InvalidData(format!(
                "subscriber {}: negative reminder lead {}",
                self.user_id, self.reminder_lead_minutes
            ))
        })?;

        Ok(Subscriber {
            user_id: self.user_id,
            location: match (self.latitude, self.longitude) {
                (Some(latitude), Some(longitude)) => Some(Location::new(latitude, longitude)),
                _ => None,
            },
            timezone: self.timezone,
            calculation,
            preferences: NotificationPreferences {
                fajr: self.notify_fajr,
                dhuhr: self.notify_dhuhr,
                asr: self.notify_asr,
                maghrib: self.notify_maghrib,
                isha: self.notify_isha,
                reminder_lead_minutes,
                sound: self.sound,
                vibration: self.vibration,
                this_channel_only: self.this_channel_only,
            },
            enabled: self.enabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DedupRecord {
    pub user_id: i64,
    pub prayer: String,
    pub stage: String,
    /// Occurrence instant, seconds since the Unix epoch.
    pub occurs_at: i64,
}

impl From<&DedupKey> for DedupRecord {
    fn from(key: &DedupKey) -> Self {
        Self {
            user_id: key.user_id,
            prayer: key.prayer.as_str().to_string(),
            stage: key.stage.as_str().to_string(),
            occurs_at: key.occurs_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use salat_core::domain::{CalculationMethod, HighLatitudeRule, Madhab};

    fn subscriber() -> Subscriber {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        Subscriber {
            user_id: 42,
            location: Some(Location::new(43.2, 76.9)),
            timezone: "Asia/Almaty".to_string(),
            calculation: CalculationSettings {
                method: CalculationMethod::Karachi,
                madhab: Madhab::Hanafi,
                high_latitude_rule: HighLatitudeRule::SeventhOfTheNight,
            },
            preferences: NotificationPreferences {
                asr: false,
                reminder_lead_minutes: 15,
                ..NotificationPreferences::default()
            },
            enabled: true,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn record_preserves_the_subscriber() {
        let original = subscriber();
        let restored = SubscriberRecord::from_domain(&original).to_domain().unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn half_a_location_is_no_location() {
        let mut record = SubscriberRecord::from_domain(&subscriber());
        record.longitude = None;
        assert_eq!(record.to_domain().unwrap().location, None);
    }

    #[test]
    fn unknown_method_is_invalid_data() {
        let mut record = SubscriberRecord::from_domain(&subscriber());
        record.calculation_method = "Lunar".to_string();
        assert!(matches!(record.to_domain(), Err(PortError::InvalidData(_))));
    }
}
