//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the PostgreSQL implementation of
//! the `SubscriberRepository` and `DedupLedger` ports from the `core` crate.
//! It handles all interactions with the database using `sqlx`.

use async_trait::async_trait;
use salat_core::domain::{DedupKey, Subscriber, UserId};
use salat_core::ports::{DedupLedger, PortError, PortResult, SubscriberRepository};
use sqlx::PgPool;
use tracing::warn;

use crate::adapters::records::{DedupRecord, SubscriberRecord};

const SUBSCRIBER_COLUMNS: &str = "user_id, latitude, longitude, timezone, calculation_method, \
     madhab, high_latitude_rule, notify_fajr, notify_dhuhr, notify_asr, notify_maghrib, \
     notify_isha, reminder_lead_minutes, sound, vibration, this_channel_only, enabled, \
     created_at, updated_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements both storage ports.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// `SubscriberRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl SubscriberRepository for PgStore {
    async fn list_enabled(&self) -> PortResult<Vec<Subscriber>> {
        let sql = format!(
            "SELECT {} FROM subscribers WHERE enabled = TRUE ORDER BY user_id",
            SUBSCRIBER_COLUMNS
        );
        let records = sqlx::query_as::<_, SubscriberRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let subscribers = records
            .into_iter()
            .filter_map(|r| match r.to_domain() {
                Ok(subscriber) => Some(subscriber),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed subscriber row");
                    None
                }
            })
            .collect();
        Ok(subscribers)
    }

    async fn get(&self, user_id: UserId) -> PortResult<Subscriber> {
        let sql = format!("SELECT {} FROM subscribers WHERE user_id = $1", SUBSCRIBER_COLUMNS);
        let record = sqlx::query_as::<_, SubscriberRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Subscriber {} not found", user_id))
                }
                _ => unexpected(e),
            })?;
        record.to_domain()
    }

    async fn put(&self, subscriber: Subscriber) -> PortResult<()> {
        let r = SubscriberRecord::from_domain(&subscriber);
        sqlx::query(
            "INSERT INTO subscribers (user_id, latitude, longitude, timezone, calculation_method, \
                 madhab, high_latitude_rule, notify_fajr, notify_dhuhr, notify_asr, notify_maghrib, \
                 notify_isha, reminder_lead_minutes, sound, vibration, this_channel_only, enabled, \
                 created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 latitude = EXCLUDED.latitude, \
                 longitude = EXCLUDED.longitude, \
                 timezone = EXCLUDED.timezone, \
                 calculation_method = EXCLUDED.calculation_method, \
                 madhab = EXCLUDED.madhab, \
                 high_latitude_rule = EXCLUDED.high_latitude_rule, \
                 notify_fajr = EXCLUDED.notify_fajr, \
                 notify_dhuhr = EXCLUDED.notify_dhuhr, \
                 notify_asr = EXCLUDED.notify_asr, \
                 notify_maghrib = EXCLUDED.notify_maghrib, \
                 notify_isha = EXCLUDED.notify_isha, \
                 reminder_lead_minutes = EXCLUDED.reminder_lead_minutes, \
                 sound = EXCLUDED.sound, \
                 vibration = EXCLUDED.vibration, \
                 this_channel_only = EXCLUDED.this_channel_only, \
                 enabled = EXCLUDED.enabled, \
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(r.user_id)
        .bind(r.latitude)
        .bind(r.longitude)
        .bind(r.timezone)
        .bind(r.calculation_method)
        .bind(r.madhab)
        .bind(r.high_latitude_rule)
        .bind(r.notify_fajr)
        .bind(r.notify_dhuhr)
        .bind(r.notify_asr)
        .bind(r.notify_maghrib)
        .bind(r.notify_isha)
        .bind(r.reminder_lead_minutes)
        .bind(r.sound)
        .bind(r.vibration)
        .bind(r.this_channel_only)
        .bind(r.enabled)
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `DedupLedger` Trait Implementation
//=========================================================================================

#[async_trait]
impl DedupLedger for PgStore {
    async fn exists(&self, key: &DedupKey) -> PortResult<bool> {
        let r = DedupRecord::from(key);
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM notification_ledger \
             WHERE user_id = $1 AND prayer = $2 AND stage = $3 AND occurs_at = $4)",
        )
        .bind(r.user_id)
        .bind(r.prayer)
        .bind(r.stage)
        .bind(r.occurs_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(found)
    }

    async fn put(&self, key: DedupKey) -> PortResult<()> {
        let r = DedupRecord::from(&key);
        sqlx::query(
            "INSERT INTO notification_ledger (user_id, prayer, stage, occurs_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING",
        )
        .bind(r.user_id)
        .bind(r.prayer)
        .bind(r.stage)
        .bind(r.occurs_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn clear_all(&self) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM notification_ledger")
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }
}
