//! services/api/src/tasks/ledger_reset_task.rs
//!
//! Clears the notification ledger once per day, during the first hour after
//! local midnight in the configured zone. Runs on its own ticker, separate
//! from the notification cycle.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use salat_core::ports::{DedupLedger, PortResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::tasks::bounded;

pub struct LedgerReset {
    ledger: Arc<dyn DedupLedger>,
    timezone: Tz,
    call_timeout: Duration,
    /// Local date of the last successful clear.
    last_cleared: Option<NaiveDate>,
}

impl LedgerReset {
    pub fn new(ledger: Arc<dyn DedupLedger>, timezone: Tz, call_timeout: Duration) -> Self {
        Self {
            ledger,
            timezone,
            call_timeout,
            last_cleared: None,
        }
    }

    pub fn last_cleared(&self) -> Option<NaiveDate> {
        self.last_cleared
    }

    pub async fn run(mut self, period: Duration, cancel: CancellationToken) {
        info!(timezone = %self.timezone, "Ledger reset job started");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Ledger reset job stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        error!(error = %e, "Ledger reset failed; retrying on the next tick");
                    }
                }
            }
        }
    }

    /// Clears the ledger if `now` falls in local hour 0 and today's clear has
    /// not happened yet. Returns the number of removed keys when it cleared.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> PortResult<Option<u64>> {
        let local = now.with_timezone(&self.timezone);
        let today = local.date_naive();
        if local.hour() != 0 || self.last_cleared == Some(today) {
            return Ok(None);
        }

        let removed = bounded(self.call_timeout, "ledger clear", self.ledger.clear_all()).await?;
        self.last_cleared = Some(today);
        info!(removed, date = %today, "Notification ledger cleared");
        Ok(Some(removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use salat_core::domain::DedupKey;
    use salat_core::ports::PortError;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingLedger {
        clears: AtomicU64,
        fail: AtomicBool,
    }

    #[async_trait]
    impl DedupLedger for CountingLedger {
        async fn exists(&self, _: &DedupKey) -> PortResult<bool> {
            Ok(false)
        }
        async fn put(&self, _: DedupKey) -> PortResult<()> {
            Ok(())
        }
        async fn clear_all(&self) -> PortResult<u64> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(PortError::Unexpected("disk full".into()));
            }
            self.clears.fetch_add(1, Ordering::SeqCst);
            Ok(3)
        }
    }

    fn moscow(day: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        chrono_tz::Europe::Moscow
            .with_ymd_and_hms(2024, 3, day, h, m, s)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn reset(ledger: Arc<CountingLedger>) -> LedgerReset {
        LedgerReset::new(ledger, chrono_tz::Europe::Moscow, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn clears_once_per_local_day() {
        let ledger = Arc::new(CountingLedger::default());
        let mut job = reset(ledger.clone());

        assert_matches!(job.tick(moscow(1, 23, 59, 30)).await, Ok(None));
        assert_matches!(job.tick(moscow(2, 0, 0, 10)).await, Ok(Some(3)));
        // Drifted ticks inside the same hour do nothing.
        assert_matches!(job.tick(moscow(2, 0, 0, 50)).await, Ok(None));
        assert_matches!(job.tick(moscow(2, 0, 59, 0)).await, Ok(None));
        assert_matches!(job.tick(moscow(3, 0, 1, 0)).await, Ok(Some(3)));

        assert_eq!(ledger.clears.load(Ordering::SeqCst), 2);
        assert_eq!(job.last_cleared(), NaiveDate::from_ymd_opt(2024, 3, 3));
    }

    #[tokio::test]
    async fn a_late_first_tick_still_clears_within_the_hour() {
        let ledger = Arc::new(CountingLedger::default());
        let mut job = reset(ledger.clone());

        assert_matches!(job.tick(moscow(2, 0, 37, 0)).await, Ok(Some(_)));
        assert_eq!(ledger.clears.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_clear_is_retried() {
        let ledger = Arc::new(CountingLedger::default());
        ledger.fail.store(true, Ordering::SeqCst);
        let mut job = reset(ledger.clone());

        assert_matches!(job.tick(moscow(2, 0, 0, 5)).await, Err(PortError::Unexpected(_)));
        assert_eq!(job.last_cleared(), None);

        ledger.fail.store(false, Ordering::SeqCst);
        assert_matches!(job.tick(moscow(2, 0, 1, 5)).await, Ok(Some(3)));
    }
}
