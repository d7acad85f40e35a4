//! services/api/src/tasks/notification_task.rs
//!
//! The recurring notification cycle. On every tick it reads the enabled
//! subscribers fresh from storage, works out each one's next prayer, and sends
//! the lead reminder or the arrival notice when its minute has come. The dedup
//! ledger makes repeated cycles and restarts safe.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use salat_core::domain::{
    CalculationSettings, DailyPrayerTimes, DedupKey, Location, NotificationStage, Prayer,
    PrayerOccurrence, Subscriber,
};
use salat_core::ports::{
    DedupLedger, MessageTransport, PortResult, PrayerTimeCalculator, SubscriberRepository,
};
use salat_core::schedule::{
    day_after, day_before, due_stage, following, local_date, next_occurrence, parse_timezone,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::tasks::{bounded, messages, FollowUps};

//=========================================================================================
// Settings & Report
//=========================================================================================

#[derive(Debug, Clone)]
pub struct NotifierSettings {
    /// Cycle period.
    pub interval: Duration,
    /// Upper bound on every storage or transport call.
    pub call_timeout: Duration,
    /// Adds a Mini App button to arrival notices.
    pub mini_app_url: Option<String>,
}

/// What one cycle did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub subscribers: usize,
    pub sent: usize,
    /// Subscribers skipped for missing or malformed data.
    pub skipped: usize,
    /// Subscribers whose processing failed (calculator, transport, storage).
    pub failed: usize,
    /// Messages delivered whose ledger write then failed.
    pub unrecorded: usize,
}

enum Outcome {
    Idle,
    Skipped,
    Sent { recorded: bool },
}

//=========================================================================================
// The Notifier
//=========================================================================================

pub struct PrayerNotifier {
    subscribers: Arc<dyn SubscriberRepository>,
    ledger: Arc<dyn DedupLedger>,
    transport: Arc<dyn MessageTransport>,
    calculator: Arc<dyn PrayerTimeCalculator>,
    follow_ups: FollowUps,
    settings: NotifierSettings,
}

impl PrayerNotifier {
    pub fn new(
        subscribers: Arc<dyn SubscriberRepository>,
        ledger: Arc<dyn DedupLedger>,
        transport: Arc<dyn MessageTransport>,
        calculator: Arc<dyn PrayerTimeCalculator>,
        follow_ups: FollowUps,
        settings: NotifierSettings,
    ) -> Self {
        Self {
            subscribers,
            ledger,
            transport,
            calculator,
            follow_ups,
            settings,
        }
    }

    /// Runs cycles on a fixed cadence until `cancel` fires.
    ///
    /// Cancellation is only observed between cycles, so a cycle that has
    /// started always runs to completion.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            "Prayer notifier started"
        );
        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Prayer notifier stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_cycle(Utc::now()).await {
                        error!(error = %e, "Notification cycle failed");
                    }
                }
            }
        }
    }

    /// One pass over every enabled subscriber at instant `now`.
    ///
    /// Only a failure to read the subscriber list aborts the cycle; anything
    /// that goes wrong for one subscriber is logged and counted.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> PortResult<CycleReport> {
        let subscribers = bounded(
            self.settings.call_timeout,
            "subscriber listing",
            self.subscribers.list_enabled(),
        )
        .await?;

        let mut report = CycleReport {
            subscribers: subscribers.len(),
            ..CycleReport::default()
        };

        for subscriber in subscribers.iter().filter(|s| s.enabled) {
            match self.process_subscriber(subscriber, now).await {
                Ok(Outcome::Idle) => {}
                Ok(Outcome::Skipped) => report.skipped += 1,
                Ok(Outcome::Sent { recorded }) => {
                    report.sent += 1;
                    if !recorded {
                        report.unrecorded += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(user_id = subscriber.user_id, error = %e, "Subscriber skipped this cycle");
                }
            }
        }

        if report.sent > 0 || report.failed > 0 {
            info!(?report, "Notification cycle finished");
        } else {
            debug!(?report, "Notification cycle finished");
        }
        Ok(report)
    }

    async fn process_subscriber(&self, subscriber: &Subscriber, now: DateTime<Utc>) -> PortResult<Outcome> {
        let user_id = subscriber.user_id;
        let Some(location) = subscriber.location.filter(Location::is_valid) else {
            warn!(user_id, location = ?subscriber.location, "Missing or invalid location; skipping");
            return Ok(Outcome::Skipped);
        };
        let tz = match parse_timezone(&subscriber.timezone) {
            Ok(tz) => tz,
            Err(e) => {
                warn!(user_id, error = %e, "Unusable timezone; skipping");
                return Ok(Outcome::Skipped);
            }
        };
        let settings = &subscriber.calculation;

        let today = local_date(now, tz);
        let times = self.calculator.compute(today, location, settings)?;
        let next = next_occurrence(
            &times,
            now,
            || self.calculator.compute(day_before(today)?, location, settings),
            || self.calculator.compute(day_after(today)?, location, settings),
        )?;

        let Some(stage) = due_stage(&next, now, &subscriber.preferences) else {
            return Ok(Outcome::Idle);
        };

        let key = DedupKey::new(user_id, &next, stage);
        let already_sent = bounded(self.settings.call_timeout, "ledger lookup", self.ledger.exists(&key)).await?;
        if already_sent {
            debug!(%key, "Already notified");
            return Ok(Outcome::Idle);
        }

        let preferences = &subscriber.preferences;
        let (text, options) = match stage {
            NotificationStage::Lead => (
                messages::lead_text(&next, preferences.reminder_lead_minutes, tz),
                messages::plain_options(preferences),
            ),
            NotificationStage::Arrival => (
                messages::arrival_text(&next, tz),
                messages::arrival_options(&next, preferences, self.settings.mini_app_url.as_deref()),
            ),
        };

        bounded(
            self.settings.call_timeout,
            "message send",
            self.transport.send_text(user_id, &text, &options),
        )
        .await?;
        info!(user_id, prayer = %next.prayer, stage = stage.as_str(), "Notification sent");

        // The message is out; a failed write only risks a duplicate later.
        let recorded = match bounded(self.settings.call_timeout, "ledger write", self.ledger.put(key)).await {
            Ok(()) => true,
            Err(e) => {
                error!(%key, error = %e, "Sent but not recorded; may be sent again");
                false
            }
        };

        if stage == NotificationStage::Arrival {
            self.schedule_preview(subscriber, location, tz, &times, &next);
        }

        Ok(Outcome::Sent { recorded })
    }

    fn schedule_preview(
        &self,
        subscriber: &Subscriber,
        location: Location,
        tz: Tz,
        today: &DailyPrayerTimes,
        announced: &PrayerOccurrence,
    ) {
        match self.occurrence_after(announced, today, location, &subscriber.calculation) {
            Ok(next) => self.follow_ups.schedule(
                subscriber.user_id,
                messages::preview_text(&next, local_date(announced.at, tz), tz),
                messages::plain_options(&subscriber.preferences),
            ),
            Err(e) => warn!(user_id = subscriber.user_id, error = %e, "No next-prayer preview"),
        }
    }

    /// The prayer after `announced`, wrapping to the next day's fajr after isha.
    fn occurrence_after(
        &self,
        announced: &PrayerOccurrence,
        today: &DailyPrayerTimes,
        location: Location,
        settings: &CalculationSettings,
    ) -> PortResult<PrayerOccurrence> {
        let same_day = if announced.date == today.date {
            *today
        } else {
            self.calculator.compute(announced.date, location, settings)?
        };
        if let Some(next) = following(&same_day, announced.prayer) {
            return Ok(next);
        }

        let date = day_after(announced.date)?;
        let times = self.calculator.compute(date, location, settings)?;
        Ok(PrayerOccurrence {
            prayer: Prayer::Fajr,
            date,
            at: times.fajr,
        })
    }
}
