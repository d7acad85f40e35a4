//! Drives the notification cycle end to end against in-memory ports and the
//! real solar calculator.

mod common;

use api_lib::adapters::SolarCalculator;
use api_lib::tasks::{FollowUps, NotifierSettings, PrayerNotifier};
use assert_matches::assert_matches;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use common::{subscriber, MemoryLedger, MemoryRepository, RecordingTransport};
use salat_core::domain::{
    CalculationSettings, DailyPrayerTimes, DedupKey, Location, NotificationStage, Prayer,
};
use salat_core::ports::{PortError, PrayerTimeCalculator, ReplyButton};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

const USER: i64 = 1001;

struct Harness {
    repo: Arc<MemoryRepository>,
    ledger: Arc<MemoryLedger>,
    transport: Arc<RecordingTransport>,
    follow_ups: FollowUps,
    notifier: PrayerNotifier,
}

fn harness(repo: MemoryRepository) -> Harness {
    let repo = Arc::new(repo);
    let ledger = Arc::new(MemoryLedger::default());
    let transport = Arc::new(RecordingTransport::default());
    let follow_ups = FollowUps::new(
        transport.clone(),
        Duration::from_millis(20),
        Duration::from_secs(1),
    );
    let notifier = PrayerNotifier::new(
        repo.clone(),
        ledger.clone(),
        transport.clone(),
        Arc::new(SolarCalculator::new()),
        follow_ups.clone(),
        NotifierSettings {
            interval: Duration::from_secs(60),
            call_timeout: Duration::from_secs(1),
            mini_app_url: Some("https://t.me/salat_bot/app".to_string()),
        },
    );
    Harness {
        repo,
        ledger,
        transport,
        follow_ups,
        notifier,
    }
}

fn moscow_times(date: NaiveDate) -> DailyPrayerTimes {
    SolarCalculator::new()
        .compute(date, Location::FALLBACK, &CalculationSettings::default())
        .unwrap()
}

fn march_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

fn minutes_before(at: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    at - ChronoDuration::minutes(minutes)
}

#[tokio::test]
async fn lead_reminder_is_sent_once_for_moscow_dhuhr() {
    let h = harness(MemoryRepository::with([subscriber(USER)]));
    let dhuhr = moscow_times(march_first()).dhuhr;
    let now = minutes_before(dhuhr, 10);

    let report = h.notifier.run_cycle(now).await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(report.unrecorded, 0);

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_id, USER);
    assert!(sent[0].text.contains("Dhuhr"));
    assert!(sent[0].options.buttons.is_empty());
    assert_eq!(
        h.ledger.keys(),
        vec![DedupKey {
            user_id: USER,
            prayer: Prayer::Dhuhr,
            stage: NotificationStage::Lead,
            occurs_at: dhuhr.timestamp(),
        }]
    );

    // Same minute again, and a later tick inside that minute.
    let again = h.notifier.run_cycle(now).await.unwrap();
    let later = h.notifier.run_cycle(now + ChronoDuration::seconds(30)).await.unwrap();
    assert_eq!(again.sent, 0);
    assert_eq!(later.sent, 0);
    assert_eq!(h.transport.sent().len(), 1);
}

#[tokio::test]
async fn disabled_prayer_never_notifies() {
    let h = harness(MemoryRepository::with([subscriber(USER)]));
    h.repo.update(USER, |s| s.preferences.dhuhr = false);
    let dhuhr = moscow_times(march_first()).dhuhr;

    for seconds_before in (0..=15 * 60).step_by(30) {
        let now = dhuhr - ChronoDuration::seconds(seconds_before);
        let report = h.notifier.run_cycle(now).await.unwrap();
        assert_eq!(report.sent, 0, "{} s before dhuhr", seconds_before);
    }
    assert!(h.transport.sent().is_empty());
    assert!(h.ledger.keys().is_empty());
}

#[tokio::test]
async fn sunrise_never_notifies() {
    let h = harness(MemoryRepository::with([subscriber(USER)]));
    let sunrise = moscow_times(march_first()).sunrise;

    for now in [
        minutes_before(sunrise, 10),
        sunrise - ChronoDuration::seconds(30),
    ] {
        assert_eq!(h.notifier.run_cycle(now).await.unwrap().sent, 0);
    }
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn arrival_sends_buttons_and_a_next_prayer_preview() {
    let h = harness(MemoryRepository::with([subscriber(USER)]));
    let times = moscow_times(march_first());
    let now = times.dhuhr - ChronoDuration::seconds(30);

    let report = h.notifier.run_cycle(now).await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(h.ledger.keys()[0].stage, NotificationStage::Arrival);

    let arrival = &h.transport.sent()[0];
    assert!(arrival.text.contains("time for Dhuhr"));
    assert_matches!(arrival.options.buttons.as_slice(), [ReplyButton::Callback { .. }, ReplyButton::WebApp { .. }]);

    assert!(h.follow_ups.drain(Duration::from_secs(5)).await);
    let sent = h.transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].text.starts_with("Next prayer: Asr at"));
}

#[tokio::test]
async fn isha_arrival_previews_tomorrows_fajr() {
    let h = harness(MemoryRepository::with([subscriber(USER)]));
    let isha = moscow_times(march_first()).isha;

    h.notifier.run_cycle(isha - ChronoDuration::seconds(10)).await.unwrap();
    assert!(h.follow_ups.drain(Duration::from_secs(5)).await);

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].text.starts_with("Next prayer: Fajr tomorrow at"));
}

#[tokio::test]
async fn after_isha_the_next_prayer_is_tomorrows_fajr() {
    let h = harness(MemoryRepository::with([subscriber(USER)]));
    // A six-hour lead puts tomorrow's fajr reminder before local midnight.
    h.repo.update(USER, |s| s.preferences.reminder_lead_minutes = 360);
    let today = moscow_times(march_first());
    let tomorrow = moscow_times(march_first().succ_opt().unwrap());
    let now = minutes_before(tomorrow.fajr, 360);
    assert!(now > today.isha);

    let report = h.notifier.run_cycle(now).await.unwrap();
    assert_eq!(report.sent, 1);
    let key = h.ledger.keys()[0];
    assert_eq!(key.prayer, Prayer::Fajr);
    assert_eq!(key.occurs_at, tomorrow.fajr.timestamp());
    assert!(key.occurs_at > today.isha.timestamp());
}

#[tokio::test]
async fn isha_after_local_midnight_still_fires_both_stages() {
    let h = harness(MemoryRepository::with([subscriber(USER)]));
    let solstice = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
    let isha = moscow_times(solstice).isha;
    let moscow = chrono_tz::Europe::Moscow;
    assert_eq!(isha.with_timezone(&moscow).date_naive(), solstice.succ_opt().unwrap());

    // 20:00:17 on the 21st to 02:00:17 on the 22nd, Moscow time.
    let start = Utc.with_ymd_and_hms(2024, 6, 21, 17, 0, 17).unwrap();
    for minute in 0..=6 * 60 {
        h.notifier
            .run_cycle(start + ChronoDuration::minutes(minute))
            .await
            .unwrap();
    }

    let isha_stages: Vec<NotificationStage> = h
        .ledger
        .keys()
        .into_iter()
        .filter(|k| k.prayer == Prayer::Isha && k.occurs_at == isha.timestamp())
        .map(|k| k.stage)
        .collect();
    assert_eq!(isha_stages.len(), 2, "{:?}", h.ledger.keys());
    assert!(isha_stages.contains(&NotificationStage::Lead));
    assert!(isha_stages.contains(&NotificationStage::Arrival));
    assert!(h
        .transport
        .sent()
        .iter()
        .any(|m| m.text.contains("time for Isha")));
}

#[tokio::test]
async fn bad_records_are_skipped_without_stopping_the_cycle() {
    let mut broken = subscriber(1);
    broken.location = Some(Location::new(f64::NAN, 37.0));
    let mut missing = subscriber(2);
    missing.location = None;
    let mut bad_zone = subscriber(3);
    bad_zone.timezone = "Mars/Olympus".to_string();
    let h = harness(MemoryRepository::with([broken, missing, bad_zone, subscriber(4)]));

    let now = minutes_before(moscow_times(march_first()).dhuhr, 10);
    let report = h.notifier.run_cycle(now).await.unwrap();

    assert_eq!(report.subscribers, 4);
    assert_eq!(report.skipped, 3);
    assert_eq!(report.sent, 1);
    assert_eq!(h.transport.sent()[0].user_id, 4);
}

#[tokio::test]
async fn disabled_subscribers_are_not_notified() {
    let h = harness(MemoryRepository::with([subscriber(USER)]));
    h.repo.update(USER, |s| s.enabled = false);

    let now = minutes_before(moscow_times(march_first()).dhuhr, 10);
    let report = h.notifier.run_cycle(now).await.unwrap();
    assert_eq!(report.subscribers, 0);
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn transport_failure_is_retried_next_cycle_only() {
    let h = harness(MemoryRepository::with([subscriber(1), subscriber(2)]));
    h.transport.fail_for(1);

    let now = minutes_before(moscow_times(march_first()).dhuhr, 10);
    let report = h.notifier.run_cycle(now).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.sent, 1);
    assert_eq!(h.transport.sent()[0].user_id, 2);
    // Nothing recorded for the failed user, so a later cycle may try again.
    assert!(h.ledger.keys().iter().all(|k| k.user_id == 2));
}

#[tokio::test]
async fn unrecorded_send_is_counted_and_may_repeat() {
    let h = harness(MemoryRepository::with([subscriber(USER)]));
    h.ledger.fail_writes.store(true, Ordering::SeqCst);

    let now = minutes_before(moscow_times(march_first()).dhuhr, 10);
    let first = h.notifier.run_cycle(now).await.unwrap();
    assert_eq!(first.sent, 1);
    assert_eq!(first.unrecorded, 1);

    // Duplicate delivery is the accepted failure mode.
    let second = h.notifier.run_cycle(now).await.unwrap();
    assert_eq!(second.sent, 1);
    assert_eq!(h.transport.sent().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn stalled_transport_times_out_as_a_subscriber_failure() {
    let h = harness(MemoryRepository::with([subscriber(USER)]));
    h.transport.stall_for(Duration::from_secs(120));

    let now = minutes_before(moscow_times(march_first()).dhuhr, 10);
    let report = h.notifier.run_cycle(now).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.sent, 0);
    assert!(h.ledger.keys().is_empty());
}

#[tokio::test]
async fn failing_calculator_only_affects_that_subscriber() {
    struct PolarNight;
    impl PrayerTimeCalculator for PolarNight {
        fn compute(
            &self,
            _: NaiveDate,
            _: Location,
            _: &CalculationSettings,
        ) -> salat_core::ports::PortResult<DailyPrayerTimes> {
            Err(PortError::Unexpected("sun never rises".into()))
        }
    }

    let repo = Arc::new(MemoryRepository::with([subscriber(USER)]));
    let transport = Arc::new(RecordingTransport::default());
    let notifier = PrayerNotifier::new(
        repo,
        Arc::new(MemoryLedger::default()),
        transport.clone(),
        Arc::new(PolarNight),
        FollowUps::new(transport.clone(), Duration::from_millis(1), Duration::from_secs(1)),
        NotifierSettings {
            interval: Duration::from_secs(60),
            call_timeout: Duration::from_secs(1),
            mini_app_url: None,
        },
    );

    let report = notifier.run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(transport.sent().is_empty());
}
