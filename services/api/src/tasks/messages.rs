//! services/api/src/tasks/messages.rs
//!
//! Renders the text and reply affordances of the notifications sent to subscribers.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use salat_core::domain::{NotificationPreferences, PrayerOccurrence};
use salat_core::ports::{ReplyButton, SendOptions};

/// `HH:MM` in the subscriber's zone.
pub fn local_clock(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%H:%M").to_string()
}

pub fn lead_text(occurrence: &PrayerOccurrence, minutes: u32, tz: Tz) -> String {
    format!(
        "🕌 {} in {} min, at {}.",
        occurrence.prayer.display_name(),
        minutes,
        local_clock(occurrence.at, tz)
    )
}

pub fn arrival_text(occurrence: &PrayerOccurrence, tz: Tz) -> String {
    format!(
        "🕌 It is time for {} ({}).",
        occurrence.prayer.display_name(),
        local_clock(occurrence.at, tz)
    )
}

/// The follow-up naming the prayer after the one just announced.
/// `today` is the subscriber's local date; a prayer falling on a later local
/// date reads as "tomorrow".
pub fn preview_text(next: &PrayerOccurrence, today: NaiveDate, tz: Tz) -> String {
    let day = if next.at.with_timezone(&tz).date_naive() > today {
        " tomorrow"
    } else {
        ""
    };
    format!(
        "Next prayer: {}{} at {}.",
        next.prayer.display_name(),
        day,
        local_clock(next.at, tz)
    )
}

/// Data carried by the "prayed" button, echoed back by Telegram on press.
pub fn prayed_callback_data(occurrence: &PrayerOccurrence) -> String {
    format!("prayed:{}:{}", occurrence.prayer, occurrence.at.timestamp())
}

/// Plain delivery: no buttons, alerting per preference.
pub fn plain_options(preferences: &NotificationPreferences) -> SendOptions {
    SendOptions {
        silent: preferences.is_silent(),
        buttons: Vec::new(),
    }
}

/// Arrival messages carry a "prayed" button and, when configured, a Mini App button.
pub fn arrival_options(
    occurrence: &PrayerOccurrence,
    preferences: &NotificationPreferences,
    mini_app_url: Option<&str>,
) -> SendOptions {
    let mut buttons = vec![ReplyButton::Callback {
        text: "✅ Prayed".to_string(),
        data: prayed_callback_data(occurrence),
    }];
    if let Some(url) = mini_app_url {
        buttons.push(ReplyButton::WebApp {
            text: "Open app".to_string(),
            url: url.to_string(),
        });
    }
    SendOptions {
        silent: preferences.is_silent(),
        buttons,
    }
}
