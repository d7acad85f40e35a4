//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::tasks::messages::local_clock;
use crate::web::protocol::{
    CalculationSettingsDto, HealthResponse, NextPrayer, PreferencesDto, PreferencesUpdate,
    PrayerTimeEntry, PrayerTimesQuery, PrayerTimesResponse, QiblaQuery, QiblaResponse,
    SettingsUpdate, SubscribeRequest, SubscriberResponse,
};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use salat_core::domain::{
    CalculationSettings, Location, NotificationPreferences, Subscriber, UnknownVariant, UserId,
};
use salat_core::ports::PortError;
use salat_core::heading::normalize_degrees;
use salat_core::qibla::{distance_to_kaaba_km, is_facing_qibla, needle_rotation, qibla_bearing};
use salat_core::schedule::{
    current_occurrence, day_after, day_before, local_date, minutes_until, next_occurrence,
    parse_timezone,
};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;

pub const MAX_LEAD_MINUTES: u32 = 120;
/// Degrees either side of the qibla counted as facing it.
pub const FACING_TOLERANCE_DEGREES: f64 = 5.0;

type HandlerError = (StatusCode, String);

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        subscribe_handler,
        get_subscription_handler,
        update_preferences_handler,
        update_settings_handler,
        unsubscribe_handler,
        prayer_times_handler,
        qibla_handler,
    ),
    components(
        schemas(
            HealthResponse,
            SubscribeRequest,
            PreferencesUpdate,
            SettingsUpdate,
            SubscriberResponse,
            CalculationSettingsDto,
            PreferencesDto,
            PrayerTimesResponse,
            PrayerTimeEntry,
            NextPrayer,
            QiblaResponse,
        )
    ),
    tags(
        (name = "Prayer Reminder API", description = "Subscriptions, prayer times and qibla direction for the Mini App.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

fn port_error(context: &str, e: PortError) -> HandlerError {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::InvalidData(msg) => (StatusCode::BAD_REQUEST, msg),
        other => {
            error!("{}: {:?}", context, other);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}

fn bad_request(e: UnknownVariant) -> HandlerError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

fn parse_location(latitude: f64, longitude: f64) -> Result<Location, HandlerError> {
    let location = Location::new(latitude, longitude);
    if location.is_valid() {
        Ok(location)
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            format!("invalid coordinates ({}, {})", latitude, longitude),
        ))
    }
}

/// Applies optional textual overrides on top of `base`.
fn apply_settings(
    base: CalculationSettings,
    method: Option<&str>,
    madhab: Option<&str>,
    high_latitude_rule: Option<&str>,
) -> Result<CalculationSettings, HandlerError> {
    let mut settings = base;
    if let Some(method) = method {
        settings.method = method.parse().map_err(bad_request)?;
    }
    if let Some(madhab) = madhab {
        settings.madhab = madhab.parse().map_err(bad_request)?;
    }
    if let Some(rule) = high_latitude_rule {
        settings.high_latitude_rule = rule.parse().map_err(bad_request)?;
    }
    Ok(settings)
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Opt in to prayer reminders, or resend the location.
///
/// Creates the subscriber on first call. Without coordinates a new subscriber
/// gets the fallback city and an existing one keeps its saved location. The
/// timezone is re-resolved whenever the location changes, and `enabled` is set.
#[utoipa::path(
    post,
    path = "/subscriptions",
    request_body = SubscribeRequest,
    responses(
        (status = 201, description = "Subscriber created", body = SubscriberResponse),
        (status = 200, description = "Subscriber updated", body = SubscriberResponse),
        (status = 400, description = "Invalid coordinates"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn subscribe_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let sent = match (body.latitude, body.longitude) {
        (Some(latitude), Some(longitude)) => Some(parse_location(latitude, longitude)?),
        (None, None) => None,
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                "latitude and longitude must be sent together".to_string(),
            ))
        }
    };
    let now = Utc::now();

    let (subscriber, status) = match app_state.subscribers.get(body.user_id).await {
        Ok(mut existing) => {
            // Re-opting in without coordinates keeps the saved city.
            let kept = existing.location.filter(Location::is_valid);
            match (sent, kept) {
                (None, Some(_)) => {}
                (location, _) => {
                    let location = location.unwrap_or(Location::FALLBACK);
                    existing.location = Some(location);
                    existing.timezone = app_state.timezones.resolve(location);
                }
            }
            existing.enabled = true;
            existing.updated_at = now;
            (existing, StatusCode::OK)
        }
        Err(PortError::NotFound(_)) => {
            let location = sent.unwrap_or(Location::FALLBACK);
            (
                Subscriber {
                    user_id: body.user_id,
                    location: Some(location),
                    timezone: app_state.timezones.resolve(location),
                    calculation: CalculationSettings::default(),
                    preferences: NotificationPreferences::default(),
                    enabled: true,
                    created_at: now,
                    updated_at: now,
                },
                StatusCode::CREATED,
            )
        }
        Err(e) => return Err(port_error("Failed to load subscriber", e)),
    };

    app_state
        .subscribers
        .put(subscriber.clone())
        .await
        .map_err(|e| port_error("Failed to save subscriber", e))?;
    info!(user_id = subscriber.user_id, timezone = %subscriber.timezone, "Subscriber opted in");

    Ok((status, Json(SubscriberResponse::from(&subscriber))))
}

#[utoipa::path(
    get,
    path = "/subscriptions/{user_id}",
    params(("user_id" = i64, Path, description = "Telegram user id")),
    responses(
        (status = 200, description = "The subscriber", body = SubscriberResponse),
        (status = 404, description = "Unknown subscriber")
    )
)]
pub async fn get_subscription_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<SubscriberResponse>, HandlerError> {
    let subscriber = app_state
        .subscribers
        .get(user_id)
        .await
        .map_err(|e| port_error("Failed to load subscriber", e))?;
    Ok(Json(SubscriberResponse::from(&subscriber)))
}

#[utoipa::path(
    put,
    path = "/subscriptions/{user_id}/preferences",
    params(("user_id" = i64, Path, description = "Telegram user id")),
    request_body = PreferencesUpdate,
    responses(
        (status = 200, description = "Updated subscriber", body = SubscriberResponse),
        (status = 400, description = "Lead time out of range"),
        (status = 404, description = "Unknown subscriber")
    )
)]
pub async fn update_preferences_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
    Json(update): Json<PreferencesUpdate>,
) -> Result<Json<SubscriberResponse>, HandlerError> {
    if let Some(lead) = update.reminder_lead_minutes {
        if !(1..=MAX_LEAD_MINUTES).contains(&lead) {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("reminder_lead_minutes must be between 1 and {}", MAX_LEAD_MINUTES),
            ));
        }
    }

    let mut subscriber = app_state
        .subscribers
        .get(user_id)
        .await
        .map_err(|e| port_error("Failed to load subscriber", e))?;

    let prefs = &mut subscriber.preferences;
    prefs.fajr = update.fajr.unwrap_or(prefs.fajr);
    prefs.dhuhr = update.dhuhr.unwrap_or(prefs.dhuhr);
    prefs.asr = update.asr.unwrap_or(prefs.asr);
    prefs.maghrib = update.maghrib.unwrap_or(prefs.maghrib);
    prefs.isha = update.isha.unwrap_or(prefs.isha);
    prefs.reminder_lead_minutes = update.reminder_lead_minutes.unwrap_or(prefs.reminder_lead_minutes);
    prefs.sound = update.sound.unwrap_or(prefs.sound);
    prefs.vibration = update.vibration.unwrap_or(prefs.vibration);
    prefs.this_channel_only = update.this_channel_only.unwrap_or(prefs.this_channel_only);
    subscriber.updated_at = Utc::now();

    app_state
        .subscribers
        .put(subscriber.clone())
        .await
        .map_err(|e| port_error("Failed to save subscriber", e))?;
    Ok(Json(SubscriberResponse::from(&subscriber)))
}

#[utoipa::path(
    put,
    path = "/subscriptions/{user_id}/settings",
    params(("user_id" = i64, Path, description = "Telegram user id")),
    request_body = SettingsUpdate,
    responses(
        (status = 200, description = "Updated subscriber", body = SubscriberResponse),
        (status = 400, description = "Unknown method, madhab or rule"),
        (status = 404, description = "Unknown subscriber")
    )
)]
pub async fn update_settings_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SubscriberResponse>, HandlerError> {
    let mut subscriber = app_state
        .subscribers
        .get(user_id)
        .await
        .map_err(|e| port_error("Failed to load subscriber", e))?;

    subscriber.calculation = apply_settings(
        subscriber.calculation,
        update.method.as_deref(),
        update.madhab.as_deref(),
        update.high_latitude_rule.as_deref(),
    )?;
    subscriber.updated_at = Utc::now();

    app_state
        .subscribers
        .put(subscriber.clone())
        .await
        .map_err(|e| port_error("Failed to save subscriber", e))?;
    Ok(Json(SubscriberResponse::from(&subscriber)))
}

/// Opt out. The subscriber is kept with `enabled = false`.
#[utoipa::path(
    delete,
    path = "/subscriptions/{user_id}",
    params(("user_id" = i64, Path, description = "Telegram user id")),
    responses(
        (status = 204, description = "Reminders disabled"),
        (status = 404, description = "Unknown subscriber")
    )
)]
pub async fn unsubscribe_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> Result<StatusCode, HandlerError> {
    let mut subscriber = app_state
        .subscribers
        .get(user_id)
        .await
        .map_err(|e| port_error("Failed to load subscriber", e))?;

    subscriber.enabled = false;
    subscriber.updated_at = Utc::now();
    app_state
        .subscribers
        .put(subscriber)
        .await
        .map_err(|e| port_error("Failed to save subscriber", e))?;
    info!(user_id, "Subscriber opted out");
    Ok(StatusCode::NO_CONTENT)
}

/// The six prayer times for a location, plus the current and next prayer.
#[utoipa::path(
    get,
    path = "/prayer-times",
    params(PrayerTimesQuery),
    responses(
        (status = 200, description = "Prayer times", body = PrayerTimesResponse),
        (status = 400, description = "Invalid coordinates or settings"),
        (status = 500, description = "Times cannot be computed for this place and date")
    )
)]
pub async fn prayer_times_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<PrayerTimesQuery>,
) -> Result<Json<PrayerTimesResponse>, HandlerError> {
    let location = parse_location(query.latitude, query.longitude)?;
    let settings = apply_settings(
        CalculationSettings::default(),
        query.method.as_deref(),
        query.madhab.as_deref(),
        query.high_latitude_rule.as_deref(),
    )?;
    let timezone = app_state.timezones.resolve(location);
    let tz = parse_timezone(&timezone).map_err(|e| port_error("Unusable timezone", e))?;

    let now = Utc::now();
    let today = local_date(now, tz);
    let date = query.date.unwrap_or(today);
    let calculator = &app_state.calculator;
    let times = calculator
        .compute(date, location, &settings)
        .map_err(|e| port_error("Failed to compute prayer times", e))?;

    let (current, next) = if date == today {
        let next = next_occurrence(
            &times,
            now,
            || calculator.compute(day_before(date)?, location, &settings),
            || calculator.compute(day_after(date)?, location, &settings),
        )
        .map_err(|e| port_error("Failed to compute the next prayer", e))?;
        (
            current_occurrence(&times, now).map(|occ| occ.prayer.as_str().to_string()),
            Some(NextPrayer {
                prayer: next.prayer.as_str().to_string(),
                at: next.at,
                minutes_until: minutes_until(next.at, now),
            }),
        )
    } else {
        (None, None)
    };

    Ok(Json(PrayerTimesResponse {
        date,
        timezone,
        times: times
            .occurrences()
            .map(|occ| PrayerTimeEntry {
                prayer: occ.prayer.as_str().to_string(),
                at: occ.at,
                local_time: local_clock(occ.at, tz),
            })
            .collect(),
        current,
        next,
    }))
}

#[utoipa::path(
    get,
    path = "/qibla",
    params(QiblaQuery),
    responses(
        (status = 200, description = "Bearing to the Kaaba", body = QiblaResponse),
        (status = 400, description = "Invalid coordinates or heading")
    )
)]
pub async fn qibla_handler(Query(query): Query<QiblaQuery>) -> Result<Json<QiblaResponse>, HandlerError> {
    let location = parse_location(query.latitude, query.longitude)?;
    let bearing = qibla_bearing(location);

    let heading = match query.heading {
        Some(h) if !h.is_finite() => {
            return Err((StatusCode::BAD_REQUEST, format!("invalid heading {}", h)))
        }
        other => other.map(normalize_degrees),
    };

    Ok(Json(QiblaResponse {
        bearing,
        distance_km: distance_to_kaaba_km(location),
        needle_rotation: heading.map(|h| needle_rotation(h, bearing)),
        facing: heading.map(|h| is_facing_qibla(h, bearing, FACING_TOLERANCE_DEGREES)),
    }))
}

