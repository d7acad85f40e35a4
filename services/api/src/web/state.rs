//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use salat_core::ports::{PrayerTimeCalculator, SubscriberRepository, TimezoneResolver};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub subscribers: Arc<dyn SubscriberRepository>,
    pub calculator: Arc<dyn PrayerTimeCalculator>,
    pub timezones: Arc<dyn TimezoneResolver>,
    pub config: Arc<Config>,
}
