//! crates/salat_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{CalculationSettings, DailyPrayerTimes, DedupKey, Location, Subscriber, UserId};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    /// The remote side refused the request permanently (e.g. the user blocked the bot).
    #[error("Rejected: {0}")]
    Rejected(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Message Options
//=========================================================================================

/// An interactive affordance attached below a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyButton {
    /// Sends `data` back to the bot when pressed.
    Callback { text: String, data: String },
    /// Opens the Mini App at `url`.
    WebApp { text: String, url: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Deliver without sound.
    pub silent: bool,
    /// One row of buttons; empty means a plain message.
    pub buttons: Vec<ReplyButton>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    /// Every subscriber whose `enabled` flag is set. Read fresh on each call.
    async fn list_enabled(&self) -> PortResult<Vec<Subscriber>>;

    /// Returns `PortError::NotFound` when the user never opted in.
    async fn get(&self, user_id: UserId) -> PortResult<Subscriber>;

    /// Inserts or replaces the subscriber keyed by `user_id`.
    async fn put(&self, subscriber: Subscriber) -> PortResult<()>;
}

#[async_trait]
pub trait DedupLedger: Send + Sync {
    async fn exists(&self, key: &DedupKey) -> PortResult<bool>;

    /// Idempotent: recording an existing key is not an error.
    async fn put(&self, key: DedupKey) -> PortResult<()>;

    /// Removes every key and returns how many were removed.
    async fn clear_all(&self) -> PortResult<u64>;
}

#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Best-effort delivery of a text message to a user.
    async fn send_text(&self, user_id: UserId, text: &str, options: &SendOptions) -> PortResult<()>;
}

/// Computes the six daily prayer instants. Pure computation, so synchronous.
pub trait PrayerTimeCalculator: Send + Sync {
    fn compute(
        &self,
        date: NaiveDate,
        location: Location,
        settings: &CalculationSettings,
    ) -> PortResult<DailyPrayerTimes>;
}

/// Maps coordinates to an IANA zone name.
pub trait TimezoneResolver: Send + Sync {
    fn resolve(&self, location: Location) -> String;
}
