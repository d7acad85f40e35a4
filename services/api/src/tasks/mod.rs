//! services/api/src/tasks/mod.rs
//!
//! Background workers: the per-minute notification cycle, the daily ledger
//! reset, and the deferred next-prayer preview.

pub mod ledger_reset_task;
pub mod messages;
pub mod notification_task;
pub mod preview;

pub use ledger_reset_task::LedgerReset;
pub use notification_task::{CycleReport, NotifierSettings, PrayerNotifier};
pub use preview::FollowUps;

use salat_core::ports::{PortError, PortResult};
use std::future::Future;
use std::time::Duration;

/// Runs one external call, turning an overrun into `PortError::Timeout`.
pub async fn bounded<T, F>(limit: Duration, what: &str, call: F) -> PortResult<T>
where
    F: Future<Output = PortResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(PortError::Timeout(format!(
            "{} did not finish within {:?}",
            what, limit
        ))),
    }
}
