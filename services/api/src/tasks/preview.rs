//! services/api/src/tasks/preview.rs
//!
//! One-shot delayed messages sent after an arrival notification. Each runs as
//! its own task on a `TaskTracker`, outside the notification cycle; a failed
//! preview is logged and never reported back to the cycle that scheduled it.

use salat_core::domain::UserId;
use salat_core::ports::{MessageTransport, SendOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::tasks::bounded;

#[derive(Clone)]
pub struct FollowUps {
    transport: Arc<dyn MessageTransport>,
    tracker: TaskTracker,
    delay: Duration,
    call_timeout: Duration,
}

impl FollowUps {
    pub fn new(transport: Arc<dyn MessageTransport>, delay: Duration, call_timeout: Duration) -> Self {
        Self {
            transport,
            tracker: TaskTracker::new(),
            delay,
            call_timeout,
        }
    }

    /// Sends `text` to `user_id` once `delay` has elapsed. Returns immediately.
    pub fn schedule(&self, user_id: UserId, text: String, options: SendOptions) {
        if self.tracker.is_closed() {
            debug!(user_id, "Shutting down; dropping follow-up");
            return;
        }

        let transport = Arc::clone(&self.transport);
        let delay = self.delay;
        let call_timeout = self.call_timeout;
        self.tracker.spawn(async move {
            tokio::time::sleep(delay).await;
            let sent = bounded(
                call_timeout,
                "follow-up send",
                transport.send_text(user_id, &text, &options),
            )
            .await;
            match sent {
                Ok(()) => debug!(user_id, "Follow-up delivered"),
                Err(e) => warn!(user_id, error = %e, "Follow-up failed"),
            }
        });
    }

    /// Number of follow-ups still waiting or sending.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Stops accepting new follow-ups and waits up to `grace` for the pending ones.
    /// Returns `false` if some were still running when the grace period ran out.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tracker.close();
        tokio::time::timeout(grace, self.tracker.wait()).await.is_ok()
    }
}
