//! In-memory port implementations shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use salat_core::domain::{
    CalculationSettings, DedupKey, Location, NotificationPreferences, Subscriber, UserId,
};
use salat_core::ports::{
    DedupLedger, MessageTransport, PortError, PortResult, SendOptions, SubscriberRepository,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn subscriber(user_id: UserId) -> Subscriber {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Subscriber {
        user_id,
        location: Some(Location::FALLBACK),
        timezone: "Europe/Moscow".to_string(),
        calculation: CalculationSettings::default(),
        preferences: NotificationPreferences::default(),
        enabled: true,
        created_at: at,
        updated_at: at,
    }
}

//=========================================================================================
// Subscriber Repository
//=========================================================================================

#[derive(Default)]
pub struct MemoryRepository {
    subscribers: Mutex<BTreeMap<UserId, Subscriber>>,
}

impl MemoryRepository {
    pub fn with(subscribers: impl IntoIterator<Item = Subscriber>) -> Self {
        let repo = Self::default();
        {
            let mut map = repo.subscribers.lock().unwrap();
            for s in subscribers {
                map.insert(s.user_id, s);
            }
        }
        repo
    }

    pub fn update(&self, user_id: UserId, change: impl FnOnce(&mut Subscriber)) {
        let mut map = self.subscribers.lock().unwrap();
        change(map.get_mut(&user_id).expect("known subscriber"));
    }
}

#[async_trait]
impl SubscriberRepository for MemoryRepository {
    async fn list_enabled(&self) -> PortResult<Vec<Subscriber>> {
        Ok(self
            .subscribers
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.enabled)
            .cloned()
            .collect())
    }

    async fn get(&self, user_id: UserId) -> PortResult<Subscriber> {
        self.subscribers
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Subscriber {} not found", user_id)))
    }

    async fn put(&self, subscriber: Subscriber) -> PortResult<()> {
        self.subscribers
            .lock()
            .unwrap()
            .insert(subscriber.user_id, subscriber);
        Ok(())
    }
}

//=========================================================================================
// Dedup Ledger
//=========================================================================================

#[derive(Default)]
pub struct MemoryLedger {
    keys: Mutex<BTreeSet<DedupKey>>,
    pub fail_writes: AtomicBool,
}

impl MemoryLedger {
    pub fn keys(&self) -> Vec<DedupKey> {
        self.keys.lock().unwrap().iter().copied().collect()
    }
}

#[async_trait]
impl DedupLedger for MemoryLedger {
    async fn exists(&self, key: &DedupKey) -> PortResult<bool> {
        Ok(self.keys.lock().unwrap().contains(key))
    }

    async fn put(&self, key: DedupKey) -> PortResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("ledger unavailable".into()));
        }
        self.keys.lock().unwrap().insert(key);
        Ok(())
    }

    async fn clear_all(&self) -> PortResult<u64> {
        let mut keys = self.keys.lock().unwrap();
        let removed = keys.len() as u64;
        keys.clear();
        Ok(removed)
    }
}

//=========================================================================================
// Message Transport
//=========================================================================================

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub user_id: UserId,
    pub text: String,
    pub options: SendOptions,
}

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentMessage>>,
    failing: Mutex<HashSet<UserId>>,
    /// Every send sleeps this long first.
    stall: Mutex<Option<Duration>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_for(&self, user_id: UserId) {
        self.failing.lock().unwrap().insert(user_id);
    }

    pub fn stall_for(&self, duration: Duration) {
        *self.stall.lock().unwrap() = Some(duration);
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send_text(&self, user_id: UserId, text: &str, options: &SendOptions) -> PortResult<()> {
        let stall = *self.stall.lock().unwrap();
        if let Some(duration) = stall {
            tokio::time::sleep(duration).await;
        }
        if self.failing.lock().unwrap().contains(&user_id) {
            return Err(PortError::Rejected(format!("user {} blocked the bot", user_id)));
        }
        self.sent.lock().unwrap().push(SentMessage {
            user_id,
            text: text.to_string(),
            options: options.clone(),
        });
        Ok(())
    }
}
