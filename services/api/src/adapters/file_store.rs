//! services/api/src/adapters/file_store.rs
//!
//! JSON-file-backed implementations of the `SubscriberRepository` and
//! `DedupLedger` ports, used when no database is configured.
//!
//! Each store is a flat ordered list, read in full when opened and rewritten in
//! full on every mutation. The in-memory copy only changes after the file write
//! succeeds, so memory and disk never disagree.

use async_trait::async_trait;
use salat_core::domain::{DedupKey, Subscriber, UserId};
use salat_core::ports::{DedupLedger, PortError, PortResult, SubscriberRepository};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::adapters::records::{DedupRecord, SubscriberRecord};

pub const SUBSCRIBERS_FILE: &str = "subscribers.json";
pub const LEDGER_FILE: &str = "notified.json";

//=========================================================================================
// JSON List File
//=========================================================================================

#[derive(Debug, Clone)]
struct JsonListFile {
    path: PathBuf,
}

impl JsonListFile {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A missing file is an empty list.
    async fn load<T: DeserializeOwned>(&self) -> PortResult<Vec<T>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                PortError::InvalidData(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(PortError::Unexpected(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Writes to a sibling temp file, then renames over the target.
    async fn save<T: Serialize>(&self, items: &[T]) -> PortResult<()> {
        let io_err = |e: std::io::Error| {
            PortError::Unexpected(format!("failed to write {}: {}", self.path.display(), e))
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let json = serde_json::to_vec_pretty(items)
            .map_err(|e| PortError::Unexpected(format!("failed to serialize: {}", e)))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

//=========================================================================================
// Subscriber Store
//=========================================================================================

pub struct JsonSubscriberStore {
    file: JsonListFile,
    records: Mutex<Vec<SubscriberRecord>>,
}

impl JsonSubscriberStore {
    /// Opens the store, loading every record from `path`.
    pub async fn open(path: impl AsRef<Path>) -> PortResult<Self> {
        let file = JsonListFile::new(path.as_ref());
        let records: Vec<SubscriberRecord> = file.load().await?;
        info!(count = records.len(), path = %file.path.display(), "Loaded subscribers");
        Ok(Self {
            file,
            records: Mutex::new(records),
        })
    }
}

#[async_trait]
impl SubscriberRepository for JsonSubscriberStore {
    async fn list_enabled(&self) -> PortResult<Vec<Subscriber>> {
        let records = self.records.lock().await;
        let subscribers = records
            .iter()
            .filter(|r| r.enabled)
            .cloned()
            .filter_map(|r| match r.to_domain() {
                Ok(subscriber) => Some(subscriber),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed subscriber record");
                    None
                }
            })
            .collect();
        Ok(subscribers)
    }

    async fn get(&self, user_id: UserId) -> PortResult<Subscriber> {
        let records = self.records.lock().await;
        records
            .iter()
            .find(|r| r.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Subscriber {} not found", user_id)))?
            .to_domain()
    }

    async fn put(&self, subscriber: Subscriber) -> PortResult<()> {
        let record = SubscriberRecord::from_domain(&subscriber);
        let mut records = self.records.lock().await;

        let mut updated = records.clone();
        match updated.iter_mut().find(|r| r.user_id == record.user_id) {
            Some(existing) => *existing = record,
            None => updated.push(record),
        }

        self.file.save(&updated).await?;
        *records = updated;
        Ok(())
    }
}

//=========================================================================================
// Dedup Ledger
//=========================================================================================

pub struct JsonLedger {
    file: JsonListFile,
    records: Mutex<Vec<DedupRecord>>,
}

impl JsonLedger {
    /// Opens the ledger, loading every key recorded before the last restart.
    pub async fn open(path: impl AsRef<Path>) -> PortResult<Self> {
        let file = JsonListFile::new(path.as_ref());
        let records: Vec<DedupRecord> = file.load().await?;
        info!(count = records.len(), path = %file.path.display(), "Loaded notification ledger");
        Ok(Self {
            file,
            records: Mutex::new(records),
        })
    }
}

#[async_trait]
impl DedupLedger for JsonLedger {
    async fn exists(&self, key: &DedupKey) -> PortResult<bool> {
        let wanted = DedupRecord::from(key);
        Ok(self.records.lock().await.contains(&wanted))
    }

    async fn put(&self, key: DedupKey) -> PortResult<()> {
        let record = DedupRecord::from(&key);
        let mut records = self.records.lock().await;
        if records.contains(&record) {
            return Ok(());
        }

        let mut updated = records.clone();
        updated.push(record);
        self.file.save(&updated).await?;
        *records = updated;
        Ok(())
    }

    async fn clear_all(&self) -> PortResult<u64> {
        let mut records = self.records.lock().await;
        let removed = records.len() as u64;
        self.file.save::<DedupRecord>(&[]).await?;
        records.clear();
        Ok(removed)
    }
}
