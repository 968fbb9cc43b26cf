//! In-process store backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::KvStore;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

struct Entry {
    value: Bytes,
    expire_at: OffsetDateTime,
}

impl Entry {
    fn is_live(&self, now: OffsetDateTime) -> bool {
        self.expire_at > now
    }
}

/// In-memory store with lazy expiry.
///
/// Expired entries are invisible to readers immediately and physically
/// removed by [`MemoryStore::purge_expired`], normally driven by
/// [`spawn_sweep_task`].
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physically held entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let now = OffsetDateTime::now_utc();
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(entry.value.clone()),
            _ => Err(StorageError::NotFound(key.to_string())),
        }
    }

    async fn set(&self, key: &str, value: Bytes, expire_at: OffsetDateTime) -> StorageResult<()> {
        if expire_at <= OffsetDateTime::now_utc() {
            self.entries.remove(key);
            return Ok(());
        }
        self.entries
            .insert(key.to_string(), Entry { value, expire_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_live(now)))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Spawn a background task that periodically purges expired entries.
pub fn spawn_sweep_task(
    store: Arc<MemoryStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                tracing::debug!(
                    purged = purged,
                    remaining = store.len(),
                    "Memory store sweep removed expired records"
                );
            }
        }
    })
}
