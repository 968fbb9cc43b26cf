//! Fault-injecting store for partial-write tests.

use async_trait::async_trait;
use beacon_storage::{KvStore, MemoryStore, StorageError, StorageResult};
use bytes::Bytes;
use std::sync::Mutex;
use time::OffsetDateTime;

#[derive(Default)]
struct Faults {
    sets: Option<&'static str>,
    deletes: Option<&'static str>,
    reads: Option<&'static str>,
}

/// Memory store that fails operations on keys with a chosen prefix and keeps
/// a log of the writes it accepted.
#[allow(dead_code)]
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    faults: Mutex<Faults>,
    writes: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `set` whose key starts with `prefix`.
    pub fn fail_sets(&self, prefix: &'static str) {
        self.faults.lock().unwrap().sets = Some(prefix);
    }

    /// Fail every `delete` whose key starts with `prefix`.
    pub fn fail_deletes(&self, prefix: &'static str) {
        self.faults.lock().unwrap().deletes = Some(prefix);
    }

    /// Fail every `get` and `exists` whose key starts with `prefix`.
    pub fn fail_reads(&self, prefix: &'static str) {
        self.faults.lock().unwrap().reads = Some(prefix);
    }

    pub fn heal(&self) {
        *self.faults.lock().unwrap() = Faults::default();
    }

    /// Accepted writes since the last call, as `set <key>` / `delete <key>`.
    pub fn take_writes(&self) -> Vec<String> {
        std::mem::take(&mut *self.writes.lock().unwrap())
    }

    fn check(&self, prefix: Option<&'static str>, key: &str) -> StorageResult<()> {
        match prefix {
            Some(p) if key.starts_with(p) => {
                Err(StorageError::Unavailable(format!("injected failure on {key}")))
            }
            _ => Ok(()),
        }
    }

    fn record(&self, op: &str, key: &str) {
        self.writes.lock().unwrap().push(format!("{op} {key}"));
    }
}

#[async_trait]
impl KvStore for FaultyStore {
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let reads = self.faults.lock().unwrap().reads;
        self.check(reads, key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Bytes, expire_at: OffsetDateTime) -> StorageResult<()> {
        let sets = self.faults.lock().unwrap().sets;
        self.check(sets, key)?;
        self.inner.set(key, value, expire_at).await?;
        self.record("set", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let deletes = self.faults.lock().unwrap().deletes;
        self.check(deletes, key)?;
        self.inner.delete(key).await?;
        self.record("delete", key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let reads = self.faults.lock().unwrap().reads;
        self.check(reads, key)?;
        self.inner.exists(key).await
    }

    fn backend_name(&self) -> &'static str {
        "faulty-memory"
    }
}
