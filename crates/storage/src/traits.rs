//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use time::{Duration, OffsetDateTime};

/// Key-value store whose records carry an absolute expiration.
///
/// A record whose expiration is at or before the current instant behaves as
/// absent for every operation, whether or not the backend has physically
/// dropped it yet. Only the last write to a key is observable; nothing is
/// guaranteed across keys.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Fetch a live record, or `StorageError::NotFound`.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Write a record that expires at `expire_at`.
    async fn set(&self, key: &str, value: Bytes, expire_at: OffsetDateTime) -> StorageResult<()>;

    /// Write a record that expires `ttl` from now.
    async fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> StorageResult<()> {
        self.set(key, value, OffsetDateTime::now_utc() + ttl).await
    }

    /// Remove a record. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Whether a live record exists under `key`.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get the name of this storage backend.
    ///
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify backend connectivity.
    ///
    /// The default implementation returns Ok(()), suitable for backends that
    /// cannot become unreachable (e.g., in-process memory).
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
