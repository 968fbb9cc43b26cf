//! Redis store backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::KvStore;
use ::redis::AsyncCommands;
use ::redis::aio::ConnectionManager;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::instrument;

/// Redis-backed store.
///
/// Keys are namespaced as `<prefix>-<key>` and expiry is delegated to Redis
/// through millisecond TTLs.
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    /// Connect and verify the server answers.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> StorageResult<Self> {
        const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

        let client = ::redis::Client::open(url)?;
        let conn = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                StorageError::Config(format!(
                    "redis connection timed out after {}s",
                    CONNECT_TIMEOUT.as_secs()
                ))
            })??;

        let store = Self {
            conn,
            prefix: prefix.into(),
        };
        store.health_check().await?;
        Ok(store)
    }

    fn key(&self, key: &str) -> String {
        prefixed_key(&self.prefix, key)
    }
}

fn prefixed_key(prefix: &str, key: &str) -> String {
    format!("{prefix}-{key}")
}

/// Milliseconds from `now` until `expire_at`, or `None` if already expired.
fn ttl_millis(expire_at: OffsetDateTime, now: OffsetDateTime) -> Option<u64> {
    let millis = (expire_at - now).whole_milliseconds();
    if millis <= 0 {
        None
    } else {
        Some(u64::try_from(millis).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl KvStore for RedisStore {
    #[instrument(skip(self), fields(backend = "redis"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(self.key(key)).await?;
        value
            .map(Bytes::from)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    #[instrument(skip(self, value), fields(backend = "redis", size = value.len()))]
    async fn set(&self, key: &str, value: Bytes, expire_at: OffsetDateTime) -> StorageResult<()> {
        let Some(ttl) = ttl_millis(expire_at, OffsetDateTime::now_utc()) else {
            // Redis rejects a non-positive TTL; an expired write is a removal.
            return self.delete(key).await;
        };
        let mut conn = self.conn.clone();
        let _: () = conn.pset_ex(self.key(key), value.as_ref(), ttl).await?;
        Ok(())
    }

    #[instrument(skip(self, value), fields(backend = "redis", size = value.len()))]
    async fn set_with_ttl(
        &self,
        key: &str,
        value: Bytes,
        ttl: time::Duration,
    ) -> StorageResult<()> {
        let millis = ttl.whole_milliseconds();
        if millis <= 0 {
            return self.delete(key).await;
        }
        let mut conn = self.conn.clone();
        let ttl = u64::try_from(millis).unwrap_or(u64::MAX);
        let _: () = conn.pset_ex(self.key(key), value.as_ref(), ttl).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.key(key)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "redis"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(self.key(key)).await?;
        Ok(exists)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn health_check(&self) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        let pong: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(StorageError::Unavailable(format!(
                "unexpected PING reply {pong:?}"
            )));
        }
        Ok(())
    }
}
