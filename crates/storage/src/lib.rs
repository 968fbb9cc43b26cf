//! Expiring key-value storage for beacon.
//!
//! This crate provides:
//! - The [`KvStore`] contract: records with absolute expirations and lazy expiry
//! - Backends: in-process memory and Redis
//! - [`RecordStore`]: typed session and share persistence on top of any backend

pub mod backends;
pub mod error;
pub mod records;
pub mod traits;

pub use backends::memory::{MemoryStore, spawn_sweep_task};
pub use backends::redis::RedisStore;
pub use error::{StorageError, StorageResult};
pub use records::RecordStore;
pub use traits::KvStore;

use beacon_core::config::StoreConfig;
use std::sync::Arc;
use std::time::Duration;

/// Create a store from configuration.
///
/// For the memory backend this also starts the expiry sweep, so it must be
/// called from within a Tokio runtime.
pub async fn from_config(config: &StoreConfig) -> StorageResult<Arc<dyn KvStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StoreConfig::Memory {
            sweep_interval_secs,
        } => {
            let store = Arc::new(MemoryStore::new());
            spawn_sweep_task(store.clone(), Duration::from_secs(*sweep_interval_secs));
            Ok(store)
        }
        StoreConfig::Redis { url, prefix } => {
            let store = RedisStore::connect(url, prefix.clone()).await?;
            Ok(Arc::new(store))
        }
    }
}
