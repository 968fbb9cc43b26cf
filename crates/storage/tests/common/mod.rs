//! Shared fixtures for storage integration tests.

#![allow(dead_code)]

use beacon_core::point::{PlainPoint, Provider};
use beacon_core::{GroupShare, Session, SoloShare};
use beacon_storage::{KvStore, MemoryStore, RecordStore};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

pub const MAX_POINTS: usize = 3;

/// A record store over a fresh memory backend, plus the backend itself for
/// inspecting physical state.
pub fn record_store() -> (RecordStore, Arc<MemoryStore>) {
    let memory = Arc::new(MemoryStore::new());
    let kv: Arc<dyn KvStore> = memory.clone();
    (RecordStore::new(kv, MAX_POINTS), memory)
}

pub fn in_one_hour() -> OffsetDateTime {
    OffsetDateTime::now_utc() + Duration::hours(1)
}

pub fn plain_point(time: f64) -> PlainPoint {
    PlainPoint {
        lat: 51.5074,
        lon: -0.1278,
        time,
        provider: Provider::Fine,
        accuracy: Some(5.0),
        speed: None,
    }
}

pub fn session() -> Session {
    Session::new(5.0, in_one_hour(), None, MAX_POINTS)
}

pub fn solo_share(id: &str, host: &str) -> SoloShare {
    SoloShare::new(id, host, in_one_hour(), true)
}

pub fn group_share(id: &str, pin: u32) -> GroupShare {
    GroupShare::new(id, in_one_hour(), pin)
}
