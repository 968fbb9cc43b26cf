//! Typed record access over a [`KvStore`].
//!
//! Records are JSON documents under the namespaces in [`beacon_core::keys`].
//! Every write uses the entity's own expiration as the store deadline, so
//! nothing outlives the session or share it belongs to.

use crate::error::{StorageError, StorageResult};
use crate::traits::KvStore;
use beacon_core::keys;
use beacon_core::{GroupShare, Session, ShareHeader, ShareKind, SoloShare};
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use time::OffsetDateTime;

/// Session and share persistence.
#[derive(Clone)]
pub struct RecordStore {
    kv: Arc<dyn KvStore>,
    max_points: usize,
}

impl RecordStore {
    /// `max_points` is the buffer capacity attached to every loaded session.
    pub fn new(kv: Arc<dyn KvStore>, max_points: usize) -> Self {
        Self { kv, max_points }
    }

    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.kv.get(key).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        expire_at: OffsetDateTime,
    ) -> StorageResult<()> {
        let bytes = Bytes::from(serde_json::to_vec(value)?);
        self.kv.set(key, bytes, expire_at).await
    }

    // ===== Sessions =====

    pub async fn load_session(&self, id: &str) -> StorageResult<Option<Session>> {
        let session: Option<Session> = self.load(&keys::session(id)).await?;
        Ok(session.map(|s| s.restore(id, self.max_points)))
    }

    pub async fn save_session(&self, session: &Session) -> StorageResult<()> {
        self.save(&keys::session(session.id()), session, session.expire())
            .await
    }

    pub async fn delete_session(&self, id: &str) -> StorageResult<()> {
        self.kv.delete(&keys::session(id)).await
    }

    // ===== Shares =====

    /// Read only the `type` discriminant of a share record.
    pub async fn load_share_kind(&self, id: &str) -> StorageResult<Option<ShareKind>> {
        let header: Option<ShareHeader> = self.load(&keys::share(id)).await?;
        Ok(header.map(|h| h.kind))
    }

    pub async fn share_exists(&self, id: &str) -> StorageResult<bool> {
        self.kv.exists(&keys::share(id)).await
    }

    /// Load a solo share; a group share under the same id yields `None`.
    pub async fn load_solo_share(&self, id: &str) -> StorageResult<Option<SoloShare>> {
        if self.load_share_kind(id).await? != Some(ShareKind::Solo) {
            return Ok(None);
        }
        let share: Option<SoloShare> = self.load(&keys::share(id)).await?;
        Ok(share.map(|s| s.with_id(id)))
    }

    pub async fn save_solo_share(&self, share: &SoloShare) -> StorageResult<()> {
        self.save(&keys::share(share.id()), share, share.expire)
            .await
    }

    pub async fn delete_solo_share(&self, id: &str) -> StorageResult<()> {
        self.kv.delete(&keys::share(id)).await
    }

    /// Load a group share; a solo share under the same id yields `None`.
    pub async fn load_group_share(&self, id: &str) -> StorageResult<Option<GroupShare>> {
        if self.load_share_kind(id).await? != Some(ShareKind::Group) {
            return Ok(None);
        }
        let share: Option<GroupShare> = self.load(&keys::share(id)).await?;
        Ok(share.map(|s| s.with_id(id)))
    }

    /// Resolve a group through its PIN index.
    pub async fn load_group_by_pin(&self, pin: u32) -> StorageResult<Option<GroupShare>> {
        let share_id: Option<String> = self.load(&keys::group_pin(pin)).await?;
        match share_id {
            Some(id) => self.load_group_share(&id).await,
            None => Ok(None),
        }
    }

    pub async fn pin_in_use(&self, pin: u32) -> StorageResult<bool> {
        self.kv.exists(&keys::group_pin(pin)).await
    }

    /// Persist a group share and its PIN index with the same expiration.
    ///
    /// The share is written first; if the index write fails the share is
    /// still fetchable by id and simply not joinable.
    pub async fn save_group_share(&self, share: &GroupShare) -> StorageResult<()> {
        self.save(&keys::share(share.id()), share, share.expire)
            .await?;
        self.save(
            &keys::group_pin(share.pin()),
            &share.id().to_string(),
            share.expire,
        )
        .await
    }

    /// Remove a group share, index first so a PIN never resolves to a
    /// missing share.
    pub async fn delete_group_share(&self, share: &GroupShare) -> StorageResult<()> {
        self.kv.delete(&keys::group_pin(share.pin())).await?;
        self.kv.delete(&keys::share(share.id())).await
    }
}
