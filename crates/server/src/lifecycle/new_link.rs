//! Extra solo links for an existing session.

use super::error::{LifecycleError, LifecycleResult, SESSION_EXPIRED};
use super::{Lifecycle, short_id};
use beacon_core::SoloShare;
use beacon_core::share::view_link;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewLinkRequest {
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub ado: String,
}

#[derive(Debug, Clone)]
pub struct NewLink {
    pub share_id: String,
    pub view_link: String,
}

impl Lifecycle {
    /// Add a new solo share to `sid`, expiring with the session.
    pub async fn new_link(&self, req: NewLinkRequest) -> LifecycleResult<NewLink> {
        if req.sid.is_empty() {
            return Err(LifecycleError::missing_data());
        }
        let mut session = self
            .records
            .load_session(&req.sid)
            .await?
            .ok_or(LifecycleError::NotFound(SESSION_EXPIRED))?;

        let share_id = self.links.generate().await?;
        let share = SoloShare::new(share_id, session.id(), session.expire(), req.ado == "1");
        self.records.save_solo_share(&share).await?;

        session.add_target(share.id());
        if let Err(e) = self.records.save_session(&session).await {
            tracing::error!(
                session_id = short_id(session.id()),
                share_id = %share.id(),
                error = %e,
                "Share written but session write failed; share is orphaned"
            );
            return Err(e.into());
        }

        tracing::info!(
            session_id = short_id(session.id()),
            share_id = %share.id(),
            "New link created"
        );
        Ok(NewLink {
            view_link: view_link(&self.public_url, share.id()),
            share_id: share.id().to_string(),
        })
    }
}
