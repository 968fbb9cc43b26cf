//! Ending a share or a whole session. Always reports success to the caller.

use super::error::LifecycleResult;
use super::{Lifecycle, short_id};
use beacon_core::{Session, ShareKind};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopRequest {
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub lid: String,
}

impl Lifecycle {
    /// Detach one target, or with no `lid` every target and the session
    /// itself.
    ///
    /// Unknown sessions and targets the session does not feed are no-ops.
    /// Only store failures are errors.
    pub async fn stop(&self, req: StopRequest) -> LifecycleResult<()> {
        if req.sid.is_empty() {
            return Ok(());
        }
        let Some(mut session) = self.records.load_session(&req.sid).await? else {
            return Ok(());
        };

        if !req.lid.is_empty() {
            if !session.has_target(&req.lid) {
                return Ok(());
            }
            self.detach(&session, &req.lid).await?;
            session.remove_target(&req.lid);
            self.records.save_session(&session).await?;
            tracing::info!(
                session_id = short_id(session.id()),
                share_id = %req.lid,
                "Share stopped"
            );
        } else {
            for target in session.targets() {
                self.detach(&session, target).await?;
            }
            self.records.delete_session(session.id()).await?;
            tracing::info!(
                session_id = short_id(session.id()),
                targets = session.targets().len(),
                "Session stopped"
            );
        }
        Ok(())
    }

    /// Remove `session` from the share `share_id`. A solo share is deleted; a
    /// group loses the session's host entry and is deleted once empty.
    async fn detach(&self, session: &Session, share_id: &str) -> LifecycleResult<()> {
        match self.records.load_share_kind(share_id).await? {
            Some(ShareKind::Solo) => {
                if self.records.load_solo_share(share_id).await?.is_some() {
                    self.records.delete_solo_share(share_id).await?;
                }
            }
            Some(ShareKind::Group) => {
                let Some(mut share) = self.records.load_group_share(share_id).await? else {
                    return Ok(());
                };
                share.remove_host_by_session(session.id());
                if share.is_empty() {
                    self.records.delete_group_share(&share).await?;
                    tracing::debug!(share_id = %share_id, "Last host left, group removed");
                } else {
                    self.records.save_group_share(&share).await?;
                }
            }
            None => {}
        }
        Ok(())
    }
}
