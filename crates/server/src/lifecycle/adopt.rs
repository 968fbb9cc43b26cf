//! Moving an adoptable solo share's host into a group.

use super::error::{INVALID_PIN, LifecycleError, LifecycleResult, SESSION_EXPIRED, SHARE_NOT_FOUND};
use super::{Lifecycle, short_id};
use beacon_core::ShareKind;
use beacon_core::share::parse_pin;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdoptRequest {
    /// Caller's session.
    #[serde(default)]
    pub sid: String,
    /// Nickname the adopted host gets in the group.
    #[serde(default)]
    pub nic: String,
    /// Solo share to adopt.
    #[serde(default)]
    pub aid: String,
    /// Target group PIN.
    #[serde(default)]
    pub pin: String,
}

impl Lifecycle {
    /// Add the host of solo share `aid` to the group behind `pin`.
    ///
    /// Every precondition is checked before anything is written. The solo
    /// share itself is left in place.
    pub async fn adopt(&self, req: AdoptRequest) -> LifecycleResult<()> {
        if req.sid.is_empty() || req.nic.is_empty() || req.aid.is_empty() || req.pin.is_empty() {
            return Err(LifecycleError::missing_data());
        }

        let mut session = self
            .records
            .load_session(&req.sid)
            .await?
            .ok_or(LifecycleError::NotFound(SESSION_EXPIRED))?;

        match self.records.load_share_kind(&req.aid).await? {
            None => return Err(LifecycleError::NotFound(SHARE_NOT_FOUND)),
            Some(ShareKind::Group) => {
                return Err(LifecycleError::validation("Group shares cannot be adopted!"));
            }
            Some(ShareKind::Solo) => {}
        }
        let share = self
            .records
            .load_solo_share(&req.aid)
            .await?
            .ok_or(LifecycleError::NotFound(SHARE_NOT_FOUND))?;

        if !share.adoptable {
            return Err(LifecycleError::authorization("Share adoption not allowed!"));
        }
        if share.host != session.id() {
            tracing::warn!(
                session_id = short_id(session.id()),
                share_id = %share.id(),
                "Adoption attempted by a session that does not host the share"
            );
            return Err(LifecycleError::authorization("Not authorized!"));
        }
        if session.is_encrypted() {
            return Err(LifecycleError::authorization(
                "End-to-end encrypted shares cannot be adopted!",
            ));
        }

        let pin = parse_pin(&req.pin).map_err(|_| LifecycleError::NotFound(INVALID_PIN))?;
        let mut group = self
            .records
            .load_group_by_pin(pin)
            .await?
            .ok_or(LifecycleError::NotFound(INVALID_PIN))?;

        group.add_host(req.nic.as_str(), share.host.as_str());
        self.records.save_group_share(&group).await?;

        session.add_target(group.id());
        if let Err(e) = self.records.save_session(&session).await {
            tracing::error!(
                session_id = short_id(session.id()),
                share_id = %group.id(),
                error = %e,
                "Host added to group but session write failed"
            );
            return Err(e.into());
        }

        tracing::info!(
            session_id = short_id(session.id()),
            solo_share_id = %share.id(),
            group_share_id = %group.id(),
            nickname = %req.nic,
            "Share adopted into group"
        );
        Ok(())
    }
}
