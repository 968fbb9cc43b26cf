//! Session creation: solo share, new group, or joining a group by PIN.

use super::error::{INVALID_PIN, LifecycleError, LifecycleResult};
use super::{Lifecycle, short_id};
use crate::auth::AuthError;
use beacon_core::share::{parse_pin, random_pin, validate_link_id, view_link};
use beacon_core::{GroupShare, Session, SoloShare};
use beacon_storage::StorageResult;
use serde::Deserialize;
use time::{Duration, OffsetDateTime};

/// How a new session attaches to a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareMode {
    CreateSolo,
    CreateGroup,
    JoinGroup,
}

impl ShareMode {
    /// Parse the `mod` form field. Anything that is not an integer selects a
    /// solo share; integers outside the known modes yield `None`.
    pub fn from_form(raw: &str) -> Option<Self> {
        match raw.parse::<i64>().unwrap_or(0) {
            0 => Some(Self::CreateSolo),
            1 => Some(Self::CreateGroup),
            2 => Some(Self::JoinGroup),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateSolo => "solo",
            Self::CreateGroup => "group",
            Self::JoinGroup => "join",
        }
    }

    fn is_group(self) -> bool {
        matches!(self, Self::CreateGroup | Self::JoinGroup)
    }
}

/// Form fields of a create request. Empty means absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRequest {
    #[serde(default, rename = "dur")]
    pub duration: String,
    #[serde(default, rename = "int")]
    pub interval: String,
    #[serde(default, rename = "usr")]
    pub user: String,
    #[serde(default, rename = "pwd")]
    pub password: String,
    #[serde(default, rename = "mod")]
    pub mode: String,
    #[serde(default, rename = "ado")]
    pub adoptable: String,
    #[serde(default, rename = "e2e")]
    pub encrypted: String,
    #[serde(default)]
    pub salt: String,
    #[serde(default, rename = "lid")]
    pub link_id: String,
    #[serde(default, rename = "nic")]
    pub nickname: String,
    #[serde(default)]
    pub pin: String,
}

/// Result of a successful create.
#[derive(Debug, Clone)]
pub struct Created {
    pub mode: ShareMode,
    pub session_id: String,
    pub share_id: String,
    pub view_link: String,
    /// PIN of a newly created group.
    pub pin: Option<u32>,
}

impl Created {
    /// Response lines after the leading `OK`.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.session_id.clone(), self.view_link.clone()];
        if let Some(pin) = self.pin {
            lines.push(pin.to_string());
        }
        lines.push(self.share_id.clone());
        lines
    }
}

struct Validated {
    mode: ShareMode,
    duration: Duration,
    interval: f64,
    adoptable: bool,
    salt: Option<String>,
}

impl Lifecycle {
    /// Create a session and attach it to a new or existing share.
    ///
    /// The share (with its PIN index for groups) is written before the
    /// session, so a failed second write leaves only an unreferenced share.
    pub async fn create(&self, req: CreateRequest) -> LifecycleResult<Created> {
        let valid = self.validate_create(&req).await?;
        let expire = OffsetDateTime::now_utc() + valid.duration;
        let mut session = Session::new(
            valid.interval,
            expire,
            valid.salt,
            self.records.max_points(),
        );

        let (share_id, pin) = match valid.mode {
            ShareMode::CreateSolo => {
                let id = self.share_id_for(&req.link_id, &req.user).await?;
                let share = SoloShare::new(id, session.id(), expire, valid.adoptable);
                self.records.save_solo_share(&share).await?;
                (share.id().to_string(), None)
            }
            ShareMode::CreateGroup => {
                let id = self.share_id_for(&req.link_id, &req.user).await?;
                let pin = self.allocate_pin().await?;
                let mut share = GroupShare::new(id, expire, pin);
                share.add_host(req.nickname.as_str(), session.id());
                self.records.save_group_share(&share).await?;
                (share.id().to_string(), Some(pin))
            }
            ShareMode::JoinGroup => {
                let pin = parse_pin(&req.pin).map_err(|_| LifecycleError::NotFound(INVALID_PIN))?;
                let mut share = self
                    .records
                    .load_group_by_pin(pin)
                    .await?
                    .ok_or(LifecycleError::NotFound(INVALID_PIN))?;
                if let Some(previous) = share.add_host(req.nickname.as_str(), session.id()) {
                    tracing::debug!(
                        share_id = %share.id(),
                        nickname = %req.nickname,
                        replaced_session = short_id(&previous),
                        "Nickname rejoined group, replacing its session"
                    );
                }
                self.records.save_group_share(&share).await?;
                (share.id().to_string(), None)
            }
        };

        session.add_target(share_id.as_str());
        if let Err(e) = self.records.save_session(&session).await {
            tracing::error!(
                session_id = short_id(session.id()),
                share_id = %share_id,
                error = %e,
                "Share written but session write failed; share is orphaned"
            );
            return Err(e.into());
        }

        tracing::info!(
            session_id = short_id(session.id()),
            share_id = %share_id,
            mode = valid.mode.as_str(),
            "Session created"
        );

        Ok(Created {
            mode: valid.mode,
            session_id: session.id().to_string(),
            view_link: view_link(&self.public_url, &share_id),
            share_id,
            pin,
        })
    }

    async fn validate_create(&self, req: &CreateRequest) -> LifecycleResult<Validated> {
        if req.duration.is_empty() || req.interval.is_empty() {
            return Err(LifecycleError::missing_data());
        }

        match self
            .authenticator
            .authenticate(&req.user, &req.password)
            .await
        {
            Ok(()) => {}
            Err(AuthError::InvalidCredentials) => return Err(LifecycleError::BadCredentials),
            Err(e) => {
                tracing::error!(method = self.authenticator.method(), error = %e, "Credential check failed");
                return Err(LifecycleError::BadCredentials);
            }
        }

        let duration = match req.duration.parse::<i64>() {
            Ok(d) if d > 0 => d,
            _ => return Err(LifecycleError::validation("Invalid duration!")),
        };
        let interval = match req.interval.parse::<f64>() {
            Ok(i) if i > 0.0 && i.is_finite() => i,
            _ => return Err(LifecycleError::validation("Invalid interval!")),
        };

        let max_duration = self.limits.max_duration_secs;
        if u64::try_from(duration).map_or(true, |d| d > max_duration) {
            return Err(LifecycleError::validation(
                "Share duration exceeds maximum configured!",
            ));
        }
        if interval > max_duration as f64 {
            return Err(LifecycleError::validation(
                "Interval exceeds maximum configured!",
            ));
        }
        if interval < self.limits.min_interval_secs {
            return Err(LifecycleError::validation("Interval is too short!"));
        }

        let mode = ShareMode::from_form(&req.mode);
        let encrypted = req.encrypted == "1";
        let is_group = mode.is_some_and(ShareMode::is_group);

        if is_group && encrypted {
            return Err(LifecycleError::validation(
                "End-to-end encryption is not supported for group shares.",
            ));
        }
        if is_group && req.nickname.is_empty() {
            return Err(LifecycleError::missing_data());
        }
        if mode == Some(ShareMode::JoinGroup) && req.pin.parse::<i64>().unwrap_or(0) == 0 {
            return Err(LifecycleError::missing_data());
        }
        if encrypted && req.salt.is_empty() {
            return Err(LifecycleError::missing_data());
        }

        let Some(mode) = mode else {
            return Err(LifecycleError::validation("Unsupported share mode!"));
        };

        Ok(Validated {
            mode,
            duration: Duration::seconds(duration),
            interval,
            adoptable: req.adoptable == "1",
            salt: encrypted.then(|| req.salt.clone()),
        })
    }

    /// Use the caller's custom link id when it is acceptable, otherwise a
    /// generated one. A refused custom id is not an error.
    async fn share_id_for(&self, requested: &str, user: &str) -> StorageResult<String> {
        if !requested.is_empty()
            && validate_link_id(requested).is_ok()
            && self.custom_link_permitted(requested, user)
            && !self.records.share_exists(requested).await?
        {
            return Ok(requested.to_string());
        }
        if !requested.is_empty() {
            tracing::debug!(requested = %requested, "Custom link id refused, generating one");
        }
        self.links.generate().await
    }

    fn custom_link_permitted(&self, link_id: &str, user: &str) -> bool {
        if !self.link_config.allow_custom {
            return false;
        }
        match self.link_config.reserved.get(link_id) {
            Some(users) => users.iter().any(|u| u == user),
            None => !self.link_config.reserved_whitelist,
        }
    }

    /// Draw PINs until one has no live index entry.
    async fn allocate_pin(&self) -> StorageResult<u32> {
        loop {
            let pin = random_pin();
            if !self.records.pin_in_use(pin).await? {
                return Ok(pin);
            }
        }
    }
}
