//! Point ingestion.

use super::error::{INVALID_LOCATION, LifecycleError, LifecycleResult, SESSION_EXPIRED};
use super::{Lifecycle, non_empty};
use beacon_core::{EncryptedPoint, PlainPoint, Point};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostRequest {
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub lat: String,
    #[serde(default)]
    pub lon: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub prv: String,
    #[serde(default)]
    pub acc: String,
    #[serde(default)]
    pub spd: String,
    #[serde(default)]
    pub iv: String,
}

/// Accepted point; tells the client where its shares can be viewed.
#[derive(Debug, Clone)]
pub struct Posted {
    /// Viewer URL with `%s` standing in for a share id.
    pub view_template: String,
    pub targets: Vec<String>,
}

impl Posted {
    pub fn lines(&self) -> Vec<String> {
        vec![self.view_template.clone(), self.targets.join(",")]
    }
}

impl Lifecycle {
    /// Append a point to a live session.
    pub async fn post(&self, req: PostRequest) -> LifecycleResult<Posted> {
        if req.sid.is_empty() || req.lat.is_empty() || req.lon.is_empty() || req.time.is_empty()
        {
            return Err(LifecycleError::missing_data());
        }

        let mut session = self
            .records
            .load_session(&req.sid)
            .await?
            .ok_or(LifecycleError::NotFound(SESSION_EXPIRED))?;
        if session.has_expired() {
            return Err(LifecycleError::NotFound(SESSION_EXPIRED));
        }

        let point: Point = if session.is_encrypted() {
            EncryptedPoint::new(
                &req.iv,
                &req.lat,
                &req.lon,
                &req.time,
                non_empty(&req.prv),
                non_empty(&req.acc),
                non_empty(&req.spd),
            )
            .map_err(|_| LifecycleError::missing_data())?
            .into()
        } else {
            PlainPoint::parse(
                &req.lat,
                &req.lon,
                &req.time,
                non_empty(&req.prv),
                non_empty(&req.acc),
                non_empty(&req.spd),
            )
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected point");
                LifecycleError::validation(INVALID_LOCATION)
            })?
            .into()
        };

        session.add_point(point);
        self.records.save_session(&session).await?;

        Ok(Posted {
            view_template: format!("{}?%s", self.public_url),
            targets: session.targets().to_vec(),
        })
    }
}
