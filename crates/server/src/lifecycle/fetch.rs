//! Read path for viewers.

use super::error::{INVALID_SESSION, LifecycleError, LifecycleResult};
use super::Lifecycle;
use beacon_core::{Point, ShareKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchQuery {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub since: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SoloView {
    #[serde(rename = "type")]
    pub kind: ShareKind,
    pub expire: i64,
    #[serde(rename = "serverTime")]
    pub server_time: f64,
    pub interval: f64,
    pub points: Vec<Point>,
    pub encrypted: bool,
    /// Empty for plaintext sessions.
    pub salt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupView {
    #[serde(rename = "type")]
    pub kind: ShareKind,
    pub expire: i64,
    #[serde(rename = "serverTime")]
    pub server_time: f64,
    /// Fastest reporting interval among resolvable hosts, 0 if none resolve.
    pub interval: f64,
    /// Points per nickname; hosts whose session is gone are left out.
    pub points: BTreeMap<String, Vec<Point>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ShareView {
    Solo(SoloView),
    Group(GroupView),
}

impl ShareView {
    pub fn kind(&self) -> ShareKind {
        match self {
            Self::Solo(v) => v.kind,
            Self::Group(v) => v.kind,
        }
    }
}

fn server_time(now: OffsetDateTime) -> f64 {
    now.unix_timestamp_nanos() as f64 / 1e9
}

impl Lifecycle {
    /// Resolve a share and collect the points newer than `since`.
    pub async fn fetch(&self, query: FetchQuery) -> LifecycleResult<ShareView> {
        let not_found = || LifecycleError::NotFound(INVALID_SESSION);
        if query.id.is_empty() {
            return Err(not_found());
        }
        let since = query.since.trim().parse::<f64>().unwrap_or(0.0);
        let kind = self
            .records
            .load_share_kind(&query.id)
            .await?
            .ok_or_else(not_found)?;

        match kind {
            ShareKind::Solo => {
                let share = self
                    .records
                    .load_solo_share(&query.id)
                    .await?
                    .ok_or_else(not_found)?;
                let session = self
                    .records
                    .load_session(&share.host)
                    .await?
                    .ok_or_else(not_found)?;

                Ok(ShareView::Solo(SoloView {
                    kind: ShareKind::Solo,
                    expire: share.expire.unix_timestamp(),
                    server_time: server_time(OffsetDateTime::now_utc()),
                    interval: session.interval(),
                    points: session.points_since(since),
                    encrypted: session.is_encrypted(),
                    salt: session.salt().unwrap_or_default().to_string(),
                }))
            }
            ShareKind::Group => {
                let share = self
                    .records
                    .load_group_share(&query.id)
                    .await?
                    .ok_or_else(not_found)?;

                let mut points = BTreeMap::new();
                let mut interval: Option<f64> = None;
                for (nickname, session_id) in share.hosts() {
                    let Some(session) = self.records.load_session(session_id).await? else {
                        continue;
                    };
                    interval = Some(interval.map_or(session.interval(), |i| i.min(session.interval())));
                    points.insert(nickname.clone(), session.points_since(since));
                }

                Ok(ShareView::Group(GroupView {
                    kind: ShareKind::Group,
                    expire: share.expire.unix_timestamp(),
                    server_time: server_time(OffsetDateTime::now_utc()),
                    interval: interval.unwrap_or(0.0),
                    points,
                }))
            }
        }
    }
}
