//! Location sessions: the authoritative per-device record.

use crate::point::Point;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use time::OffsetDateTime;

/// Number of random bytes in a session id (hex-encoded to twice as many chars).
pub const SESSION_ID_BYTES: usize = 32;

/// Generate a new unguessable session id.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A device's sharing session.
///
/// Serializes to the stored record layout; the id and buffer capacity are not
/// part of the record and are re-attached with [`Session::restore`] on load.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    #[serde(skip)]
    id: String,
    /// Absolute expiration; doubles as the store TTL.
    #[serde(with = "time::serde::timestamp")]
    expire: OffsetDateTime,
    /// Seconds between points.
    interval: f64,
    /// Share ids this session feeds, in append order.
    #[serde(default)]
    targets: Vec<String>,
    /// Most recent points, oldest first.
    #[serde(default)]
    points: VecDeque<Point>,
    #[serde(default)]
    encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    salt: Option<String>,
    #[serde(skip)]
    max_points: usize,
}

impl Session {
    /// Create a session with a fresh id.
    ///
    /// Passing a salt puts the session in end-to-end encrypted mode.
    pub fn new(
        interval: f64,
        expire: OffsetDateTime,
        salt: Option<String>,
        max_points: usize,
    ) -> Self {
        Self {
            id: generate_session_id(),
            expire,
            interval,
            targets: Vec::new(),
            points: VecDeque::new(),
            encrypted: salt.is_some(),
            salt,
            max_points,
        }
    }

    /// Re-attach the id and buffer capacity after decoding a stored record.
    ///
    /// A buffer larger than the current capacity keeps only its newest points.
    pub fn restore(mut self, id: impl Into<String>, max_points: usize) -> Self {
        self.id = id.into();
        self.max_points = max_points;
        self.trim();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expire(&self) -> OffsetDateTime {
        self.expire
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn points(&self) -> impl ExactSizeIterator<Item = &Point> {
        self.points.iter()
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Salt used by viewers to derive the decryption key.
    pub fn salt(&self) -> Option<&str> {
        self.salt.as_deref()
    }

    /// Append a point, evicting the oldest ones beyond capacity.
    pub fn add_point(&mut self, point: impl Into<Point>) {
        self.points.push_back(point.into());
        self.trim();
    }

    /// Points with a time strictly after `since`, or the whole buffer when
    /// `since <= 0`. Encrypted points have no comparable time and are only
    /// returned with the whole buffer.
    pub fn points_since(&self, since: f64) -> Vec<Point> {
        if since <= 0.0 {
            return self.points.iter().cloned().collect();
        }
        self.points
            .iter()
            .filter(|p| p.time().is_some_and(|t| t > since))
            .cloned()
            .collect()
    }

    /// Record a share this session feeds. Duplicates are kept.
    pub fn add_target(&mut self, share_id: impl Into<String>) {
        self.targets.push(share_id.into());
    }

    /// Remove the first occurrence of `share_id`. Returns whether one was found.
    pub fn remove_target(&mut self, share_id: &str) -> bool {
        match self.targets.iter().position(|t| t == share_id) {
            Some(idx) => {
                self.targets.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn has_target(&self, share_id: &str) -> bool {
        self.targets.iter().any(|t| t == share_id)
    }

    pub fn has_expired(&self) -> bool {
        self.has_expired_at(OffsetDateTime::now_utc())
    }

    pub fn has_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expire
    }

    fn trim(&mut self) {
        while self.points.len() > self.max_points {
            self.points.pop_front();
        }
    }
}
