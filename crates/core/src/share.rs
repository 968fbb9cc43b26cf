//! Share records: the viewer-facing side of a session.
//!
//! A share is addressed by an external link id. Solo shares follow exactly one
//! host session; group shares merge several hosts keyed by nickname and are
//! also reachable through a six-digit PIN.

use crate::error::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Smallest group PIN.
pub const PIN_MIN: u32 = 100_000;

/// Largest group PIN.
pub const PIN_MAX: u32 = 999_999;

/// Discriminant stored in the `type` field of every share record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ShareKind {
    Solo,
    Group,
}

impl ShareKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Solo => "solo",
            Self::Group => "group",
        }
    }
}

impl TryFrom<u8> for ShareKind {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Solo),
            1 => Ok(Self::Group),
            other => Err(format!("unknown share type {other}")),
        }
    }
}

impl From<ShareKind> for u8 {
    fn from(kind: ShareKind) -> Self {
        match kind {
            ShareKind::Solo => 0,
            ShareKind::Group => 1,
        }
    }
}

/// Type-only view of a share record, decodable from either kind.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct ShareHeader {
    #[serde(rename = "type")]
    pub kind: ShareKind,
}

/// A share that follows a single host session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SoloShare {
    #[serde(skip)]
    id: String,
    #[serde(rename = "type")]
    kind: ShareKind,
    #[serde(with = "time::serde::timestamp")]
    pub expire: OffsetDateTime,
    /// Session id of the device being followed.
    pub host: String,
    /// Whether this share may be adopted into a group.
    pub adoptable: bool,
}

impl SoloShare {
    pub fn new(
        id: impl Into<String>,
        host: impl Into<String>,
        expire: OffsetDateTime,
        adoptable: bool,
    ) -> Self {
        Self {
            id: id.into(),
            kind: ShareKind::Solo,
            expire,
            host: host.into(),
            adoptable,
        }
    }

    /// Attach the link id after decoding a stored record.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Kind as stored; a record decoded from a group share reports `Group`.
    pub fn kind(&self) -> ShareKind {
        self.kind
    }
}

/// A share merging several hosts, keyed by nickname.
///
/// Nicknames are unique: adding an existing nickname repoints it to the new
/// session. Hosts iterate in nickname order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupShare {
    #[serde(skip)]
    id: String,
    #[serde(rename = "type")]
    kind: ShareKind,
    #[serde(with = "time::serde::timestamp")]
    pub expire: OffsetDateTime,
    #[serde(default)]
    hosts: BTreeMap<String, String>,
    #[serde(rename = "groupPin")]
    pin: u32,
}

impl GroupShare {
    pub fn new(id: impl Into<String>, expire: OffsetDateTime, pin: u32) -> Self {
        Self {
            id: id.into(),
            kind: ShareKind::Group,
            expire,
            hosts: BTreeMap::new(),
            pin,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ShareKind {
        self.kind
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// Nickname to session id.
    pub fn hosts(&self) -> &BTreeMap<String, String> {
        &self.hosts
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Map `nickname` to `session_id`, returning the session it previously
    /// pointed at.
    pub fn add_host(
        &mut self,
        nickname: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Option<String> {
        self.hosts.insert(nickname.into(), session_id.into())
    }

    /// Remove the first nickname mapped to `session_id`.
    ///
    /// If the session holds several nicknames only one of them goes away.
    pub fn remove_host_by_session(&mut self, session_id: &str) -> Option<String> {
        let nickname = self
            .hosts
            .iter()
            .find(|(_, sid)| sid.as_str() == session_id)
            .map(|(nick, _)| nick.clone())?;
        self.hosts.remove(&nickname);
        Some(nickname)
    }
}

/// Draw a PIN uniformly from `PIN_MIN..=PIN_MAX`.
pub fn random_pin() -> u32 {
    rand::thread_rng().gen_range(PIN_MIN..=PIN_MAX)
}

/// Parse a client-supplied PIN.
pub fn parse_pin(raw: &str) -> Result<u32> {
    let raw = raw.trim();
    match raw.parse::<u32>() {
        Ok(pin) if (PIN_MIN..=PIN_MAX).contains(&pin) => Ok(pin),
        _ => Err(Error::InvalidPin(raw.to_string())),
    }
}

/// Check that a caller-chosen link id only uses `[A-Za-z0-9_-]`.
pub fn validate_link_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidLinkId(id.to_string()))
    }
}

/// Public viewer URL for a share.
pub fn view_link(public_url: &str, share_id: &str) -> String {
    format!("{public_url}?{share_id}")
}
