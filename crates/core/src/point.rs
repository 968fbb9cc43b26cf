//! Location points and their positional wire encoding.
//!
//! Points are stored and served as JSON arrays whose layout depends on the
//! session's encryption mode:
//!
//! ```text
//! plaintext: [lat, lon, time, provider, accuracy|null, speed|null]
//! encrypted: [iv, lat, lon, time, provider|null, accuracy|null, speed|null]
//! ```
//!
//! In encrypted mode every payload field is an opaque ciphertext string. The
//! [`Point`] enum keeps the two layouts apart so that field access never
//! depends on an array index.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Index of the time field in a plaintext point array.
pub const PLAIN_TIME_INDEX: usize = 2;

/// Index of the time field in an encrypted point array.
pub const ENCRYPTED_TIME_INDEX: usize = 3;

/// Location provider that produced a plaintext fix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Provider {
    /// Satellite fix.
    #[default]
    Fine,
    /// Network (cell/wifi) fix.
    Coarse,
}

impl Provider {
    /// Parse the client flag; only `"1"` selects the coarse provider.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("1") => Self::Coarse,
            _ => Self::Fine,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Fine => 0,
            Self::Coarse => 1,
        }
    }

    fn from_u8(v: u8) -> Self {
        if v == 1 { Self::Coarse } else { Self::Fine }
    }
}

/// A plaintext location fix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "PlainWire", into = "PlainWire")]
pub struct PlainPoint {
    pub lat: f64,
    pub lon: f64,
    /// Fix time in fractional unix seconds.
    pub time: f64,
    pub provider: Provider,
    /// Horizontal accuracy in meters.
    pub accuracy: Option<f64>,
    /// Ground speed in m/s.
    pub speed: Option<f64>,
}

#[derive(Serialize, Deserialize)]
struct PlainWire(f64, f64, f64, u8, Option<f64>, Option<f64>);

impl From<PlainWire> for PlainPoint {
    fn from(w: PlainWire) -> Self {
        Self {
            lat: w.0,
            lon: w.1,
            time: w.2,
            provider: Provider::from_u8(w.3),
            accuracy: w.4,
            speed: w.5,
        }
    }
}

impl From<PlainPoint> for PlainWire {
    fn from(p: PlainPoint) -> Self {
        Self(
            p.lat,
            p.lon,
            p.time,
            p.provider.as_u8(),
            p.accuracy,
            p.speed,
        )
    }
}

impl PlainPoint {
    /// Build a point from raw client fields, validating coordinates.
    ///
    /// Optional fields that fail to parse are dropped rather than rejected.
    pub fn parse(
        lat: &str,
        lon: &str,
        time: &str,
        provider: Option<&str>,
        accuracy: Option<&str>,
        speed: Option<&str>,
    ) -> Result<Self> {
        let parse = |field: &str| {
            field
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
        };
        let (Some(lat), Some(lon), Some(time)) = (parse(lat), parse(lon), parse(time)) else {
            return Err(Error::InvalidLocation(
                "coordinates and time must be numbers".to_string(),
            ));
        };
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(Error::InvalidLocation(format!(
                "coordinates out of range: {lat}, {lon}"
            )));
        }

        Ok(Self {
            lat,
            lon,
            time,
            provider: Provider::from_flag(provider),
            accuracy: accuracy.and_then(parse),
            speed: speed.and_then(parse),
        })
    }
}

/// An end-to-end encrypted location fix; the server never sees plaintext.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "EncryptedWire", into = "EncryptedWire")]
pub struct EncryptedPoint {
    /// Initialization vector used by the client for this point.
    pub iv: String,
    pub lat: String,
    pub lon: String,
    pub time: String,
    pub provider: Option<String>,
    pub accuracy: Option<String>,
    pub speed: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct EncryptedWire(
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

impl From<EncryptedWire> for EncryptedPoint {
    fn from(w: EncryptedWire) -> Self {
        Self {
            iv: w.0,
            lat: w.1,
            lon: w.2,
            time: w.3,
            provider: w.4,
            accuracy: w.5,
            speed: w.6,
        }
    }
}

impl From<EncryptedPoint> for EncryptedWire {
    fn from(p: EncryptedPoint) -> Self {
        Self(p.iv, p.lat, p.lon, p.time, p.provider, p.accuracy, p.speed)
    }
}

impl EncryptedPoint {
    /// Build an encrypted point; the IV is mandatory, empty optionals are dropped.
    pub fn new(
        iv: &str,
        lat: &str,
        lon: &str,
        time: &str,
        provider: Option<&str>,
        accuracy: Option<&str>,
        speed: Option<&str>,
    ) -> Result<Self> {
        if iv.is_empty() {
            return Err(Error::MissingPointField("iv"));
        }
        let opt = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_string);
        Ok(Self {
            iv: iv.to_string(),
            lat: lat.to_string(),
            lon: lon.to_string(),
            time: time.to_string(),
            provider: opt(provider),
            accuracy: opt(accuracy),
            speed: opt(speed),
        })
    }
}

/// A buffered point in either encoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Point {
    Plain(PlainPoint),
    Encrypted(EncryptedPoint),
}

impl Point {
    /// Numeric value of the time field. Encrypted times are ciphertext and
    /// never compare, even when they look like a number.
    pub fn time(&self) -> Option<f64> {
        match self {
            Self::Plain(p) => Some(p.time),
            Self::Encrypted(_) => None,
        }
    }

    /// Position of the time field in this point's wire array.
    pub fn time_index(&self) -> usize {
        match self {
            Self::Plain(_) => PLAIN_TIME_INDEX,
            Self::Encrypted(_) => ENCRYPTED_TIME_INDEX,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted(_))
    }
}

impl From<PlainPoint> for Point {
    fn from(p: PlainPoint) -> Self {
        Self::Plain(p)
    }
}

impl From<EncryptedPoint> for Point {
    fn from(p: EncryptedPoint) -> Self {
        Self::Encrypted(p)
    }
}
