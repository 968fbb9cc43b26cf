//! Share link id generation.
//!
//! Candidates are drawn in the configured [`LinkStyle`] and checked against the
//! share namespace until an unused one turns up.

use beacon_core::config::LinkStyle;
use beacon_storage::{RecordStore, StorageResult};
use rand::Rng;
use rand::rngs::OsRng;

/// Digits and lowercase letters.
const ALPHA_LOWER: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
/// Mixed case without `0`, `I`, `O`, `l` and `o`.
const ALPHA_MIXED: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
/// Uppercase without `0` and `O`.
const ALPHA_UPPER: &[u8] = b"123456789ABCDEFGHIJKLMNPQRSTUVWXYZ";

/// Produces unused share ids.
#[derive(Clone)]
pub struct LinkGenerator {
    records: RecordStore,
    style: LinkStyle,
}

impl LinkGenerator {
    pub fn new(records: RecordStore, style: LinkStyle) -> Self {
        Self { records, style }
    }

    /// Draw candidates until one is not taken by a live share.
    pub async fn generate(&self) -> StorageResult<String> {
        loop {
            let candidate = candidate(self.style);
            if !self.records.share_exists(&candidate).await? {
                return Ok(candidate);
            }
            tracing::debug!(style = ?self.style, "Link id collision, drawing again");
        }
    }
}

/// Draw one candidate id in `style`.
pub fn candidate(style: LinkStyle) -> String {
    match style {
        LinkStyle::FourPlusFourUpper => four_plus_four(ALPHA_UPPER),
        LinkStyle::FourPlusFourLower => four_plus_four(ALPHA_LOWER),
        LinkStyle::FourPlusFourMixed => four_plus_four(ALPHA_MIXED),
        LinkStyle::UuidV4 => uuid::Uuid::new_v4().to_string(),
        LinkStyle::Hex16 => random_hex(8),
        LinkStyle::Upper16 => random_string(ALPHA_UPPER, 16),
        LinkStyle::Lower16 => random_string(ALPHA_LOWER, 16),
        LinkStyle::Mixed16 => random_string(ALPHA_MIXED, 16),
        LinkStyle::Hex32 => random_hex(16),
        LinkStyle::Upper32 => random_string(ALPHA_UPPER, 32),
        LinkStyle::Lower32 => random_string(ALPHA_LOWER, 32),
        LinkStyle::Mixed32 => random_string(ALPHA_MIXED, 32),
    }
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill(buf.as_mut_slice());
    hex::encode(buf)
}

fn random_string(alphabet: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| char::from(alphabet[OsRng.gen_range(0..alphabet.len())]))
        .collect()
}

fn four_plus_four(alphabet: &[u8]) -> String {
    let s = random_string(alphabet, 8);
    format!("{}-{}", &s[..4], &s[4..])
}
