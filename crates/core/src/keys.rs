//! Store key namespaces.
//!
//! Both share kinds live under the same `locdata-` namespace so that a share
//! id resolves without knowing its kind up front.

pub const SESSION_PREFIX: &str = "session-";
pub const SHARE_PREFIX: &str = "locdata-";
pub const GROUP_PIN_PREFIX: &str = "groupid-";

pub fn session(id: &str) -> String {
    format!("{SESSION_PREFIX}{id}")
}

pub fn share(id: &str) -> String {
    format!("{SHARE_PREFIX}{id}")
}

pub fn group_pin(pin: u32) -> String {
    format!("{GROUP_PIN_PREFIX}{pin}")
}
