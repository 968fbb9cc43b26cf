//! Failure taxonomy of the lifecycle operations.

use beacon_storage::StorageError;

pub const MISSING_DATA: &str = "Missing data!";
pub const SESSION_EXPIRED: &str = "Session expired!";
pub const INVALID_SESSION: &str = "Invalid session!";
pub const INVALID_PIN: &str = "Invalid group PIN!";
pub const SHARE_NOT_FOUND: &str = "Share not found!";
pub const INVALID_LOCATION: &str = "Invalid location!";

/// Lifecycle operation error.
///
/// The display text of every variant except `Store` and `DeadlineExceeded`
/// is the exact message shown to clients.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Missing or malformed input; nothing was written.
    #[error("{0}")]
    Validation(String),

    #[error("Incorrect password!")]
    BadCredentials,

    /// A session, share or PIN did not resolve. Absence and expiry are
    /// reported the same way.
    #[error("{0}")]
    NotFound(&'static str),

    /// The caller may not perform this operation on the addressed share.
    #[error("{0}")]
    Authorization(String),

    #[error("store error: {0}")]
    Store(#[from] StorageError),

    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

impl LifecycleError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn missing_data() -> Self {
        Self::Validation(MISSING_DATA.to_string())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
