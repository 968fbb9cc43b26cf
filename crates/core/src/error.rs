//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("missing point field: {0}")]
    MissingPointField(&'static str),

    #[error("invalid link id: {0}")]
    InvalidLinkId(String),

    #[error("invalid group pin: {0}")]
    InvalidPin(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
