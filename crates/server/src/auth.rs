//! Credential checks for session creation.
//!
//! Two methods are supported: a single shared bcrypt password, and an
//! Apache-style htpasswd file with bcrypt entries. Bcrypt verification runs
//! on the blocking pool so slow hashes do not stall the runtime.

use async_trait::async_trait;
use beacon_core::config::AuthConfig;
use std::path::PathBuf;
use std::sync::Arc;

/// Authentication failure.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("failed to read credential file {path}: {source}")]
    CredentialFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credential check failed: {0}")]
    Internal(String),
}

/// Decides whether a user/password pair may create sessions.
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    async fn authenticate(&self, user: &str, password: &str) -> Result<(), AuthError>;

    /// Method name for logs.
    fn method(&self) -> &'static str;
}

/// Build the configured authenticator.
pub fn from_config(config: &AuthConfig) -> Arc<dyn Authenticator> {
    match config {
        AuthConfig::Password { hash } => Arc::new(PasswordAuth::new(hash.clone())),
        AuthConfig::Htpasswd { path } => Arc::new(HtpasswdAuth::new(path.clone())),
    }
}

/// Shared password; the user name is ignored.
pub struct PasswordAuth {
    hash: String,
}

impl PasswordAuth {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }
}

#[async_trait]
impl Authenticator for PasswordAuth {
    async fn authenticate(&self, _user: &str, password: &str) -> Result<(), AuthError> {
        if self.hash.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        verify_bcrypt(password.to_string(), self.hash.clone()).await
    }

    fn method(&self) -> &'static str {
        "password"
    }
}

/// `user:hash` lines, re-read on every attempt so edits apply without a
/// restart.
pub struct HtpasswdAuth {
    path: PathBuf,
}

impl HtpasswdAuth {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Hash for `user` from htpasswd `contents`. The first matching line wins.
fn find_entry<'a>(contents: &'a str, user: &str) -> Option<&'a str> {
    contents
        .lines()
        .map(str::trim)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| *name == user)
        .map(|(_, hash)| hash)
}

#[async_trait]
impl Authenticator for HtpasswdAuth {
    async fn authenticate(&self, user: &str, password: &str) -> Result<(), AuthError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| AuthError::CredentialFile {
                path: self.path.clone(),
                source,
            })?;

        let Some(hash) = find_entry(&contents, user) else {
            return Err(AuthError::InvalidCredentials);
        };
        verify_bcrypt(password.to_string(), hash.to_string()).await
    }

    fn method(&self) -> &'static str {
        "htpasswd"
    }
}

async fn verify_bcrypt(password: String, hash: String) -> Result<(), AuthError> {
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?;

    match verified {
        Ok(true) => Ok(()),
        Ok(false) => Err(AuthError::InvalidCredentials),
        Err(e) => {
            // Malformed hash in configuration; nobody can log in with it.
            tracing::warn!(error = %e, "Stored bcrypt hash could not be parsed");
            Err(AuthError::InvalidCredentials)
        }
    }
}
