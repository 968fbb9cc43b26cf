//! Application state shared across handlers.

use crate::auth::Authenticator;
use crate::lifecycle::Lifecycle;
use crate::ratelimit::RateLimitState;
use beacon_core::config::AppConfig;
use beacon_storage::{KvStore, RecordStore};
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Raw store, used for health checks.
    pub store: Arc<dyn KvStore>,
    /// Session and share operations.
    pub lifecycle: Lifecycle,
    /// Rate limiting state.
    pub rate_limit: RateLimitState,
}

impl AppState {
    /// Create a new application state.
    ///
    /// This performs configuration validation and logs warnings for
    /// settings that work but are probably not intended.
    ///
    /// # Panics
    ///
    /// Panics if configuration validation fails with an error.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn KvStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        match config.validate() {
            Ok(warnings) => {
                for warning in warnings {
                    tracing::warn!("Configuration warning: {}", warning);
                }
            }
            Err(error) => {
                panic!("Invalid configuration: {}", error);
            }
        }

        let records = RecordStore::new(store.clone(), config.limits.max_cached_points);
        let lifecycle = Lifecycle::new(&config, records, authenticator);
        let rate_limit = RateLimitState::new(&config.rate_limit);

        Self {
            config: Arc::new(config),
            store,
            lifecycle,
            rate_limit,
        }
    }

    /// Get the cleanup interval for the rate limiter, if enabled.
    /// Elapsed windows are swept every two windows.
    pub fn rate_limit_cleanup_interval(&self) -> Option<Duration> {
        if self.rate_limit.is_enabled() {
            Some(self.config.rate_limit.window() * 2)
        } else {
            None
        }
    }
}
