//! HTTP server for the beacon location sharing service.
//!
//! This crate provides:
//! - The session/share lifecycle protocol (create, post, fetch, stop, adopt, new-link)
//! - Share link id generation
//! - Fixed-window rate limiting for create and adopt
//! - Password and htpasswd authentication
//! - The axum router, metrics and the `beacond` binary

pub mod auth;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod linkgen;
pub mod metrics;
pub mod middleware;
pub mod ratelimit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use lifecycle::{Lifecycle, LifecycleError};
pub use middleware::TraceId;
pub use ratelimit::RateLimitState;
pub use routes::create_router;
pub use state::AppState;
