//! Core domain types for the beacon location sharing service.
//!
//! This crate defines the data model shared by the storage and server crates:
//! - Location points in plaintext and end-to-end encrypted form
//! - Sessions with their bounded point buffer and share targets
//! - Solo and group shares
//! - Store key namespaces
//! - Configuration

pub mod config;
pub mod error;
pub mod keys;
pub mod point;
pub mod session;
pub mod share;

pub use error::{Error, Result};
pub use point::{EncryptedPoint, PlainPoint, Point, Provider};
pub use session::{Session, generate_session_id};
pub use share::{GroupShare, ShareHeader, ShareKind, SoloShare};
