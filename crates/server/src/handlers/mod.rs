//! HTTP request handlers.

pub mod common;
pub mod health;
pub mod sessions;
pub mod viewer;

pub use common::*;
pub use health::*;
pub use sessions::*;
pub use viewer::*;
