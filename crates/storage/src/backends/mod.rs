//! Store backends.

pub mod memory;
pub mod redis;
