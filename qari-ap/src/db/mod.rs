//! Database access layer
//!
//! Settings persistence on the shared SQLite pool.

pub mod init;
pub mod settings;
