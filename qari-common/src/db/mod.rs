//! Database initialization

pub mod init;

pub use init::{init_database, ensure_setting};
