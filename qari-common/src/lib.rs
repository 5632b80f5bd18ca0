//! # Qari Common Library
//!
//! Shared code for the Qari recitation player services:
//! - Surah and reciter models
//! - Event types (QariEvent enum) and the broadcast bus
//! - Bootstrap configuration loading
//! - SQLite database initialization

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
pub use models::{Reciter, Surah, SURAH_COUNT};
