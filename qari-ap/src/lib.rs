//! # Qari Audio Player Library (qari-ap)
//!
//! Streams per-surah recitations and exposes one playback session at a time
//! over HTTP/SSE.
//!
//! **Architecture:** a synchronous session controller (state machine) driven
//! from a single dispatch task, fed by user commands and by status events
//! from a streaming engine built on symphonia + rubato + cpal.

pub mod api;
pub mod audio;
pub mod config;
pub mod db;
pub mod error;
pub mod metadata;
pub mod playback;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
