//! Error types for qari-ap
//!
//! Module-level error type using thiserror. Playback failures inside a
//! session are not errors at this level: the controller records them on
//! the session snapshot instead.

use thiserror::Error;

/// Main error type for qari-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Errors surfaced from qari-common
    #[error(transparent)]
    Common(#[from] qari_common::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Metadata provider (surah/reciter API) errors
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Session service errors (dispatch task gone)
    #[error("Playback error: {0}")]
    Playback(String),

    /// Surah, reciter or setting not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using qari-ap Error
pub type Result<T> = std::result::Result<T, Error>;
