//! Playback engine abstraction
//!
//! The controller talks to audio playback only through [`PlaybackEngine`].
//! Every method issues a request and returns without waiting for the audio
//! side to act on it; outcomes arrive later as [`EngineEvent`]s tagged with
//! the handle they concern.
//!
//! [`EngineEvent`]: crate::playback::events::EngineEvent

use qari_common::events::PlaybackErrorKind;
use reqwest::Url;
use thiserror::Error;

/// Opaque identifier of one loaded audio stream
///
/// Handles are never reused by an engine instance, so an event carrying a
/// released handle can always be recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineHandle(pub u64);

impl std::fmt::Display for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Engine failure, classified by cause
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Remote audio resource is missing (HTTP 404/410)
    #[error("Audio not found: {0}")]
    NotFound(String),

    /// Connection, timeout, or truncated transfer
    #[error("Network error: {0}")]
    Network(String),

    /// Anything else: decode failure, output device fault, unknown handle
    #[error("Engine failure: {0}")]
    Failure(String),
}

impl EngineError {
    /// Controller-facing classification
    pub fn kind(&self) -> PlaybackErrorKind {
        match self {
            EngineError::NotFound(_) => PlaybackErrorKind::NotFound,
            EngineError::Network(_) => PlaybackErrorKind::NetworkFailure,
            EngineError::Failure(_) => PlaybackErrorKind::EngineFailure,
        }
    }
}

/// Streaming audio player
///
/// Implementations must tolerate `stop`/`release` on handles that already
/// failed, and must not emit events for a handle after `release` returns.
pub trait PlaybackEngine: Send {
    /// Begin loading `url`; completion is reported as `Loaded` or `LoadFailed`
    fn create(&mut self, url: &Url) -> Result<EngineHandle, EngineError>;

    fn play(&mut self, handle: EngineHandle) -> Result<(), EngineError>;

    fn pause(&mut self, handle: EngineHandle) -> Result<(), EngineError>;

    /// Halt output and rewind; the stream stays loaded
    fn stop(&mut self, handle: EngineHandle) -> Result<(), EngineError>;

    fn seek(&mut self, handle: EngineHandle, position_ms: u64) -> Result<(), EngineError>;

    /// Free every resource held for `handle`
    fn release(&mut self, handle: EngineHandle) -> Result<(), EngineError>;
}

impl<E: PlaybackEngine + ?Sized> PlaybackEngine for Box<E> {
    fn create(&mut self, url: &Url) -> Result<EngineHandle, EngineError> {
        (**self).create(url)
    }

    fn play(&mut self, handle: EngineHandle) -> Result<(), EngineError> {
        (**self).play(handle)
    }

    fn pause(&mut self, handle: EngineHandle) -> Result<(), EngineError> {
        (**self).pause(handle)
    }

    fn stop(&mut self, handle: EngineHandle) -> Result<(), EngineError> {
        (**self).stop(handle)
    }

    fn seek(&mut self, handle: EngineHandle, position_ms: u64) -> Result<(), EngineError> {
        (**self).seek(handle, position_ms)
    }

    fn release(&mut self, handle: EngineHandle) -> Result<(), EngineError> {
        (**self).release(handle)
    }
}
