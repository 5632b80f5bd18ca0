//! Playback session state
//!
//! A session is the live association between one surah, one reciter and
//! at most one engine handle. The controller owns the only instance.

use crate::playback::engine::EngineHandle;
use qari_common::models::Surah;

pub use qari_common::events::{PlaybackErrorKind, SessionSnapshot, SessionStatus};

/// Live session owned by the controller
#[derive(Debug, Clone)]
pub struct Session {
    /// Distinguishes this session from every earlier one
    pub(crate) generation: u64,
    pub(crate) surah: Surah,
    /// Fixed at creation; later reciter changes start a new session
    pub(crate) reciter_id: String,
    /// None once released (error) or when the engine was never reached
    pub(crate) handle: Option<EngineHandle>,
    pub(crate) status: SessionStatus,
    pub(crate) position_ms: u64,
    /// Set once on `Loaded`
    pub(crate) duration_ms: u64,
    pub(crate) last_error: Option<PlaybackErrorKind>,
}

impl Session {
    pub(crate) fn new(generation: u64, surah: Surah, reciter_id: &str) -> Self {
        Self {
            generation,
            surah,
            reciter_id: reciter_id.to_string(),
            handle: None,
            status: SessionStatus::Idle,
            position_ms: 0,
            duration_ms: 0,
            last_error: None,
        }
    }

    pub fn surah(&self) -> &Surah {
        &self.surah
    }

    pub fn reciter_id(&self) -> &str {
        &self.reciter_id
    }

    pub fn handle(&self) -> Option<EngineHandle> {
        self.handle
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            generation: self.generation,
            surah: self.surah.clone(),
            reciter_id: self.reciter_id.clone(),
            status: self.status,
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            last_error: self.last_error,
        }
    }

    /// Clamp a requested position into `[0, duration_ms]`
    ///
    /// A duration of 0 means the engine could not determine it; only the
    /// lower bound applies then.
    pub(crate) fn clamp_position(&self, position_ms: i64) -> u64 {
        let position_ms = position_ms.max(0) as u64;
        if self.duration_ms > 0 {
            position_ms.min(self.duration_ms)
        } else {
            position_ms
        }
    }
}
