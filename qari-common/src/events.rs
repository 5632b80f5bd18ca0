//! Event types for the Qari event system
//!
//! Session snapshots and playback status types live here so that every
//! consumer of the event stream (SSE clients, tests, other services) shares
//! one serialized shape.

use crate::models::Surah;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Playback session status
///
/// `Idle` is reported when no session exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Stopped,
    Error,
}

impl SessionStatus {
    /// Statuses in which the engine holds a loaded stream that can be
    /// played, paused or seeked
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionStatus::Ready | SessionStatus::Playing | SessionStatus::Paused
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Loading => "loading",
            SessionStatus::Ready => "ready",
            SessionStatus::Playing => "playing",
            SessionStatus::Paused => "paused",
            SessionStatus::Stopped => "stopped",
            SessionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Classification of a session failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackErrorKind {
    /// Reciter has no audio for this surah; never reaches the engine
    UnsupportedReciter,
    /// Remote audio resource missing
    NotFound,
    /// Transient connectivity failure
    NetworkFailure,
    /// Any other engine fault, including mid-playback failures
    EngineFailure,
}

impl std::fmt::Display for PlaybackErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlaybackErrorKind::UnsupportedReciter => "unsupported reciter",
            PlaybackErrorKind::NotFound => "audio not found",
            PlaybackErrorKind::NetworkFailure => "network failure",
            PlaybackErrorKind::EngineFailure => "playback engine failure",
        };
        f.write_str(s)
    }
}

/// Read-only view of the live session, as rendered by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Increases with every new session, including re-selection of the
    /// same surah
    #[serde(default)]
    pub generation: u64,
    pub surah: Surah,
    pub reciter_id: String,
    pub status: SessionStatus,
    pub position_ms: u64,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<PlaybackErrorKind>,
}

/// Qari event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QariEvent {
    /// Session created, transitioned, moved, or torn down (`session: None`)
    SessionChanged {
        session: Option<SessionSnapshot>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Selected reciter persisted in settings
    ReciterChanged {
        identifier: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session entered the error state
    ///
    /// Clients show a dismissible notice naming `kind`; re-selecting the
    /// surah is the only recovery path.
    PlaybackError {
        kind: PlaybackErrorKind,
        surah: u16,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl QariEvent {
    /// SSE `event:` field for this event
    pub fn event_type(&self) -> &'static str {
        match self {
            QariEvent::SessionChanged { .. } => "SessionChanged",
            QariEvent::ReciterChanged { .. } => "ReciterChanged",
            QariEvent::PlaybackError { .. } => "PlaybackError",
        }
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::sync::broadcast`: publishing never blocks, slow
/// subscribers observe `Lagged` instead of stalling producers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<QariEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<QariEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; `Err` when nobody is subscribed
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: QariEvent,
    ) -> Result<usize, broadcast::error::SendError<QariEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: QariEvent) {
        if let Err(err) = self.tx.send(event) {
            trace!("No subscribers for {}", err.0.event_type());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
