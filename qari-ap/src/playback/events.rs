//! Internal engine events (not exposed via SSE)
//!
//! Emitted asynchronously by a [`PlaybackEngine`] and consumed by the
//! session service, which hands them to the controller. The controller
//! converts the relevant ones into `QariEvent`s for clients.
//!
//! [`PlaybackEngine`]: crate::playback::engine::PlaybackEngine

use crate::playback::engine::{EngineError, EngineHandle};
use tokio::sync::mpsc;

/// Periodic or edge-triggered status report for one handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusUpdate {
    pub position_ms: u64,
    pub duration_ms: u64,
    pub is_playing: bool,
    pub did_finish: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEventKind {
    /// Stream probed and ready to play
    Loaded { duration_ms: u64 },

    /// Stream could not be opened or probed
    LoadFailed(EngineError),

    Status(StatusUpdate),

    /// Fault after a successful load
    Error(EngineError),
}

/// Event from the engine about one handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    pub handle: EngineHandle,
    pub kind: EngineEventKind,
}

impl EngineEvent {
    pub fn new(handle: EngineHandle, kind: EngineEventKind) -> Self {
        Self { handle, kind }
    }
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Channel carrying engine events to the session service
pub fn engine_event_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}
