//! Shared playback state
//!
//! Latest session snapshot (watch channel) plus the event bus used for SSE.
//! Only the session service writes the snapshot; handlers read it.

use qari_common::events::{EventBus, QariEvent, SessionSnapshot, SessionStatus};
use tokio::sync::{broadcast, watch};

/// Shared state accessible by all components
pub struct SharedState {
    session_tx: watch::Sender<Option<SessionSnapshot>>,
    event_bus: EventBus,
}

impl SharedState {
    pub fn new() -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            session_tx,
            event_bus: EventBus::new(100),
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: QariEvent) {
        self.event_bus.emit_lossy(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<QariEvent> {
        self.event_bus.subscribe()
    }

    /// Latest published session snapshot
    pub fn current_session(&self) -> Option<SessionSnapshot> {
        self.session_tx.borrow().clone()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<Option<SessionSnapshot>> {
        self.session_tx.subscribe()
    }

    /// Publish a snapshot, broadcasting `SessionChanged` when it differs
    ///
    /// A session entering `Error` additionally broadcasts `PlaybackError`,
    /// once per session generation. Returns whether anything changed.
    pub fn publish_session(&self, snapshot: Option<SessionSnapshot>) -> bool {
        let mut entered_error = None;
        let changed = self.session_tx.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            if let Some(next) = &snapshot {
                let already_reported = current.as_ref().is_some_and(|prev| {
                    prev.generation == next.generation && prev.status == SessionStatus::Error
                });
                if next.status == SessionStatus::Error && !already_reported {
                    entered_error = next.last_error.map(|kind| (kind, next.surah.number));
                }
            }
            *current = snapshot.clone();
            true
        });

        if changed {
            let timestamp = chrono::Utc::now();
            self.broadcast_event(QariEvent::SessionChanged {
                session: snapshot,
                timestamp,
            });
            if let Some((kind, surah)) = entered_error {
                self.broadcast_event(QariEvent::PlaybackError {
                    kind,
                    surah,
                    timestamp,
                });
            }
        }
        changed
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
