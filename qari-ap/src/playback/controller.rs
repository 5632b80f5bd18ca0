//! Playback session controller
//!
//! Deterministic state machine over at most one [`Session`]. User commands
//! and engine events both enter through `&mut self` methods, so callers
//! serialize them (see `playback::service`). No operation returns an error:
//! each one completes, is ignored because its precondition does not hold,
//! or moves the session to `Error`.
//!
//! Engine events are advisory. An event whose handle is not the live
//! session's handle belongs to a session that has already been torn down
//! and is dropped.

use crate::metadata::AudioUrlResolver;
use crate::playback::engine::{EngineHandle, PlaybackEngine};
use crate::playback::events::{EngineEvent, EngineEventKind, StatusUpdate};
use crate::playback::session::{PlaybackErrorKind, Session, SessionSnapshot, SessionStatus};
use qari_common::models::Surah;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub struct PlaybackController<E: PlaybackEngine> {
    engine: E,
    resolver: Arc<dyn AudioUrlResolver>,
    session: Option<Session>,
    /// Generation of the most recently created session
    generation: u64,
    /// Set by `unmount`; nothing is processed afterwards
    closed: bool,
}

impl<E: PlaybackEngine> PlaybackController<E> {
    pub fn new(engine: E, resolver: Arc<dyn AudioUrlResolver>) -> Self {
        Self {
            engine,
            resolver,
            session: None,
            generation: 0,
            closed: false,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session.as_ref().map(Session::snapshot)
    }

    /// Current status, `Idle` when no session exists
    pub fn status(&self) -> SessionStatus {
        self.session
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(SessionStatus::Idle)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Start a session for `surah` recited by `reciter_id`
    ///
    /// Any existing session is torn down first. When the reciter has no audio
    /// for this surah the new session goes straight to `Error` with
    /// `UnsupportedReciter` and the engine is never called.
    pub fn select_surah(&mut self, surah: Surah, reciter_id: &str) {
        if self.closed {
            return;
        }

        self.teardown();

        self.generation += 1;
        let mut session = Session::new(self.generation, surah, reciter_id);
        match self
            .resolver
            .resolve_audio_url(session.surah.number, reciter_id)
        {
            None => {
                warn!(
                    surah = session.surah.number,
                    reciter = reciter_id,
                    "Reciter has no audio for surah"
                );
                session.status = SessionStatus::Error;
                session.last_error = Some(PlaybackErrorKind::UnsupportedReciter);
            }
            Some(url) => match self.engine.create(&url) {
                Ok(handle) => {
                    debug!(
                        surah = session.surah.number,
                        reciter = reciter_id,
                        %handle,
                        %url,
                        "Session loading"
                    );
                    session.handle = Some(handle);
                    session.status = SessionStatus::Loading;
                }
                Err(err) => {
                    warn!(surah = session.surah.number, error = %err, "Engine refused stream");
                    session.status = SessionStatus::Error;
                    session.last_error = Some(err.kind());
                }
            },
        }

        self.session = Some(session);
    }

    /// Play when ready or paused, pause when playing; otherwise nothing
    ///
    /// Decided from the session status alone, never from a separate flag.
    pub fn toggle_play_pause(&mut self) {
        match self.status() {
            SessionStatus::Ready | SessionStatus::Paused => self.play(),
            SessionStatus::Playing => self.pause(),
            status => trace!(%status, "Toggle ignored"),
        }
    }

    pub fn play(&mut self) {
        let Self {
            engine, session, ..
        } = self;
        let Some(session) = session.as_mut() else {
            return;
        };
        if !matches!(session.status, SessionStatus::Ready | SessionStatus::Paused) {
            trace!(status = %session.status, "Play ignored");
            return;
        }
        let Some(handle) = session.handle else {
            return;
        };

        match engine.play(handle) {
            Ok(()) => transition(session, SessionStatus::Playing),
            Err(err) => fail(engine, session, err.kind()),
        }
    }

    pub fn pause(&mut self) {
        let Self {
            engine, session, ..
        } = self;
        let Some(session) = session.as_mut() else {
            return;
        };
        if session.status != SessionStatus::Playing {
            trace!(status = %session.status, "Pause ignored");
            return;
        }
        let Some(handle) = session.handle else {
            return;
        };

        match engine.pause(handle) {
            Ok(()) => transition(session, SessionStatus::Paused),
            Err(err) => fail(engine, session, err.kind()),
        }
    }

    /// End the session: engine stop + release, position and surah cleared
    ///
    /// Safe in every state; a no-op without a session.
    pub fn stop(&mut self) {
        if self.session.is_some() {
            debug!("Session stopped");
        }
        self.teardown();
    }

    /// Rewind to 0 and play
    ///
    /// Valid while playing, paused, or after the stream finished.
    pub fn restart(&mut self) {
        let Self {
            engine, session, ..
        } = self;
        let Some(session) = session.as_mut() else {
            return;
        };
        if !matches!(
            session.status,
            SessionStatus::Playing | SessionStatus::Paused | SessionStatus::Stopped
        ) {
            trace!(status = %session.status, "Restart ignored");
            return;
        }
        let Some(handle) = session.handle else {
            return;
        };

        if let Err(err) = engine.seek(handle, 0) {
            fail(engine, session, err.kind());
            return;
        }
        session.position_ms = 0;

        if session.status != SessionStatus::Playing {
            match engine.play(handle) {
                Ok(()) => transition(session, SessionStatus::Playing),
                Err(err) => fail(engine, session, err.kind()),
            }
        }
    }

    /// Seek to `position_ms`, clamped into `[0, duration_ms]`
    ///
    /// Later status events from the engine remain authoritative for the
    /// resulting position.
    pub fn seek(&mut self, position_ms: i64) {
        let Self {
            engine, session, ..
        } = self;
        let Some(session) = session.as_mut() else {
            return;
        };
        if !session.status.is_active() {
            trace!(status = %session.status, "Seek ignored");
            return;
        }
        let Some(handle) = session.handle else {
            return;
        };

        let target = session.clamp_position(position_ms);
        match engine.seek(handle, target) {
            Ok(()) => {
                debug!(requested = position_ms, target, "Seek");
                session.position_ms = target;
            }
            Err(err) => fail(engine, session, err.kind()),
        }
    }

    /// The globally selected reciter changed
    ///
    /// A live session under a different reciter is torn down and the same
    /// surah reloaded for `reciter_id`. Without a session only future
    /// selections are affected.
    pub fn reciter_changed(&mut self, reciter_id: &str) {
        if self.closed {
            return;
        }
        let surah = match &self.session {
            Some(session) if session.reciter_id != reciter_id => session.surah.clone(),
            _ => return,
        };
        debug!(surah = surah.number, reciter = reciter_id, "Reloading session for new reciter");
        self.select_surah(surah, reciter_id);
    }

    /// Reconcile one asynchronous engine event into session state
    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        if self.closed {
            return;
        }
        let Self {
            engine, session, ..
        } = self;
        let Some(session) = session.as_mut() else {
            trace!(handle = %event.handle, "Engine event without session dropped");
            return;
        };
        if session.handle != Some(event.handle) {
            trace!(handle = %event.handle, "Stale engine event dropped");
            return;
        }

        match event.kind {
            EngineEventKind::Loaded { duration_ms } => {
                if session.status == SessionStatus::Loading {
                    session.duration_ms = duration_ms;
                    session.position_ms = 0;
                    transition(session, SessionStatus::Ready);
                }
            }
            EngineEventKind::LoadFailed(err) | EngineEventKind::Error(err) => {
                warn!(surah = session.surah.number, error = %err, "Engine failure");
                fail(engine, session, err.kind());
            }
            EngineEventKind::Status(update) => apply_status(session, update),
        }
    }

    /// Screen unmount: tear down and ignore everything afterwards
    pub fn unmount(&mut self) {
        self.teardown();
        self.closed = true;
    }

    /// Stop and release the live session's engine handle, dropping the session
    fn teardown(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if let Some(handle) = session.handle {
            release_handle(&mut self.engine, handle);
        }
    }
}

fn transition(session: &mut Session, status: SessionStatus) {
    if session.status != status {
        debug!(
            surah = session.surah.number,
            from = %session.status,
            to = %status,
            "Session transition"
        );
        session.status = status;
    }
}

/// Move to `Error`, releasing the engine handle
fn fail<E: PlaybackEngine>(engine: &mut E, session: &mut Session, kind: PlaybackErrorKind) {
    warn!(surah = session.surah.number, %kind, "Session failed");
    if let Some(handle) = session.handle.take() {
        release_handle(engine, handle);
    }
    session.status = SessionStatus::Error;
    session.last_error = Some(kind);
}

/// Stop then release; failures are logged and otherwise ignored
fn release_handle<E: PlaybackEngine>(engine: &mut E, handle: EngineHandle) {
    if let Err(err) = engine.stop(handle) {
        debug!(%handle, error = %err, "Engine stop failed during teardown");
    }
    if let Err(err) = engine.release(handle) {
        warn!(%handle, error = %err, "Engine release failed");
    }
}

fn apply_status(session: &mut Session, update: StatusUpdate) {
    if update.did_finish {
        if matches!(
            session.status,
            SessionStatus::Playing | SessionStatus::Paused | SessionStatus::Ready
        ) {
            session.position_ms = 0;
            transition(session, SessionStatus::Stopped);
        }
        return;
    }

    if session.status.is_active() {
        session.position_ms = if session.duration_ms > 0 {
            update.position_ms.min(session.duration_ms)
        } else {
            update.position_ms
        };
    }
}
