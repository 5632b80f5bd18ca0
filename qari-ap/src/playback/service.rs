//! Session service: single dispatch point for the playback controller
//!
//! One tokio task owns the [`PlaybackController`]. User commands arrive on
//! an mpsc channel, engine events on the engine channel, and the task
//! handles them one at a time, so every session transition is serialized.
//! After each message the resulting snapshot is published through
//! [`SharedState`].

use crate::db::settings;
use crate::error::{Error, Result};
use crate::metadata::{AudioUrlResolver, MetadataProvider, ReciterCatalog};
use crate::playback::controller::PlaybackController;
use crate::playback::engine::PlaybackEngine;
use crate::playback::events::EngineEventReceiver;
use crate::state::SharedState;
use qari_common::events::{QariEvent, SessionSnapshot};
use qari_common::models::Surah;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 32;

/// User command for the session task
#[derive(Debug, Clone)]
pub enum Command {
    SelectSurah { surah: Surah, reciter_id: String },
    TogglePlayPause,
    Stop,
    Restart,
    Seek(i64),
    ReciterChanged(String),
    /// Tear down and exit the task
    Shutdown,
}

type Reply = oneshot::Sender<Option<SessionSnapshot>>;

struct SessionService<E: PlaybackEngine> {
    controller: PlaybackController<E>,
    commands: mpsc::Receiver<(Command, Reply)>,
    engine_events: EngineEventReceiver,
    state: Arc<SharedState>,
}

impl<E: PlaybackEngine + 'static> SessionService<E> {
    async fn run(mut self) {
        info!("Session service started");

        loop {
            tokio::select! {
                biased;

                message = self.commands.recv() => {
                    let Some((command, reply)) = message else {
                        debug!("All session handles dropped");
                        self.controller.unmount();
                        self.publish();
                        break;
                    };
                    let shutdown = matches!(command, Command::Shutdown);
                    self.apply(command);
                    let snapshot = self.publish();
                    // Caller may have given up waiting
                    let _ = reply.send(snapshot);
                    if shutdown {
                        break;
                    }
                }

                Some(event) = self.engine_events.recv() => {
                    self.controller.handle_engine_event(event);
                    self.publish();
                }
            }
        }

        info!("Session service stopped");
    }

    fn apply(&mut self, command: Command) {
        debug!(?command, "Session command");
        match command {
            Command::SelectSurah { surah, reciter_id } => {
                self.controller.select_surah(surah, &reciter_id)
            }
            Command::TogglePlayPause => self.controller.toggle_play_pause(),
            Command::Stop => self.controller.stop(),
            Command::Restart => self.controller.restart(),
            Command::Seek(position_ms) => self.controller.seek(position_ms),
            Command::ReciterChanged(reciter_id) => self.controller.reciter_changed(&reciter_id),
            Command::Shutdown => self.controller.unmount(),
        }
    }

    fn publish(&self) -> Option<SessionSnapshot> {
        let snapshot = self.controller.snapshot();
        self.state.publish_session(snapshot.clone());
        snapshot
    }
}

/// Start the session task
///
/// The returned sender is the raw command channel; wrap it in a
/// [`SessionHandle`] for the operations clients use.
pub fn spawn_session_service<E: PlaybackEngine + 'static>(
    engine: E,
    resolver: Arc<dyn AudioUrlResolver>,
    engine_events: EngineEventReceiver,
    state: Arc<SharedState>,
) -> (CommandSender, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let service = SessionService {
        controller: PlaybackController::new(engine, resolver),
        commands: rx,
        engine_events,
        state,
    };
    let task = tokio::spawn(service.run());
    (CommandSender { tx }, task)
}

/// Raw command channel into the session task
#[derive(Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<(Command, Reply)>,
}

impl CommandSender {
    /// Dispatch a command and wait for the resulting snapshot
    pub async fn send(&self, command: Command) -> Result<Option<SessionSnapshot>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((command, reply_tx))
            .await
            .map_err(|_| Error::Playback("session service is not running".to_string()))?;
        reply_rx
            .await
            .map_err(|_| Error::Playback("session service dropped the command".to_string()))
    }
}

/// Client of the session service
///
/// Resolves everything a command needs (surah metadata, selected reciter)
/// before dispatch, so the controller only ever sees explicit arguments.
#[derive(Clone)]
pub struct SessionHandle {
    commands: CommandSender,
    state: Arc<SharedState>,
    db: Pool<Sqlite>,
    metadata: Arc<dyn MetadataProvider>,
    catalog: Arc<ReciterCatalog>,
    default_reciter: String,
}

impl SessionHandle {
    pub fn new(
        commands: CommandSender,
        state: Arc<SharedState>,
        db: Pool<Sqlite>,
        metadata: Arc<dyn MetadataProvider>,
        catalog: Arc<ReciterCatalog>,
        default_reciter: impl Into<String>,
    ) -> Self {
        Self {
            commands,
            state,
            db,
            metadata,
            catalog,
            default_reciter: default_reciter.into(),
        }
    }

    /// Latest published snapshot, without a round trip to the task
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.state.current_session()
    }

    pub async fn selected_reciter(&self) -> Result<String> {
        settings::get_selected_reciter(&self.db, &self.default_reciter).await
    }

    /// Start a session for surah `number` with the selected reciter
    pub async fn select_surah(&self, number: u16) -> Result<Option<SessionSnapshot>> {
        if !Surah::is_valid_number(number) {
            return Err(Error::BadRequest(format!(
                "surah must be between 1 and {}",
                qari_common::SURAH_COUNT
            )));
        }
        let surah = self
            .metadata
            .surah(number)
            .await?
            .ok_or_else(|| Error::NotFound(format!("surah {}", number)))?;
        let reciter_id = self.selected_reciter().await?;

        self.commands
            .send(Command::SelectSurah { surah, reciter_id })
            .await
    }

    pub async fn toggle_play_pause(&self) -> Result<Option<SessionSnapshot>> {
        self.commands.send(Command::TogglePlayPause).await
    }

    pub async fn stop(&self) -> Result<Option<SessionSnapshot>> {
        self.commands.send(Command::Stop).await
    }

    pub async fn restart(&self) -> Result<Option<SessionSnapshot>> {
        self.commands.send(Command::Restart).await
    }

    pub async fn seek(&self, position_ms: i64) -> Result<Option<SessionSnapshot>> {
        self.commands.send(Command::Seek(position_ms)).await
    }

    /// Persist a new selected reciter and reload any live session with it
    pub async fn set_reciter(&self, identifier: &str) -> Result<Option<SessionSnapshot>> {
        if !self.catalog.contains(identifier) {
            return Err(Error::NotFound(format!("reciter {}", identifier)));
        }

        settings::set_selected_reciter(&self.db, identifier).await?;
        info!(reciter = identifier, "Selected reciter changed");
        self.state.broadcast_event(QariEvent::ReciterChanged {
            identifier: identifier.to_string(),
            timestamp: chrono::Utc::now(),
        });

        self.commands
            .send(Command::ReciterChanged(identifier.to_string()))
            .await
    }

    /// Tear the session down and stop the task
    pub async fn shutdown(&self) {
        if let Err(err) = self.commands.send(Command::Shutdown).await {
            warn!(error = %err, "Session service already stopped");
        }
    }
}
