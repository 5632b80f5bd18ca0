//! Playback session control
//!
//! - `controller`: the session state machine
//! - `service`: tokio task serializing commands and engine events into it
//! - `engine` / `stream_engine`: engine abstraction and its streaming implementation

pub mod controller;
pub mod engine;
pub mod events;
pub mod service;
pub mod session;
pub mod stream_engine;

pub use controller::PlaybackController;
pub use engine::{EngineError, EngineHandle, PlaybackEngine};
pub use events::{engine_event_channel, EngineEvent, EngineEventKind, StatusUpdate};
pub use service::{spawn_session_service, Command, CommandSender, SessionHandle};
pub use session::{PlaybackErrorKind, Session, SessionSnapshot, SessionStatus};
pub use stream_engine::{StreamEngine, StreamEngineConfig};
