//! HTTP/SSE control surface
//!
//! Thin adapter over [`SessionHandle`]: handlers translate requests into
//! session commands and return the resulting snapshot.
//!
//! [`SessionHandle`]: crate::playback::SessionHandle

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};
