//! HTTP server setup and routing

use crate::config::Config;
use crate::error::{Error, Result};
use crate::metadata::{MetadataProvider, ReciterCatalog};
use crate::playback::SessionHandle;
use crate::state::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub session: SessionHandle,
    pub metadata: Arc<dyn MetadataProvider>,
    pub catalog: Arc<ReciterCatalog>,
    pub root_folder: PathBuf,
    pub port: u16,
}

/// Build the router with every route and layer attached
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        // Reference data
        .route("/surahs", get(super::handlers::list_surahs))
        .route("/reciters", get(super::handlers::list_reciters))
        // Settings
        .route(
            "/settings/reciter",
            get(super::handlers::get_selected_reciter).post(super::handlers::set_selected_reciter),
        )
        // Playback control
        .route("/playback/session", get(super::handlers::get_session))
        .route("/playback/select", post(super::handlers::select_surah))
        .route("/playback/toggle", post(super::handlers::toggle_play_pause))
        .route("/playback/stop", post(super::handlers::stop))
        .route("/playback/restart", post(super::handlers::restart))
        .route("/playback/seek", post(super::handlers::seek))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Run HTTP API server until `shutdown` resolves
pub async fn run(
    config: &Config,
    ctx: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(ctx);
    let addr = config.bind_addr.as_str();

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
