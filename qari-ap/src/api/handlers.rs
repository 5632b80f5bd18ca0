//! HTTP request handlers
//!
//! Playback endpoints return the session snapshot after the command was
//! applied (`null` when no session exists). Invalid commands for the
//! current state are not errors; the unchanged snapshot comes back.

use crate::api::server::AppContext;
use crate::error::Error;
use axum::{extract::State, http::StatusCode, Json};
use qari_common::events::SessionSnapshot;
use qari_common::models::{Reciter, Surah};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_timestamp: String,
    build_profile: String,
    port: u16,
    root_folder: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReciterSetting {
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub surah: u16,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    pub position_ms: i64,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: Option<SessionSnapshot>,
}

type ApiError = (StatusCode, Json<StatusResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

impl From<Error> for (StatusCode, Json<StatusResponse>) {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Metadata(_) | Error::Playback(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", err);
        }
        (
            status,
            Json(StatusResponse {
                status: format!("error: {}", err),
            }),
        )
    }
}

fn session(snapshot: Option<SessionSnapshot>) -> Json<SessionResponse> {
    Json(SessionResponse { session: snapshot })
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "qari-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
        port: ctx.port,
        root_folder: ctx.root_folder.display().to_string(),
    })
}

// ============================================================================
// Reference Data
// ============================================================================

/// GET /surahs
pub async fn list_surahs(State(ctx): State<AppContext>) -> ApiResult<Vec<Surah>> {
    let surahs = ctx.metadata.list_surahs().await?;
    Ok(Json(surahs))
}

/// GET /reciters
pub async fn list_reciters(State(ctx): State<AppContext>) -> Json<Vec<Reciter>> {
    Json(ctx.catalog.list())
}

// ============================================================================
// Settings
// ============================================================================

/// GET /settings/reciter
pub async fn get_selected_reciter(State(ctx): State<AppContext>) -> ApiResult<ReciterSetting> {
    let identifier = ctx.session.selected_reciter().await?;
    Ok(Json(ReciterSetting { identifier }))
}

/// POST /settings/reciter
pub async fn set_selected_reciter(
    State(ctx): State<AppContext>,
    Json(req): Json<ReciterSetting>,
) -> ApiResult<SessionResponse> {
    info!("Set reciter request: {}", req.identifier);
    let snapshot = ctx.session.set_reciter(req.identifier.trim()).await?;
    Ok(session(snapshot))
}

// ============================================================================
// Playback Control
// ============================================================================

/// GET /playback/session
pub async fn get_session(State(ctx): State<AppContext>) -> Json<SessionResponse> {
    session(ctx.session.snapshot())
}

/// POST /playback/select
pub async fn select_surah(
    State(ctx): State<AppContext>,
    Json(req): Json<SelectRequest>,
) -> ApiResult<SessionResponse> {
    info!("Select surah request: {}", req.surah);
    let snapshot = ctx.session.select_surah(req.surah).await?;
    Ok(session(snapshot))
}

/// POST /playback/toggle
pub async fn toggle_play_pause(State(ctx): State<AppContext>) -> ApiResult<SessionResponse> {
    Ok(session(ctx.session.toggle_play_pause().await?))
}

/// POST /playback/stop
pub async fn stop(State(ctx): State<AppContext>) -> ApiResult<SessionResponse> {
    Ok(session(ctx.session.stop().await?))
}

/// POST /playback/restart
pub async fn restart(State(ctx): State<AppContext>) -> ApiResult<SessionResponse> {
    Ok(session(ctx.session.restart().await?))
}

/// POST /playback/seek
pub async fn seek(
    State(ctx): State<AppContext>,
    Json(req): Json<SeekRequest>,
) -> ApiResult<SessionResponse> {
    Ok(session(ctx.session.seek(req.position_ms).await?))
}
