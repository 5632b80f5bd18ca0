//! Qari Audio Player (qari-ap) - Main entry point
//!
//! Streams surah recitations and serves the playback session over HTTP/SSE.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use qari_ap::api::{self, AppContext};
use qari_ap::audio::OutputBackend;
use qari_ap::config::{CliOverrides, Config};
use qari_ap::db::init::init_settings_defaults;
use qari_ap::metadata::{AlQuranClient, AudioUrlResolver, MetadataProvider, ReciterCatalog};
use qari_ap::playback::{
    engine_event_channel, spawn_session_service, SessionHandle, StreamEngine, StreamEngineConfig,
};
use qari_ap::SharedState;
use qari_common::config::{LoggingConfig, TomlConfig};
use qari_common::db::init_database;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for qari-ap
#[derive(Parser, Debug)]
#[command(name = "qari-ap")]
#[command(about = "Quran recitation audio player")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "QARI_AP_PORT")]
    port: Option<u16>,

    /// Data folder for the database
    #[arg(short, long, env = "QARI_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Configuration file (default: platform config dir)
    #[arg(short, long, env = "QARI_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path (overrides root folder default)
    #[arg(long, env = "QARI_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&toml_config.logging)?;

    let config = Config::resolve(
        &toml_config,
        &CliOverrides {
            port: args.port,
            root_folder: args.root_folder,
            database: args.database,
        },
    );

    info!(
        "Starting Qari Audio Player {} ({}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE")
    );
    info!("Root folder: {}", config.root_folder.display());
    info!("Database: {}", config.db_path.display());

    let db_pool = init_database(&config.db_path)
        .await
        .context("Failed to initialize database")?;
    init_settings_defaults(&db_pool, &config.default_reciter)
        .await
        .context("Failed to initialize settings")?;

    let metadata: Arc<dyn MetadataProvider> = Arc::new(
        AlQuranClient::new(config.metadata_base_url.clone())
            .context("Failed to create metadata client")?,
    );
    let catalog = Arc::new(ReciterCatalog::new(
        &config.audio_cdn_base_url,
        config.audio_bitrate,
        config.reciters.clone(),
    ));
    catalog.refresh(metadata.as_ref()).await;

    let state = Arc::new(SharedState::new());

    let (event_tx, event_rx) = engine_event_channel();
    let engine = StreamEngine::new(
        StreamEngineConfig {
            status_interval: config.status_interval,
            output: OutputBackend::Device(config.audio_device.clone()),
            ..Default::default()
        },
        event_tx,
    )
    .context("Failed to initialize playback engine")?;

    let resolver: Arc<dyn AudioUrlResolver> = catalog.clone();
    let (commands, service_task) =
        spawn_session_service(engine, resolver, event_rx, Arc::clone(&state));
    let session = SessionHandle::new(
        commands,
        Arc::clone(&state),
        db_pool.clone(),
        Arc::clone(&metadata),
        Arc::clone(&catalog),
        config.default_reciter.clone(),
    );

    let ctx = AppContext {
        state,
        session: session.clone(),
        metadata,
        catalog,
        root_folder: config.root_folder.clone(),
        port: config.port,
    };

    api::run(&config, ctx, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // Unmount: tear the session down before the engine goes away
    session.shutdown().await;
    if let Err(e) = service_task.await {
        error!("Session service task failed: {}", e);
    }
    db_pool.close().await;

    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("qari_ap={},qari_common={},tower_http=info", logging.level, logging.level).into()
    });

    match &logging.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log folder {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
