//! qari-ap runtime configuration
//!
//! Merges command-line overrides with the bootstrap TOML into the values the
//! service actually runs with.

use qari_common::config::{resolve_root_folder, ReciterOverride, TomlConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Values supplied on the command line (or their env fallbacks)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub root_folder: Option<PathBuf>,
    pub database: Option<PathBuf>,
}

/// Audio Player configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub root_folder: PathBuf,
    pub db_path: PathBuf,
    pub port: u16,
    pub bind_addr: String,
    pub metadata_base_url: String,
    pub audio_cdn_base_url: String,
    pub audio_bitrate: u32,
    pub default_reciter: String,
    pub status_interval: Duration,
    pub audio_device: Option<String>,
    pub reciters: Vec<ReciterOverride>,
}

impl Config {
    /// Apply CLI overrides on top of the TOML configuration
    pub fn resolve(toml: &TomlConfig, cli: &CliOverrides) -> Self {
        let root_folder = resolve_root_folder(cli.root_folder.as_deref(), toml);
        let db_path = cli
            .database
            .clone()
            .unwrap_or_else(|| toml.resolve_database_path(&root_folder));
        let port = cli.port.unwrap_or(toml.port);

        Self {
            root_folder,
            db_path,
            port,
            bind_addr: format!("{}:{}", toml.bind_address, port),
            metadata_base_url: toml.metadata_base_url.trim_end_matches('/').to_string(),
            audio_cdn_base_url: toml.audio_cdn_base_url.trim_end_matches('/').to_string(),
            audio_bitrate: toml.audio_bitrate,
            default_reciter: toml.default_reciter.clone(),
            status_interval: Duration::from_millis(toml.status_interval_ms),
            audio_device: toml.audio_device.clone(),
            reciters: toml.reciters.clone(),
        }
    }
}
