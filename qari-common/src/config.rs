//! Bootstrap configuration loading and root folder resolution
//!
//! The TOML file only carries what is needed before the database is open
//! (paths, port, upstream URLs, logging). Runtime settings such as the
//! selected reciter live in the `settings` table.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "QARI_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// SQLite database path; relative paths are resolved against the root folder
    pub database_path: Option<PathBuf>,

    /// HTTP server port
    pub port: u16,

    /// HTTP bind address
    pub bind_address: String,

    /// Data folder (database, logs)
    pub root_folder: Option<PathBuf>,

    /// Base URL of the surah/reciter metadata API
    pub metadata_base_url: String,

    /// Base URL of the per-surah audio CDN
    pub audio_cdn_base_url: String,

    /// Bitrate segment used in CDN audio URLs (kbps)
    pub audio_bitrate: u32,

    /// Reciter selected on first run
    pub default_reciter: String,

    /// Interval between engine status events while playing
    pub status_interval_ms: u64,

    /// Output device name (None = system default)
    pub audio_device: Option<String>,

    pub logging: LoggingConfig,

    /// Reciter entries added to, or replacing, the upstream catalog
    pub reciters: Vec<ReciterOverride>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

/// One `[[reciters]]` table in the TOML file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReciterOverride {
    pub identifier: String,
    pub english_name: String,
    #[serde(default = "default_true")]
    pub has_audio: bool,
    #[serde(default)]
    pub server_base_url: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            port: 5760,
            bind_address: "127.0.0.1".to_string(),
            root_folder: None,
            metadata_base_url: "https://api.alquran.cloud/v1".to_string(),
            audio_cdn_base_url: "https://cdn.islamic.network/quran/audio-surah".to_string(),
            audio_bitrate: 128,
            default_reciter: "ar.alafasy".to_string(),
            status_interval_ms: 500,
            audio_device: None,
            logging: LoggingConfig::default(),
            reciters: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: TomlConfig = toml::from_str(content)?;
        config.status_interval_ms = config.status_interval_ms.clamp(100, 5000);
        if config.default_reciter.trim().is_empty() {
            return Err(Error::Config("default_reciter must not be empty".to_string()));
        }
        Ok(config)
    }

    /// Load configuration from an explicit path, or the platform config file
    ///
    /// A missing file is not an error: a warning is logged and defaults are
    /// returned. A file that exists but fails to parse is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    warn!(
                        "Config file {} not found, using built-in defaults",
                        path.display()
                    );
                    return Ok(Self::default());
                }
                path.to_path_buf()
            }
            None => match default_config_file() {
                Some(path) => path,
                None => {
                    warn!("No config file found, using built-in defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Database path, resolved against `root_folder` when relative
    pub fn resolve_database_path(&self, root_folder: &Path) -> PathBuf {
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root_folder.join(path),
            None => root_folder.join("qari.db"),
        }
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable `QARI_ROOT_FOLDER`
/// 3. TOML config `root_folder`
/// 4. OS-dependent default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Platform config file, if one exists
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("qari").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/qari/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("qari"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/qari"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("qari"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/qari"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("qari"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\qari"))
    } else {
        PathBuf::from("./qari_data")
    }
}
