//! Configuration resolution for stemsep
//!
//! Settings resolve ENV → TOML → default, with the root folder and both
//! upstream base URLs among them. The separation API token alone uses
//! 3-tier resolution with the database as the authoritative source:
//! Database → ENV → TOML.

use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_SEPARATION_BASE_URL: &str = "https://mvsep.com";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 4;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// TOML configuration file contents (`~/.config/stemsep/config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<String>,
    pub port: Option<u16>,
    pub media_base_url: Option<String>,
    pub separation_base_url: Option<String>,
    pub separation_api_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub download_concurrency: Option<usize>,
}

impl TomlConfig {
    /// Load from the platform config path; absence yields defaults.
    pub fn load() -> Self {
        match config_file_path() {
            Some(path) if path.exists() => match Self::load_from(&path) {
                Ok(config) => {
                    info!("Loaded TOML config: {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring unreadable TOML config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            _ => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("Read TOML failed: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::Invalid(format!("Parse TOML failed: {}", e)))
    }
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root folder holding the database and identifier-scoped downloads
    pub root_folder: PathBuf,
    pub port: u16,
    /// Media resolution provider base URL
    pub media_base_url: String,
    /// Separation service base URL
    pub separation_base_url: String,
    /// Bound on every external call
    pub request_timeout: Duration,
    /// Bound on concurrent outbound downloads
    pub download_concurrency: usize,
}

impl Config {
    /// Resolve configuration: ENV → TOML → default.
    ///
    /// The media provider base URL has no sensible default and must be
    /// configured; everything else falls back.
    pub fn resolve(toml: &TomlConfig) -> Result<Self, ConfigError> {
        let root_folder = std::env::var("STEMSEP_ROOT_FOLDER")
            .ok()
            .map(PathBuf::from)
            .or_else(|| toml.root_folder.as_ref().map(PathBuf::from))
            .unwrap_or_else(default_root_folder);

        let port = match std::env::var("STEMSEP_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|e| ConfigError::Invalid(format!("STEMSEP_PORT: {}", e)))?,
            Err(_) => toml.port.unwrap_or(DEFAULT_PORT),
        };

        let media_base_url = std::env::var("STEMSEP_MEDIA_BASE_URL")
            .ok()
            .or_else(|| toml.media_base_url.clone())
            .ok_or_else(|| {
                ConfigError::Invalid(
                    "Media provider base URL not configured. Please configure using one of:\n\
                     1. Environment: STEMSEP_MEDIA_BASE_URL=https://provider.example\n\
                     2. TOML config: ~/.config/stemsep/config.toml (media_base_url = \"...\")"
                        .to_string(),
                )
            })?;

        let separation_base_url = std::env::var("STEMSEP_SEPARATION_BASE_URL")
            .ok()
            .or_else(|| toml.separation_base_url.clone())
            .unwrap_or_else(|| DEFAULT_SEPARATION_BASE_URL.to_string());

        let request_timeout_secs = match std::env::var("STEMSEP_REQUEST_TIMEOUT_SECS") {
            Ok(value) => value
                .parse::<u64>()
                .map_err(|e| ConfigError::Invalid(format!("STEMSEP_REQUEST_TIMEOUT_SECS: {}", e)))?,
            Err(_) => toml
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let download_concurrency = match std::env::var("STEMSEP_DOWNLOAD_CONCURRENCY") {
            Ok(value) => value
                .parse::<usize>()
                .map_err(|e| ConfigError::Invalid(format!("STEMSEP_DOWNLOAD_CONCURRENCY: {}", e)))?,
            Err(_) => toml
                .download_concurrency
                .unwrap_or(DEFAULT_DOWNLOAD_CONCURRENCY),
        };

        if download_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "download_concurrency must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            root_folder,
            port,
            media_base_url,
            separation_base_url,
            request_timeout: Duration::from_secs(request_timeout_secs),
            download_concurrency,
        })
    }

    /// Identifier-scoped downloads live under this directory.
    pub fn downloads_dir(&self) -> PathBuf {
        self.root_folder.join("downloads")
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("stemsep.db")
    }
}

/// Resolve the separation service API token from 3-tier configuration.
///
/// Priority: Database → ENV → TOML.
pub async fn resolve_separation_api_token(
    db: &Pool<Sqlite>,
    toml: &TomlConfig,
) -> Result<String, ConfigError> {
    let db_token = crate::db::settings::get_separation_api_token(db).await?;
    let env_token = std::env::var("STEMSEP_API_TOKEN").ok();
    let toml_token = toml.separation_api_token.clone();

    let sources: Vec<&str> = [
        db_token.as_deref().filter(|t| is_valid_token(t)).map(|_| "database"),
        env_token.as_deref().filter(|t| is_valid_token(t)).map(|_| "environment"),
        toml_token.as_deref().filter(|t| is_valid_token(t)).map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.len() > 1 {
        warn!(
            "Separation API token found in multiple sources: {}. Using database (highest priority).",
            sources.join(", ")
        );
    }

    for (token, source) in [
        (db_token, "database"),
        (env_token, "environment variable"),
        (toml_token, "TOML config"),
    ] {
        if let Some(token) = token {
            if is_valid_token(&token) {
                info!("Separation API token loaded from {}", source);
                return Ok(token);
            }
        }
    }

    Err(ConfigError::Invalid(
        "Separation API token not configured. Please configure using one of:\n\
         1. Environment: STEMSEP_API_TOKEN=your-token-here\n\
         2. TOML config: ~/.config/stemsep/config.toml (separation_api_token = \"your-token\")\n\
         \n\
         Obtain a token from your separation service account page."
            .to_string(),
    ))
}

/// Validate token (non-empty, non-whitespace)
pub fn is_valid_token(token: &str) -> bool {
    !token.trim().is_empty()
}

fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("stemsep").join("config.toml"))
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("stemsep"))
        .unwrap_or_else(|| PathBuf::from("./stemsep_data"))
}
