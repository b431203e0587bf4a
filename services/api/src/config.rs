//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;
use uuid::Uuid;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where study data lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageMode {
    /// PostgreSQL, with email/password accounts.
    Remote { database_url: String },
    /// JSON files on disk for a single local user; no accounts.
    Local { data_dir: PathBuf, user_id: Uuid },
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub storage: StorageMode,
    pub log_level: Level,
    pub allowed_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Server Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin =
            var("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:4200".to_string());

        // --- Storage Settings ---
        let mode = var("STORAGE_MODE").unwrap_or_else(|| "remote".to_string());
        let storage = match mode.to_lowercase().as_str() {
            "remote" => StorageMode::Remote {
                database_url: var("DATABASE_URL")
                    .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?,
            },
            "local" => {
                let data_dir = var("LOCAL_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./data"));
                let user_id = match var("LOCAL_USER_ID") {
                    Some(raw) => Uuid::parse_str(&raw).map_err(|e| {
                        ConfigError::InvalidValue("LOCAL_USER_ID".to_string(), e.to_string())
                    })?,
                    None => Uuid::nil(),
                };
                StorageMode::Local { data_dir, user_id }
            }
            _ => {
                return Err(ConfigError::InvalidValue(
                    "STORAGE_MODE".to_string(),
                    format!("'{}' is not one of remote, local", mode),
                ))
            }
        };

        Ok(Self {
            bind_address,
            storage,
            log_level,
            allowed_origin,
        })
    }
}
