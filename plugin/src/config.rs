//! Configuration module for the DraftTrack plugin.
//!
//! This module handles parsing configuration from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `DRAFTTRACK_API_URL` | Yes | - | Tracking backend base URL |
//! | `DRAFTTRACK_API_KEY` | Yes | - | API key for the tracking backend |
//! | `DRAFTTRACK_SOURCE_ID` | No | hostname | Workstation identifier |
//! | `DRAFTTRACK_BUFFER_SIZE` | No | 1000 | Heartbeat buffer capacity |
//! | `DRAFTTRACK_FLUSH_INTERVAL_SECS` | No | 30 | Seconds between batch flushes |
//! | `DRAFTTRACK_LOG_DIR` | No | `~/.drafttrack` | Plugin data/log directory |
//!
//! # Example
//!
//! ```no_run
//! use drafttrack_plugin::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("API URL: {}", config.api_url);
//! ```

use std::env;
use std::path::PathBuf;

use directories::BaseDirs;
use thiserror::Error;

/// Default heartbeat buffer capacity.
const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Default seconds between batch flushes.
const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 30;

/// Default plugin data directory name relative to home.
const DEFAULT_DATA_DIR: &str = ".drafttrack";

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Configuration for the DraftTrack plugin.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the tracking backend.
    pub api_url: String,

    /// API key used for Basic authentication against the backend.
    pub api_key: String,

    /// Workstation identifier attached to every heartbeat.
    pub source_id: String,

    /// Capacity of the heartbeat buffer.
    pub buffer_size: usize,

    /// Seconds between batch flushes to the backend.
    pub flush_interval_secs: u64,

    /// Directory for the plugin log file.
    pub log_dir: PathBuf,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - `DRAFTTRACK_API_URL` or `DRAFTTRACK_API_KEY` is not set
    /// - a numeric variable is set but cannot be parsed as a positive integer
    /// - the home directory cannot be determined (needed for default paths)
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
        let home_dir = base_dirs.home_dir();

        // Required: DRAFTTRACK_API_URL
        let api_url = env::var("DRAFTTRACK_API_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DRAFTTRACK_API_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();

        // Required: DRAFTTRACK_API_KEY
        let api_key = env::var("DRAFTTRACK_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("DRAFTTRACK_API_KEY".to_string()))?;
        if api_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "DRAFTTRACK_API_KEY".to_string(),
                message: "API key must not be blank".to_string(),
            });
        }

        // Optional: DRAFTTRACK_SOURCE_ID (default: hostname)
        let source_id = env::var("DRAFTTRACK_SOURCE_ID").unwrap_or_else(|_| get_hostname());

        // Optional: DRAFTTRACK_BUFFER_SIZE (default: 1000, must be > 0)
        let buffer_size = parse_positive_usize("DRAFTTRACK_BUFFER_SIZE", DEFAULT_BUFFER_SIZE)?;

        // Optional: DRAFTTRACK_FLUSH_INTERVAL_SECS (default: 30, must be > 0)
        let flush_interval_secs =
            parse_positive_u64("DRAFTTRACK_FLUSH_INTERVAL_SECS", DEFAULT_FLUSH_INTERVAL_SECS)?;

        // Optional: DRAFTTRACK_LOG_DIR (default: ~/.drafttrack)
        let log_dir = env::var("DRAFTTRACK_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir.join(DEFAULT_DATA_DIR));

        Ok(Self {
            api_url,
            api_key,
            source_id,
            buffer_size,
            flush_interval_secs,
            log_dir,
        })
    }
}

fn parse_positive_usize(key: &str, default: usize) -> Result<usize, ConfigError> {
    match env::var(key) {
        Ok(val) => {
            let parsed = val.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected positive integer, got '{val}'"),
            })?;
            if parsed == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "value must be greater than 0".to_string(),
                });
            }
            Ok(parsed)
        }
        Err(_) => Ok(default),
    }
}

fn parse_positive_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(val) => {
            let parsed = val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected positive integer, got '{val}'"),
            })?;
            if parsed == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "value must be greater than 0".to_string(),
                });
            }
            Ok(parsed)
        }
        Err(_) => Ok(default),
    }
}

/// Returns the machine hostname, falling back to `"unknown"`.
fn get_hostname() -> String {
    gethostname::gethostname()
        .into_string()
        .unwrap_or_else(|_| "unknown".to_string())
}
