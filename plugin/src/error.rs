//! Error types for the DraftTrack plugin.
//!
//! This module defines the aggregate error type used at the plugin facade
//! boundary. The individual modules keep their own focused error enums
//! ([`ConfigError`], [`HostError`], [`SenderError`]); `PluginError` exists so
//! the facade and the CLI can return a single type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::host::HostError;
use crate::sender::SenderError;

/// Errors that can occur during plugin operations.
#[derive(Error, Debug)]
pub enum PluginError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Host notification registry error.
    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// Heartbeat sender error.
    #[error("sender error: {0}")]
    Sender(#[from] SenderError),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;
