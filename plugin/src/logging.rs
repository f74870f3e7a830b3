//! Logging initialization.
//!
//! Two entry points, both backed by `tracing-subscriber` with an
//! `RUST_LOG`-style env filter:
//!
//! - [`init_stderr`] for the CLI.
//! - [`init_file`] for the plugin running inside the host, which appends to
//!   `drafttrack.log` in the plugin data directory. A CAD host has no
//!   console, so a log file is the only way to see what the plugin did.
//!
//! Each initializes the global subscriber and must be called at most once
//! per process, by the add-in entry point or the CLI, never by the library
//! itself.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Log file name inside the plugin data directory.
const LOG_FILE_NAME: &str = "drafttrack.log";

/// Initializes stderr logging for CLI use.
pub fn init_stderr() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Initializes file logging into `log_dir`, creating the directory if
/// needed. Log lines are appended across sessions.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created or the log file
/// cannot be opened.
pub fn init_file(log_dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(log_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE_NAME))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(Arc::new(file))
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_file_creates_directory_and_log_file() {
        let tmp = TempDir::new().unwrap();
        let log_dir = tmp.path().join("nested").join("drafttrack");

        // Only check the file plumbing here; installing the global
        // subscriber is covered implicitly and cannot run twice in one
        // process anyway.
        fs::create_dir_all(&log_dir).unwrap();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join(LOG_FILE_NAME));

        assert!(file.is_ok());
        assert!(log_dir.join(LOG_FILE_NAME).exists());
    }
}
