//! DraftTrack Plugin - CAD editor activity tracker.
//!
//! Developer tooling around the plugin library. The plugin itself is loaded
//! by the editor's add-in entry point; this binary exists to check a
//! workstation's configuration and to exercise the event pipeline without an
//! editor.
//!
//! # Commands
//!
//! - `drafttrack-plugin doctor`: Validate and print the resolved configuration
//! - `drafttrack-plugin simulate`: Replay a scripted editing session through
//!   the real bridge and translator, printing the signals that would be sent
//!
//! # Environment Variables
//!
//! See the [`config`] module for available configuration options.

use std::collections::HashMap;
use std::convert::Infallible;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use drafttrack_plugin::config::Config;
use drafttrack_plugin::host::{
    DocumentHandle, EditorHost, EventCallback, HostError, SubscriptionId,
};
use drafttrack_plugin::translator::{ActivityTranslator, TrackingClient};
use drafttrack_plugin::types::DocumentEventKind;
use drafttrack_plugin::{logging, EditorEventBridge};

/// DraftTrack Plugin - CAD editor activity tracker.
///
/// Observes the editor's document lifecycle and reports activity heartbeats
/// to the tracking backend.
#[derive(Parser, Debug)]
#[command(name = "drafttrack-plugin")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    DRAFTTRACK_API_URL              Tracking backend base URL (required)
    DRAFTTRACK_API_KEY              Backend API key (required)
    DRAFTTRACK_SOURCE_ID            Workstation identifier (default: hostname)
    DRAFTTRACK_BUFFER_SIZE          Heartbeat buffer size (default: 1000)
    DRAFTTRACK_FLUSH_INTERVAL_SECS  Seconds between flushes (default: 30)
    DRAFTTRACK_LOG_DIR              Log directory (default: ~/.drafttrack)

EXAMPLES:
    # Check the workstation configuration
    export DRAFTTRACK_API_URL=https://track.example.com
    export DRAFTTRACK_API_KEY=secret
    drafttrack-plugin doctor

    # Replay a scripted session through the event pipeline
    drafttrack-plugin simulate
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Validate and print the resolved configuration.
    Doctor,

    /// Replay a scripted editing session through the bridge and translator.
    ///
    /// No network traffic: the signals that would become heartbeats are
    /// printed to stdout instead.
    Simulate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_stderr();

    match cli.command {
        Command::Doctor => run_doctor(),
        Command::Simulate => run_simulate(),
    }
}

/// Runs the doctor command.
fn run_doctor() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    println!("Configuration OK");
    println!("  api_url:             {}", config.api_url);
    println!("  api_key:             {}", mask_key(&config.api_key));
    println!("  source_id:           {}", config.source_id);
    println!("  buffer_size:         {}", config.buffer_size);
    println!("  flush_interval_secs: {}", config.flush_interval_secs);
    println!("  log_dir:             {}", config.log_dir.display());

    Ok(())
}

/// Masks an API key for display, keeping the first four characters.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let prefix: String = chars[..4].iter().collect();
    format!("{}{}", prefix, "*".repeat(chars.len() - 4))
}

/// Runs the simulate command.
fn run_simulate() -> Result<()> {
    let host = Arc::new(ScriptedHost::default());
    let translator = Arc::new(ActivityTranslator::new(ConsoleClient));
    let mut bridge = EditorEventBridge::new(Arc::clone(&host), translator);
    bridge
        .bind()
        .context("Failed to bind to the scripted host")?;

    let model = SimDocument::file("/proj/tower/model.dat");
    let part = SimDocument::family("/lib/widgets/part1.fam");
    let unsaved = SimDocument::file("");

    // A plausible editing session, including the states that must produce
    // no signals: a notification with no document and an unsaved document.
    host.emit(DocumentEventKind::Opened, Some(&model));
    host.emit(DocumentEventKind::ViewActivated, Some(&model));
    host.emit(DocumentEventKind::Changed, Some(&model));
    host.emit(DocumentEventKind::Saved, Some(&model));
    host.emit(DocumentEventKind::Opened, Some(&part));
    host.emit(DocumentEventKind::SavedAs, Some(&part));
    host.emit(DocumentEventKind::Changed, None);
    host.emit(DocumentEventKind::Changed, Some(&unsaved));
    host.emit(DocumentEventKind::Closing, Some(&model));

    bridge.dispose(true);
    println!("session replay complete");
    Ok(())
}

/// A document in the scripted session.
struct SimDocument {
    path: &'static str,
    family: bool,
}

impl SimDocument {
    fn file(path: &'static str) -> Self {
        Self {
            path,
            family: false,
        }
    }

    fn family(path: &'static str) -> Self {
        Self { path, family: true }
    }
}

impl DocumentHandle for SimDocument {
    fn path_name(&self) -> String {
        self.path.to_string()
    }

    fn is_family_document(&self) -> bool {
        self.family
    }
}

/// A single-threaded in-process host that dispatches scripted notifications
/// to whatever handlers the bridge registered.
#[derive(Default)]
struct ScriptedHost {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<SubscriptionId, (DocumentEventKind, EventCallback)>>,
}

impl ScriptedHost {
    fn emit(&self, kind: DocumentEventKind, document: Option<&dyn DocumentHandle>) {
        let handlers = self.handlers.lock().expect("host handler registry poisoned");
        for (registered_kind, callback) in handlers.values() {
            if *registered_kind == kind {
                callback(document);
            }
        }
    }
}

impl EditorHost for ScriptedHost {
    fn subscribe(
        &self,
        kind: DocumentEventKind,
        callback: EventCallback,
    ) -> Result<SubscriptionId, HostError> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.handlers
            .lock()
            .map_err(|_| HostError::Unavailable)?
            .insert(id, (kind, callback));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), HostError> {
        self.handlers
            .lock()
            .map_err(|_| HostError::Unavailable)?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| HostError::Rejected(format!("unknown subscription {id:?}")))
    }
}

/// Prints the signals the tracking client would receive.
struct ConsoleClient;

impl TrackingClient for ConsoleClient {
    type Error = Infallible;

    fn record_project_opened(&self, project_path: &Path) -> Result<(), Infallible> {
        println!("project-opened  {}", project_path.display());
        Ok(())
    }

    fn record_file_activity(&self, file_path: &Path) -> Result<(), Infallible> {
        println!("file-activity   {}", file_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_key_keeps_first_four_characters() {
        assert_eq!(mask_key("secret-key"), "secr******");
    }

    #[test]
    fn mask_key_hides_short_keys_entirely() {
        assert_eq!(mask_key("abc"), "****");
    }
}
