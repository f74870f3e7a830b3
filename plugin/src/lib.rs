//! DraftTrack Plugin - CAD editor activity tracker.
//!
//! This crate provides the activity-observation core of the DraftTrack
//! plugin: it subscribes to a CAD editor's document lifecycle notifications
//! (open, change, save, save-as, close, view-activation) and reports design
//! activity to a time-tracking backend as heartbeats, each tagged with a
//! project path, a file path, and a timestamp.
//!
//! # Overview
//!
//! The host editor is consumed through the [`host`] traits. Each lifecycle
//! callback is normalized by the [`bridge`] into a
//! [`DocumentEvent`](types::DocumentEvent) and translated by the
//! [`translator`] into an ordered pair of tracking signals: project-opened,
//! then file-activity. The [`sender`] buffers those signals as heartbeats
//! and flushes them to the backend in the background; the host thread never
//! blocks on the network.
//!
//! A family document (a reusable component) reports its containing directory
//! as the project; every other document is its own project unit.
//!
//! # Modules
//!
//! - [`types`]: Normalized document events and the heartbeat schema
//! - [`host`]: Traits standing in for the editor's notification API
//! - [`bridge`]: Host subscription lifecycle (bind once, dispose safely)
//! - [`translator`]: Event-to-signal translation and project resolution
//! - [`sender`]: Buffered heartbeat delivery with retry
//! - [`config`]: Configuration from environment variables
//! - [`logging`]: Stderr and log-file tracing setup
//! - [`plugin`]: The facade the add-in entry point drives
//! - [`error`]: Aggregate error type for the facade boundary

pub mod bridge;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod plugin;
pub mod sender;
pub mod translator;
pub mod types;

pub use bridge::{BindingState, EditorEventBridge};
pub use config::{Config, ConfigError};
pub use error::{PluginError, Result};
pub use host::{DocumentHandle, EditorHost, EventCallback, HostError, SubscriptionId};
pub use plugin::DraftTrackPlugin;
pub use sender::{HeartbeatSender, RetryPolicy, SenderConfig, SenderError, SenderHandle};
pub use translator::{resolve_project_path, ActivityTranslator, TrackingClient};
pub use types::{DocumentEvent, DocumentEventKind, Heartbeat, HeartbeatKind};
