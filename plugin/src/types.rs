//! Event and heartbeat types for DraftTrack activity tracking.
//!
//! This module defines the normalized document event produced by the
//! [`bridge`](crate::bridge) and the heartbeat schema sent to the tracking
//! backend. Heartbeats serialize to camelCase JSON.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::host::DocumentHandle;

/// Length of the random alphanumeric suffix in heartbeat IDs.
const HEARTBEAT_ID_SUFFIX_LEN: usize = 20;

/// Prefix for all heartbeat IDs.
const HEARTBEAT_ID_PREFIX: &str = "hb_";

/// The host lifecycle notifications the plugin observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentEventKind {
    Opened,
    Changed,
    Saved,
    SavedAs,
    Closing,
    ViewActivated,
}

impl DocumentEventKind {
    /// Every notification kind the bridge subscribes to.
    pub const ALL: [DocumentEventKind; 6] = [
        DocumentEventKind::Opened,
        DocumentEventKind::Changed,
        DocumentEventKind::Saved,
        DocumentEventKind::SavedAs,
        DocumentEventKind::Closing,
        DocumentEventKind::ViewActivated,
    ];
}

/// A normalized host lifecycle event.
///
/// Created inside a host callback and consumed synchronously by the
/// [`translator`](crate::translator); the borrowed document handle keeps it
/// from outliving the callback that produced it.
pub struct DocumentEvent<'a> {
    /// Which lifecycle notification fired.
    pub kind: DocumentEventKind,

    /// The document the notification refers to. Host-owned; read-only here.
    pub document: &'a dyn DocumentHandle,
}

impl fmt::Debug for DocumentEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentEvent")
            .field("kind", &self.kind)
            .field("path", &self.document.path_name())
            .finish()
    }
}

/// Classification of a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatKind {
    /// Activity on a project as a whole; consumers treat this as a session
    /// boundary marker.
    ProjectOpened,
    /// Activity on a single file within a project.
    FileActivity,
}

/// A timestamped activity record sent to the tracking backend.
///
/// Heartbeats are derived and forgotten: each one is emitted for a single
/// qualifying editor event and never stored by the plugin beyond the send
/// buffer. The backend owns cross-heartbeat deduplication and throttling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    /// Unique heartbeat identifier with format `hb_` followed by 20
    /// alphanumeric characters.
    pub id: String,

    /// Source identifier (typically the workstation this plugin runs on).
    pub source: String,

    /// Absolute path of the project or file the activity happened on.
    pub entity: String,

    /// Classification of the heartbeat.
    #[serde(rename = "type")]
    pub kind: HeartbeatKind,

    /// When the activity was observed.
    pub timestamp: DateTime<Utc>,
}

impl Heartbeat {
    /// Creates a new heartbeat stamped with the current time and a randomly
    /// generated ID.
    #[must_use]
    pub fn new(source: String, entity: String, kind: HeartbeatKind) -> Self {
        Self {
            id: generate_heartbeat_id(),
            source,
            entity,
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// Generates a unique heartbeat ID with the format `hb_` followed by 20
/// alphanumeric characters.
fn generate_heartbeat_id() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

    let mut rng = rand::rng();
    let suffix: String = (0..HEARTBEAT_ID_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();

    format!("{HEARTBEAT_ID_PREFIX}{suffix}")
}
