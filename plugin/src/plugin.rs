//! Plugin facade: construction, activation, and teardown.
//!
//! The host's add-in entry point owns exactly one [`DraftTrackPlugin`] per
//! editor session: construct it on startup, call [`activate`] once, and call
//! [`shutdown`] once on editor shutdown. `shutdown` is the deterministic
//! teardown path; if it is skipped, `Drop` acts as a safety net that only
//! unregisters the host handlers. Finalization order relative to host-owned
//! objects is undefined, so the drop path must not flush the sender or wait
//! on its runtime.
//!
//! [`activate`]: DraftTrackPlugin::activate
//! [`shutdown`]: DraftTrackPlugin::shutdown

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::bridge::{BindingState, EditorEventBridge};
use crate::config::Config;
use crate::error::Result;
use crate::host::EditorHost;
use crate::sender::{HeartbeatSender, SenderConfig, SenderHandle};
use crate::translator::ActivityTranslator;

/// Time allowed for the final heartbeat flush on shutdown.
const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// The activity-tracking plugin for a CAD editor host.
pub struct DraftTrackPlugin<H: EditorHost> {
    bridge: EditorEventBridge<H, SenderHandle>,
    sender: HeartbeatSender,
    shut_down: bool,
}

impl<H: EditorHost> DraftTrackPlugin<H> {
    /// Wires up the sender, translator, and bridge. Does not bind to the
    /// host; call [`activate`](Self::activate) for that.
    ///
    /// # Errors
    ///
    /// Returns an error if the sender runtime cannot be started.
    pub fn new(config: &Config, host: Arc<H>) -> Result<Self> {
        let sender_config = SenderConfig::new(
            config.api_url.clone(),
            config.api_key.clone(),
            config.source_id.clone(),
        )
        .with_buffer_size(config.buffer_size)
        .with_flush_interval(Duration::from_secs(config.flush_interval_secs));

        let sender = HeartbeatSender::spawn(sender_config)?;
        let translator = Arc::new(ActivityTranslator::new(sender.handle()));
        let bridge = EditorEventBridge::new(host, translator);

        Ok(Self {
            bridge,
            sender,
            shut_down: false,
        })
    }

    /// Binds to the host's lifecycle notifications.
    ///
    /// Idempotent: a second activation is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the host's error if a registration is refused; in that case
    /// no handlers remain registered.
    pub fn activate(&mut self) -> Result<()> {
        self.bridge.bind()?;
        info!("DraftTrack plugin activated");
        Ok(())
    }

    /// Current lifecycle state of the host binding.
    #[must_use]
    pub fn binding_state(&self) -> BindingState {
        self.bridge.state()
    }

    /// Deterministic teardown: unregisters host handlers, flushes pending
    /// heartbeats, and releases the sender runtime.
    ///
    /// Call from the host command thread on editor shutdown. A second call
    /// is a no-op. Callers that need certainty of a timely flush must call
    /// this rather than rely on `Drop`.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.bridge.dispose(true);
        let undelivered = self
            .sender
            .shutdown(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS));
        if undelivered > 0 {
            warn!(undelivered, "shut down with undelivered heartbeats");
        }
        info!("DraftTrack plugin shut down");
    }
}

impl<H: EditorHost> Drop for DraftTrackPlugin<H> {
    fn drop(&mut self) {
        if self.shut_down {
            return;
        }
        // Safety-net path: host unregistration only. The sender field's own
        // drop releases the runtime without blocking.
        self.bridge.dispose(false);
    }
}
