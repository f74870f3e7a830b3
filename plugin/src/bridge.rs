//! Editor event bridge: host subscription lifecycle.
//!
//! [`EditorEventBridge`] owns the one active subscription set against the
//! host and guarantees subscribe/unsubscribe symmetry. It registers one
//! handler per [`DocumentEventKind`], normalizes each raw callback into a
//! [`DocumentEvent`], and forwards it synchronously to the translator on the
//! host's own thread.
//!
//! The lifecycle is bind-once: `Unbound -> Bound -> Disposed`, with repeated
//! `bind`, `unbind`, and `dispose` calls as no-ops. The host may re-invoke
//! activation or tear down in an unexpected order; none of those paths may
//! panic.

use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use crate::host::{DocumentHandle, EditorHost, EventCallback, HostError, SubscriptionId};
use crate::translator::{ActivityTranslator, TrackingClient};
use crate::types::{DocumentEvent, DocumentEventKind};

/// Lifecycle state of the bridge's host subscription set.
///
/// Transitions only move forward: `Unbound -> Bound -> Disposed`. A bind
/// while `Bound` or `Disposed`, and a dispose while `Disposed`, are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingState {
    /// No handlers registered yet.
    #[default]
    Unbound,
    /// All six handlers registered.
    Bound,
    /// Torn down; the bridge is never rebound.
    Disposed,
}

/// Subscribes to the host's lifecycle notifications and forwards normalized
/// events to an [`ActivityTranslator`].
pub struct EditorEventBridge<H, C> {
    host: Arc<H>,
    translator: Arc<ActivityTranslator<C>>,
    state: BindingState,
    subscriptions: Vec<SubscriptionId>,
}

impl<H, C> EditorEventBridge<H, C>
where
    H: EditorHost,
    C: TrackingClient + Send + Sync + 'static,
{
    /// Creates an unbound bridge.
    #[must_use]
    pub fn new(host: Arc<H>, translator: Arc<ActivityTranslator<C>>) -> Self {
        Self {
            host,
            translator,
            state: BindingState::default(),
            subscriptions: Vec::with_capacity(DocumentEventKind::ALL.len()),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BindingState {
        self.state
    }

    /// Registers one handler per notification kind.
    ///
    /// Idempotent: calling on a bridge that is already `Bound` or `Disposed`
    /// is a no-op, which guards against the host re-invoking activation.
    ///
    /// # Errors
    ///
    /// Returns the host's error if any registration is refused. The
    /// acquisition is all-or-nothing: handlers registered before the failure
    /// are removed again and the bridge stays `Unbound`.
    pub fn bind(&mut self) -> Result<(), HostError> {
        if self.state != BindingState::Unbound {
            debug!(state = ?self.state, "bind on a bridge that is not unbound, ignoring");
            return Ok(());
        }

        for kind in DocumentEventKind::ALL {
            let translator = Arc::clone(&self.translator);
            let callback: EventCallback = Box::new(move |document| {
                handle_notification(kind, document, &translator);
            });

            match self.host.subscribe(kind, callback) {
                Ok(id) => self.subscriptions.push(id),
                Err(e) => {
                    self.remove_subscriptions();
                    return Err(e);
                }
            }
        }

        self.state = BindingState::Bound;
        debug!(
            handlers = self.subscriptions.len(),
            "bound to host lifecycle notifications"
        );
        Ok(())
    }

    /// Removes all registered handlers, in any order.
    ///
    /// Idempotent and infallible: host deregistration failures are swallowed
    /// with a warning, since the only time the host refuses is when it is
    /// already tearing down. Does not change the lifecycle state.
    pub fn unbind(&mut self) {
        self.remove_subscriptions();
    }

    /// Tears the bridge down.
    ///
    /// `explicit` records which path reached us: `true` for the
    /// deterministic dispose invoked by the facade's shutdown, `false` for
    /// the finalization safety net. The finalization path is restricted to
    /// host unregistration; the facade releases its own resources only on
    /// the explicit path. A second dispose of either kind is a no-op.
    pub fn dispose(&mut self, explicit: bool) {
        if self.state == BindingState::Disposed {
            return;
        }

        self.unbind();
        self.state = BindingState::Disposed;
        debug!(explicit, "bridge disposed");
    }

    fn remove_subscriptions(&mut self) {
        for id in self.subscriptions.drain(..) {
            // Best effort: the host may already be tearing down.
            if let Err(e) = self.host.unsubscribe(id) {
                warn!(error = %e, ?id, "failed to remove host handler");
            }
        }
    }
}

/// Handles one raw host callback.
///
/// Document-less notifications are dropped here, before the translator sees
/// them; the host fires some notifications with no active document and that
/// is a normal state. Translator errors are logged rather than propagated:
/// the host callback signature has no error channel.
fn handle_notification<C: TrackingClient>(
    kind: DocumentEventKind,
    document: Option<&dyn DocumentHandle>,
    translator: &ActivityTranslator<C>,
) {
    let Some(document) = document else {
        trace!(?kind, "notification carried no document, dropping");
        return;
    };

    let event = DocumentEvent { kind, document };
    if let Err(e) = translator.on_event(&event) {
        error!(error = %e, ?kind, "failed to record activity");
    }
}
