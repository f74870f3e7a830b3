//! Host editor abstraction.
//!
//! The plugin never talks to the CAD editor's API directly; it goes through
//! the two traits here. [`EditorHost`] is the editor's lifecycle notification
//! registry and [`DocumentHandle`] is a read-only view of an open document.
//! The editor add-in entry point supplies concrete implementations backed by
//! the real host API; tests and the `simulate` CLI command supply scripted
//! ones.

use thiserror::Error;

use crate::types::DocumentEventKind;

/// A handle to a document owned by the host editor.
///
/// Handles are only ever borrowed for the duration of a single host
/// callback; the plugin reads from them and never stores them.
pub trait DocumentHandle {
    /// Absolute path of the document on disk.
    ///
    /// Empty for a document that has never been saved. The host also reports
    /// empty paths for documents in transient construction states.
    fn path_name(&self) -> String;

    /// Whether this document is a family document: a reusable component
    /// whose logical project is its containing directory rather than the
    /// file itself.
    fn is_family_document(&self) -> bool;
}

/// Identifier for a registered notification handler.
///
/// Issued by the host on [`EditorHost::subscribe`] and redeemed on
/// [`EditorHost::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Callback invoked by the host when a lifecycle notification fires.
///
/// The host may deliver `None` when no document is associated with the
/// notification; that is a normal application state, not an error.
pub type EventCallback = Box<dyn Fn(Option<&dyn DocumentHandle>) + Send + Sync>;

/// Errors surfaced by the host's notification registry.
#[derive(Error, Debug)]
pub enum HostError {
    /// The host is tearing down and can no longer service the registry.
    #[error("host notification registry is unavailable")]
    Unavailable,

    /// The host rejected a handler registration.
    #[error("registration rejected: {0}")]
    Rejected(String),
}

/// The host editor's lifecycle notification surface.
///
/// The host invokes registered callbacks on its own UI/command thread, one
/// at a time. Deregistration is commutative: handlers may be removed in any
/// order.
pub trait EditorHost {
    /// Registers `callback` for notifications of `kind`.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if the host cannot accept the registration.
    fn subscribe(
        &self,
        kind: DocumentEventKind,
        callback: EventCallback,
    ) -> Result<SubscriptionId, HostError>;

    /// Removes a previously registered handler.
    ///
    /// # Errors
    ///
    /// May fail when the host is already tearing down; callers on a teardown
    /// path treat that as best-effort.
    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), HostError>;
}
