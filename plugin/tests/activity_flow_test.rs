//! Integration tests for the bridge-to-translator event pipeline.
//!
//! These tests drive a scripted host through the real bridge and translator
//! and assert on the exact sequence of tracking-client calls.

use std::collections::HashMap;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use drafttrack_plugin::bridge::{BindingState, EditorEventBridge};
use drafttrack_plugin::host::{
    DocumentHandle, EditorHost, EventCallback, HostError, SubscriptionId,
};
use drafttrack_plugin::translator::{ActivityTranslator, TrackingClient};
use drafttrack_plugin::types::DocumentEventKind;

// =============================================================================
// Test Helpers
// =============================================================================

/// A host document with a fixed path.
struct StubDocument {
    path: &'static str,
    family: bool,
}

impl StubDocument {
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

impl DocumentHandle for StubDocument {
    fn path_name(&self) -> String {
        self.path.to_string()
    }

    fn is_family_document(&self) -> bool {
        self.family
    }
}

/// A tracking-client call, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    ProjectOpened(PathBuf),
    FileActivity(PathBuf),
}

/// Records every call for later assertions.
#[derive(Clone, Default)]
struct RecordingClient {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingClient {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl TrackingClient for RecordingClient {
    type Error = Infallible;

    fn record_project_opened(&self, project_path: &Path) -> Result<(), Infallible> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::ProjectOpened(project_path.to_path_buf()));
        Ok(())
    }

    fn record_file_activity(&self, file_path: &Path) -> Result<(), Infallible> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::FileActivity(file_path.to_path_buf()));
        Ok(())
    }
}

/// An in-process host that dispatches emitted notifications to registered
/// handlers, like the editor's UI thread would.
#[derive(Default)]
struct MockHost {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<SubscriptionId, (DocumentEventKind, EventCallback)>>,
}

impl MockHost {
    fn emit(&self, kind: DocumentEventKind, document: Option<&dyn DocumentHandle>) {
        let handlers = self.handlers.lock().unwrap();
        for (registered_kind, callback) in handlers.values() {
            if *registered_kind == kind {
                callback(document);
            }
        }
    }

    fn handler_count(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }
}

impl EditorHost for MockHost {
    fn subscribe(
        &self,
        kind: DocumentEventKind,
        callback: EventCallback,
    ) -> Result<SubscriptionId, HostError> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.handlers.lock().unwrap().insert(id, (kind, callback));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), HostError> {
        self.handlers
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| HostError::Rejected(format!("unknown subscription {id:?}")))
    }
}

fn pipeline() -> (
    Arc<MockHost>,
    RecordingClient,
    EditorEventBridge<MockHost, RecordingClient>,
) {
    let host = Arc::new(MockHost::default());
    let client = RecordingClient::default();
    let bridge = EditorEventBridge::new(
        Arc::clone(&host),
        Arc::new(ActivityTranslator::new(client.clone())),
    );
    (host, client, bridge)
}

// =============================================================================
// Binding Lifecycle
// =============================================================================

#[test]
fn bind_registers_one_handler_per_event_kind() {
    let (host, _client, mut bridge) = pipeline();

    bridge.bind().unwrap();

    assert_eq!(host.handler_count(), 6);
    assert_eq!(bridge.state(), BindingState::Bound);
}

#[test]
fn rebind_does_not_duplicate_signal_emission() {
    let (host, client, mut bridge) = pipeline();

    bridge.bind().unwrap();
    bridge.bind().unwrap();

    let doc = StubDocument::file("/proj/model.dat");
    host.emit(DocumentEventKind::Opened, Some(&doc));

    // One subscription set: exactly one project/file pair per event.
    assert_eq!(
        client.calls(),
        vec![
            Call::ProjectOpened(PathBuf::from("/proj/model.dat")),
            Call::FileActivity(PathBuf::from("/proj/model.dat")),
        ]
    );
}

#[test]
fn unbind_removes_all_handlers_and_repeats_safely() {
    let (host, client, mut bridge) = pipeline();

    bridge.bind().unwrap();
    bridge.unbind();
    bridge.unbind();

    assert_eq!(host.handler_count(), 0);

    // Nothing listens any more.
    let doc = StubDocument::file("/proj/model.dat");
    host.emit(DocumentEventKind::Saved, Some(&doc));
    assert!(client.calls().is_empty());
}

#[test]
fn dispose_is_idempotent_across_both_paths() {
    let (host, _client, mut bridge) = pipeline();

    bridge.bind().unwrap();
    bridge.dispose(false);
    bridge.dispose(true);
    bridge.dispose(false);

    assert_eq!(host.handler_count(), 0);
    assert_eq!(bridge.state(), BindingState::Disposed);
}

#[test]
fn bind_after_dispose_is_a_noop() {
    let (host, _client, mut bridge) = pipeline();

    bridge.bind().unwrap();
    bridge.dispose(true);
    bridge.bind().unwrap();

    assert_eq!(host.handler_count(), 0);
    assert_eq!(bridge.state(), BindingState::Disposed);
}

/// A host whose registry refuses registrations past a limit and fails all
/// deregistrations, like an editor mid-teardown.
struct FlakyHost {
    inner: MockHost,
    accept_limit: usize,
    fail_unsubscribe: bool,
}

impl EditorHost for FlakyHost {
    fn subscribe(
        &self,
        kind: DocumentEventKind,
        callback: EventCallback,
    ) -> Result<SubscriptionId, HostError> {
        if self.inner.handler_count() >= self.accept_limit {
            return Err(HostError::Rejected("registry full".to_string()));
        }
        self.inner.subscribe(kind, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<(), HostError> {
        if self.fail_unsubscribe {
            return Err(HostError::Unavailable);
        }
        self.inner.unsubscribe(id)
    }
}

#[test]
fn partial_bind_rolls_back_registered_handlers() {
    let host = Arc::new(FlakyHost {
        inner: MockHost::default(),
        accept_limit: 4,
        fail_unsubscribe: false,
    });
    let client = RecordingClient::default();
    let mut bridge = EditorEventBridge::new(
        Arc::clone(&host),
        Arc::new(ActivityTranslator::new(client)),
    );

    assert!(bridge.bind().is_err());
    assert_eq!(bridge.state(), BindingState::Unbound);
    assert_eq!(host.inner.handler_count(), 0);
}

#[test]
fn dispose_never_panics_when_host_is_tearing_down() {
    let host = Arc::new(FlakyHost {
        inner: MockHost::default(),
        accept_limit: 6,
        fail_unsubscribe: true,
    });
    let client = RecordingClient::default();
    let mut bridge = EditorEventBridge::new(
        Arc::clone(&host),
        Arc::new(ActivityTranslator::new(client)),
    );

    bridge.bind().unwrap();
    // Deregistration failures are swallowed; both paths stay quiet.
    bridge.unbind();
    bridge.dispose(false);
    assert_eq!(bridge.state(), BindingState::Disposed);
}

// =============================================================================
// Event Translation Scenarios
// =============================================================================

#[test]
fn opened_document_emits_project_then_file() {
    let (host, client, mut bridge) = pipeline();
    bridge.bind().unwrap();

    let doc = StubDocument::file("/proj/model.dat");
    host.emit(DocumentEventKind::Opened, Some(&doc));

    assert_eq!(
        client.calls(),
        vec![
            Call::ProjectOpened(PathBuf::from("/proj/model.dat")),
            Call::FileActivity(PathBuf::from("/proj/model.dat")),
        ]
    );
}

#[test]
fn save_as_on_family_document_reports_parent_directory_as_project() {
    let (host, client, mut bridge) = pipeline();
    bridge.bind().unwrap();

    let doc = StubDocument::family("/lib/widgets/part1.fam");
    host.emit(DocumentEventKind::SavedAs, Some(&doc));

    assert_eq!(
        client.calls(),
        vec![
            Call::ProjectOpened(PathBuf::from("/lib/widgets")),
            Call::FileActivity(PathBuf::from("/lib/widgets/part1.fam")),
        ]
    );
}

#[test]
fn changed_event_without_document_emits_nothing() {
    let (host, client, mut bridge) = pipeline();
    bridge.bind().unwrap();

    host.emit(DocumentEventKind::Changed, None);

    assert!(client.calls().is_empty());
}

#[test]
fn document_less_events_of_every_kind_emit_nothing() {
    let (host, client, mut bridge) = pipeline();
    bridge.bind().unwrap();

    for kind in DocumentEventKind::ALL {
        host.emit(kind, None);
    }

    assert!(client.calls().is_empty());
}

#[test]
fn unsaved_document_emits_nothing() {
    let (host, client, mut bridge) = pipeline();
    bridge.bind().unwrap();

    let doc = StubDocument::file("");
    host.emit(DocumentEventKind::Changed, Some(&doc));

    assert!(client.calls().is_empty());
}

#[test]
fn every_event_kind_reports_renewed_project_activity() {
    let (host, client, mut bridge) = pipeline();
    bridge.bind().unwrap();

    let doc = StubDocument::file("/proj/model.dat");
    for kind in DocumentEventKind::ALL {
        host.emit(kind, Some(&doc));
    }

    // Project-opened is never deduplicated locally; the backend owns
    // cross-call suppression.
    let calls = client.calls();
    assert_eq!(calls.len(), 12);
    for pair in calls.chunks(2) {
        assert_eq!(pair[0], Call::ProjectOpened(PathBuf::from("/proj/model.dat")));
        assert_eq!(pair[1], Call::FileActivity(PathBuf::from("/proj/model.dat")));
    }
}

#[test]
fn out_of_order_events_resolve_fresh_per_event() {
    let (host, client, mut bridge) = pipeline();
    bridge.bind().unwrap();

    let closing = StubDocument::file("/proj/a/model.dat");
    let stray = StubDocument::file("/proj/b/other.dat");

    // A stray view activation after a close must report the document it
    // actually carries, not any remembered "current" project.
    host.emit(DocumentEventKind::Closing, Some(&closing));
    host.emit(DocumentEventKind::ViewActivated, Some(&stray));

    assert_eq!(
        client.calls(),
        vec![
            Call::ProjectOpened(PathBuf::from("/proj/a/model.dat")),
            Call::FileActivity(PathBuf::from("/proj/a/model.dat")),
            Call::ProjectOpened(PathBuf::from("/proj/b/other.dat")),
            Call::FileActivity(PathBuf::from("/proj/b/other.dat")),
        ]
    );
}

#[test]
fn events_after_unbind_emit_nothing() {
    let (host, client, mut bridge) = pipeline();
    bridge.bind().unwrap();

    let doc = StubDocument::file("/proj/model.dat");
    host.emit(DocumentEventKind::Opened, Some(&doc));
    bridge.unbind();
    host.emit(DocumentEventKind::Saved, Some(&doc));

    assert_eq!(client.calls().len(), 2);
}
