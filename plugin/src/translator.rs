//! Document event to activity signal translation.
//!
//! [`ActivityTranslator`] maps a normalized [`DocumentEvent`] to calls on the
//! [`TrackingClient`] seam: first `record_project_opened` for the resolved
//! project path, then `record_file_activity` for the document path. Every
//! qualifying event kind is handled identically; the tracking backend owns
//! heartbeat-level throttling and deduplication, so the emission cadence is
//! never reduced here.
//!
//! The translator is stateless per event. Caching "the current project"
//! across events diverges from the host's true active document when
//! callbacks arrive out of order (a stray `ViewActivated` after a
//! `Closing`), so the project path is recomputed fresh for each event.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::host::DocumentHandle;
use crate::types::DocumentEvent;

/// Outbound seam to the tracking backend.
///
/// `record_project_opened` is idempotent from the caller's perspective and
/// `record_file_activity` is rate-limited by the backend; neither call is
/// suppressed or coalesced on this side.
pub trait TrackingClient {
    /// Error produced when a record cannot be accepted.
    type Error: std::error::Error;

    /// Records renewed activity on a project.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` if the client cannot accept the record.
    fn record_project_opened(&self, project_path: &Path) -> Result<(), Self::Error>;

    /// Records activity on a single file.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` if the client cannot accept the record.
    fn record_file_activity(&self, file_path: &Path) -> Result<(), Self::Error>;
}

/// Translates document events into tracking-client calls.
pub struct ActivityTranslator<C> {
    client: C,
}

impl<C: TrackingClient> ActivityTranslator<C> {
    /// Creates a translator that emits to `client`.
    #[must_use]
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Handles a single document event.
    ///
    /// Emits `record_project_opened` then `record_file_activity` for the
    /// resolved project/file pair. An event whose document has no resolvable
    /// path produces no signals; that covers brand-new unsaved documents and
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Propagates the first client error; nothing is retried here.
    pub fn on_event(&self, event: &DocumentEvent<'_>) -> Result<(), C::Error> {
        let Some(project_path) = resolve_project_path(event.document) else {
            trace!(kind = ?event.kind, "document has no resolvable path, skipping");
            return Ok(());
        };
        let file_path = PathBuf::from(event.document.path_name());

        debug!(
            kind = ?event.kind,
            project = %project_path.display(),
            file = %file_path.display(),
            "recording activity"
        );

        // Project-opened must precede file-activity within one event:
        // consumers use it as a session boundary marker.
        self.client.record_project_opened(&project_path)?;
        self.client.record_file_activity(&file_path)?;
        Ok(())
    }
}

/// Resolves the logical project root for a document.
///
/// A family document's project is its containing directory; any other
/// document is itself the project unit. Returns `None` for an empty path, or
/// for a family document whose path has no parent directory.
#[must_use]
pub fn resolve_project_path(document: &dyn DocumentHandle) -> Option<PathBuf> {
    let path_name = document.path_name();
    if path_name.is_empty() {
        return None;
    }

    let path = PathBuf::from(path_name);
    if document.is_family_document() {
        path.parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
    } else {
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentEventKind;
    use std::cell::RefCell;
    use std::convert::Infallible;

    struct StubDocument {
        path: &'static str,
        family: bool,
    }

    impl DocumentHandle for StubDocument {
        fn path_name(&self) -> String {
            self.path.to_string()
        }

        fn is_family_document(&self) -> bool {
            self.family
        }
    }

    #[derive(Default)]
    struct RecordingClient {
        calls: RefCell<Vec<String>>,
    }

    impl TrackingClient for RecordingClient {
        type Error = Infallible;

        fn record_project_opened(&self, project_path: &Path) -> Result<(), Infallible> {
            self.calls
                .borrow_mut()
                .push(format!("project:{}", project_path.display()));
            Ok(())
        }

        fn record_file_activity(&self, file_path: &Path) -> Result<(), Infallible> {
            self.calls
                .borrow_mut()
                .push(format!("file:{}", file_path.display()));
            Ok(())
        }
    }

    #[test]
    fn family_document_resolves_to_parent_directory() {
        let doc = StubDocument {
            path: "/a/b/c.fam",
            family: true,
        };
        assert_eq!(resolve_project_path(&doc), Some(PathBuf::from("/a/b")));
    }

    #[test]
    fn regular_document_resolves_to_its_own_path() {
        let doc = StubDocument {
            path: "/a/b/proj.dat",
            family: false,
        };
        assert_eq!(
            resolve_project_path(&doc),
            Some(PathBuf::from("/a/b/proj.dat"))
        );
    }

    #[test]
    fn empty_path_resolves_to_none() {
        let doc = StubDocument {
            path: "",
            family: false,
        };
        assert_eq!(resolve_project_path(&doc), None);
    }

    #[test]
    fn family_document_without_parent_resolves_to_none() {
        let doc = StubDocument {
            path: "part1.fam",
            family: true,
        };
        assert_eq!(resolve_project_path(&doc), None);
    }

    #[test]
    fn project_opened_precedes_file_activity() {
        let client = RecordingClient::default();
        let translator = ActivityTranslator::new(client);
        let doc = StubDocument {
            path: "/proj/model.dat",
            family: false,
        };

        translator
            .on_event(&DocumentEvent {
                kind: DocumentEventKind::Saved,
                document: &doc,
            })
            .unwrap();

        let calls = translator.client.calls.borrow();
        assert_eq!(
            calls.as_slice(),
            ["project:/proj/model.dat", "file:/proj/model.dat"]
        );
    }

    #[test]
    fn family_event_emits_parent_project_and_full_file_path() {
        let client = RecordingClient::default();
        let translator = ActivityTranslator::new(client);
        let doc = StubDocument {
            path: "/lib/widgets/part1.fam",
            family: true,
        };

        translator
            .on_event(&DocumentEvent {
                kind: DocumentEventKind::SavedAs,
                document: &doc,
            })
            .unwrap();

        let calls = translator.client.calls.borrow();
        assert_eq!(
            calls.as_slice(),
            ["project:/lib/widgets", "file:/lib/widgets/part1.fam"]
        );
    }

    #[test]
    fn unsaved_document_emits_nothing() {
        let client = RecordingClient::default();
        let translator = ActivityTranslator::new(client);
        let doc = StubDocument {
            path: "",
            family: false,
        };

        translator
            .on_event(&DocumentEvent {
                kind: DocumentEventKind::Changed,
                document: &doc,
            })
            .unwrap();

        assert!(translator.client.calls.borrow().is_empty());
    }

    #[test]
    fn every_event_kind_is_handled_identically() {
        let client = RecordingClient::default();
        let translator = ActivityTranslator::new(client);
        let doc = StubDocument {
            path: "/proj/model.dat",
            family: false,
        };

        for kind in DocumentEventKind::ALL {
            translator
                .on_event(&DocumentEvent {
                    kind,
                    document: &doc,
                })
                .unwrap();
        }

        // Two calls per event, project first, for all six kinds.
        let calls = translator.client.calls.borrow();
        assert_eq!(calls.len(), 12);
        for pair in calls.chunks(2) {
            assert_eq!(pair[0], "project:/proj/model.dat");
            assert_eq!(pair[1], "file:/proj/model.dat");
        }
    }
}
