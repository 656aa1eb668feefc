//! Editor host model.
//!
//! The engine never owns documents. It talks to whatever editor it is wired
//! into through [`EditorHost`]: which document is active, what its text and
//! selections look like right now, and an asynchronous edit application that
//! may fail (read-only document, document closed mid-flight). Undo and redo are
//! host operations too, so the engine can route them through its queue while
//! the content change itself stays out of band.
//!
//! [`Workspace`] is the in-process host used by the binary and the test
//! suites: a set of rope buffers keyed by [`DocumentId`] with per-document
//! selections, snapshot undo/redo and a read-only flag.
//!
//! Invariants (must hold after every public call):
//! * every selection of a document lies within `0..=len_chars`.
//! * `active`, when set, names an open document.
//! * a failed edit leaves buffer, selections and undo history untouched.

use async_trait::async_trait;
use core_state::DocumentId;
use core_text::{Buffer, EditBatch, Selection};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

pub mod undo;
pub use undo::{EditSnapshot, UNDO_HISTORY_MAX, UndoEngine};

/// Point-in-time copy of a document.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub buffer: Buffer,
    pub selections: Vec<Selection>,
}

impl DocumentSnapshot {
    pub fn text(&self) -> String {
        self.buffer.text()
    }

    /// First non-empty selection's text, if any.
    pub fn selected_text(&self) -> Option<String> {
        self.selections
            .iter()
            .find(|s| !s.is_empty())
            .map(|s| self.buffer.slice(s.range()))
    }
}

/// The editor platform seam.
///
/// Synchronous methods are plain reads. `apply_edit`, `undo` and `redo` are
/// suspension points: the document may disappear while they are pending, and
/// implementations report that as `false` rather than an error.
#[async_trait]
pub trait EditorHost: Send + Sync {
    fn active_document(&self) -> Option<DocumentId>;

    fn open_documents(&self) -> Vec<DocumentId>;

    fn snapshot(&self, id: &DocumentId) -> Option<DocumentSnapshot>;

    /// Apply every edit of `batch` or none of them.
    async fn apply_edit(&self, id: &DocumentId, batch: EditBatch) -> bool;

    async fn undo(&self, id: &DocumentId) -> bool;

    async fn redo(&self, id: &DocumentId) -> bool;
}

#[derive(Debug)]
struct Document {
    buffer: Buffer,
    selections: Vec<Selection>,
    undo: UndoEngine,
    read_only: bool,
}

#[derive(Debug, Default)]
struct WorkspaceInner {
    documents: BTreeMap<DocumentId, Document>,
    active: Option<DocumentId>,
}

#[derive(Debug, Default)]
pub struct Workspace {
    inner: Mutex<WorkspaceInner>,
    edits_applied: AtomicUsize,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, WorkspaceInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens (or replaces) a document with the caret at the end of `text`.
    /// The first document opened becomes active.
    pub fn open(&self, id: DocumentId, text: &str) {
        let buffer = Buffer::from_str(id.display_name(), text);
        let caret = Selection::caret(buffer.len_chars());
        let mut inner = self.lock();
        debug!(target: "model.workspace", doc = %id.display_name(), chars = buffer.len_chars(), "document_opened");
        inner.documents.insert(
            id.clone(),
            Document {
                buffer,
                selections: vec![caret],
                undo: UndoEngine::new(),
                read_only: false,
            },
        );
        if inner.active.is_none() {
            inner.active = Some(id);
        }
    }

    pub fn close(&self, id: &DocumentId) -> bool {
        let mut inner = self.lock();
        let removed = inner.documents.remove(id).is_some();
        if inner.active.as_ref() == Some(id) {
            inner.active = None;
        }
        removed
    }

    /// `None` clears focus. False when `id` is not open.
    pub fn set_active(&self, id: Option<DocumentId>) -> bool {
        let mut inner = self.lock();
        if let Some(id) = &id
            && !inner.documents.contains_key(id)
        {
            return false;
        }
        inner.active = id;
        true
    }

    pub fn document_ids(&self) -> Vec<DocumentId> {
        self.lock().documents.keys().cloned().collect()
    }

    /// Selections are clamped to the document.
    pub fn set_selections(&self, id: &DocumentId, selections: Vec<Selection>) -> bool {
        let mut inner = self.lock();
        let Some(doc) = inner.documents.get_mut(id) else {
            return false;
        };
        let len = doc.buffer.len_chars();
        doc.selections = selections.into_iter().map(|s| s.clamped(len)).collect();
        true
    }

    pub fn set_read_only(&self, id: &DocumentId, read_only: bool) -> bool {
        let mut inner = self.lock();
        let Some(doc) = inner.documents.get_mut(id) else {
            return false;
        };
        doc.read_only = read_only;
        true
    }

    pub fn text(&self, id: &DocumentId) -> Option<String> {
        self.lock().documents.get(id).map(|d| d.buffer.text())
    }

    pub fn selections(&self, id: &DocumentId) -> Option<Vec<Selection>> {
        self.lock().documents.get(id).map(|d| d.selections.clone())
    }

    pub fn undo_depth(&self, id: &DocumentId) -> usize {
        self.lock()
            .documents
            .get(id)
            .map_or(0, |d| d.undo.undo_depth())
    }

    /// Number of edits applied through [`EditorHost::apply_edit`].
    pub fn edits_applied(&self) -> usize {
        self.edits_applied.load(Ordering::Relaxed)
    }

    /// Out-of-band insertion at every selection, bypassing any interception.
    pub fn paste(&self, id: &DocumentId, text: &str) -> bool {
        let mut inner = self.lock();
        let Some(doc) = inner.documents.get_mut(id) else {
            return false;
        };
        let batch = EditBatch::type_over(&doc.selections, text);
        let ok = apply_to(doc, &batch);
        debug!(target: "model.workspace", doc = %id.display_name(), chars = text.chars().count(), ok, "paste");
        ok
    }
}

fn apply_to(doc: &mut Document, batch: &EditBatch) -> bool {
    if doc.read_only {
        return false;
    }
    if batch.is_noop() {
        return true;
    }
    let mut next = doc.buffer.clone();
    match next.apply(batch) {
        Ok(carets) => {
            doc.undo.push_snapshot(&doc.selections, &doc.buffer);
            doc.buffer = next;
            doc.selections = carets;
            true
        }
        Err(e) => {
            warn!(target: "model.workspace", error = %e, "edit_rejected");
            false
        }
    }
}

#[async_trait]
impl EditorHost for Workspace {
    fn active_document(&self) -> Option<DocumentId> {
        self.lock().active.clone()
    }

    fn open_documents(&self) -> Vec<DocumentId> {
        self.document_ids()
    }

    fn snapshot(&self, id: &DocumentId) -> Option<DocumentSnapshot> {
        self.lock().documents.get(id).map(|d| DocumentSnapshot {
            buffer: d.buffer.clone(),
            selections: d.selections.clone(),
        })
    }

    async fn apply_edit(&self, id: &DocumentId, batch: EditBatch) -> bool {
        // Edit application is a round trip in a real editor; give other tasks a turn.
        tokio::task::yield_now().await;
        let mut inner = self.lock();
        let Some(doc) = inner.documents.get_mut(id) else {
            trace!(target: "model.workspace", doc = %id.display_name(), "apply_edit_document_gone");
            return false;
        };
        let ok = apply_to(doc, &batch);
        if ok {
            self.edits_applied.fetch_add(1, Ordering::Relaxed);
        }
        ok
    }

    async fn undo(&self, id: &DocumentId) -> bool {
        tokio::task::yield_now().await;
        let mut inner = self.lock();
        let Some(doc) = inner.documents.get_mut(id) else {
            return false;
        };
        let Document {
            buffer,
            selections,
            undo,
            ..
        } = doc;
        undo.undo(selections, buffer)
    }

    async fn redo(&self, id: &DocumentId) -> bool {
        tokio::task::yield_now().await;
        let mut inner = self.lock();
        let Some(doc) = inner.documents.get_mut(id) else {
            return false;
        };
        let Document {
            buffer,
            selections,
            undo,
            ..
        } = doc;
        undo.redo(selections, buffer)
    }
}
