//! Collaborator-facing commands: staging, progress management, the master
//! switch and read-only queries for status displays and listings.
//!
//! Commands mutate the store directly rather than through the keystroke
//! queue; they never apply document edits, so they cannot reorder one.

use crate::Engine;
use async_trait::async_trait;
use core_events::EngineNotice;
use core_model::EditorHost;
use core_state::{DocumentId, Gate, MappingListing, MappingSummary, StatusLine};
use core_text::normalize_line_endings;
use std::sync::atomic::Ordering;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("nothing to stage: content is empty")]
    EmptyContent,
    #[error("clipboard is empty")]
    ClipboardEmpty,
    #[error("no text selected")]
    EmptySelection,
    #[error("no active document")]
    NoDocument,
}

/// System clipboard port. Reading is a suspension point.
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn read_text(&self) -> Option<String>;
}

impl<H: EditorHost> Engine<H> {
    /// Stage `text` for `doc`, replacing any previous mapping, and turn the
    /// master switch on without resyncing.
    pub fn stage_from_content(
        &self,
        doc: &DocumentId,
        text: &str,
        label: &str,
    ) -> Result<MappingSummary, CommandError> {
        let text = normalize_line_endings(text);
        let staged = self.ctx.store().with(|s| {
            if s.stage(doc, &text, label) {
                s.summary(doc)
            } else {
                None
            }
        });
        let Some(summary) = staged else {
            info!(target: "engine.command", doc = %doc.display_name(), "stage_rejected_empty");
            return Err(CommandError::EmptyContent);
        };
        info!(
            target: "engine.command",
            doc = %doc.display_name(),
            len = summary.total,
            "staged"
        );
        // A fresh mapping starts at 0; only a later keystroke resyncs it.
        self.ctx.enabled.store(true, Ordering::SeqCst);
        self.refresh();
        Ok(summary)
    }

    /// Stage the clipboard contents, labelled with the document's file name.
    pub async fn stage_from_clipboard(
        &self,
        doc: &DocumentId,
        clipboard: &dyn Clipboard,
    ) -> Result<MappingSummary, CommandError> {
        let text = clipboard.read_text().await.unwrap_or_default();
        if text.trim().is_empty() {
            warn!(target: "engine.command", doc = %doc.display_name(), "clipboard_empty");
            self.ctx
                .notify(EngineNotice::Warning(CommandError::ClipboardEmpty.to_string()));
            return Err(CommandError::ClipboardEmpty);
        }
        self.stage_from_content(doc, &text, doc.display_name())
    }

    /// Stage the active document's first non-empty selection.
    pub fn stage_from_selection(&self) -> Result<MappingSummary, CommandError> {
        let Some(doc) = self.host.active_document() else {
            return Err(CommandError::NoDocument);
        };
        let text = self
            .host
            .snapshot(&doc)
            .and_then(|snap| snap.selected_text())
            .filter(|t| !t.trim().is_empty());
        let Some(text) = text else {
            warn!(target: "engine.command", doc = %doc.display_name(), "selection_empty");
            self.ctx
                .notify(EngineNotice::Warning(CommandError::EmptySelection.to_string()));
            return Err(CommandError::EmptySelection);
        };
        self.stage_from_content(&doc, &text, doc.display_name())
    }

    pub fn reset_progress(&self, doc: &DocumentId) -> bool {
        let reset = self.ctx.store().with(|s| s.reset(doc));
        if reset {
            info!(target: "engine.command", doc = %doc.display_name(), "progress_reset");
            self.refresh();
        }
        reset
    }

    pub fn delete_mapping(&self, doc: &DocumentId) -> bool {
        let removed = self.ctx.store().with(|s| s.remove(doc));
        if removed {
            info!(target: "engine.command", doc = %doc.display_name(), "mapping_deleted");
            self.refresh();
        }
        removed
    }

    pub fn clear_all_mappings(&self) {
        self.ctx.store().with(|s| s.clear());
        info!(target: "engine.command", "mappings_cleared");
        self.refresh();
    }

    /// Flip the master switch. Turning it on resyncs open documents
    /// monotonically. Returns the new state.
    pub fn toggle_global_enable(&self) -> bool {
        let enabled = if self.ctx.enabled.load(Ordering::SeqCst) {
            self.ctx.enabled.store(false, Ordering::SeqCst);
            false
        } else {
            self.enable();
            true
        };
        info!(target: "engine.command", enabled, "global_enable_toggled");
        self.ctx.notify(EngineNotice::StatusChanged);
        enabled
    }

    pub fn mapping_summary(&self, doc: &DocumentId) -> Option<MappingSummary> {
        self.ctx.store().with(|s| s.summary(doc))
    }

    pub fn mappings(&self) -> Vec<MappingListing> {
        self.ctx.store().with(|s| s.listings())
    }

    /// Status for the active document.
    pub fn status_line(&self) -> StatusLine {
        match self.host.active_document() {
            None => StatusLine::idle(),
            Some(doc) => StatusLine::for_gate(self.ctx.gate(&doc)),
        }
    }

    pub fn gate_for_active(&self) -> Option<Gate> {
        self.host.active_document().map(|doc| self.ctx.gate(&doc))
    }

    /// Final durable write before the process exits.
    pub fn shutdown(&self) {
        let unsaved = self.ctx.store().with(|s| s.unsaved_steps());
        match self.ctx.store().with(|s| s.flush()) {
            Ok(()) => info!(target: "engine.command", unsaved, "shutdown_flushed"),
            Err(e) => warn!(target: "engine.command", error = %e, "shutdown_flush_failed"),
        }
    }

    fn refresh(&self) {
        self.ctx.notify(EngineNotice::RefreshMappings);
        self.ctx.notify(EngineNotice::StatusChanged);
    }
}
