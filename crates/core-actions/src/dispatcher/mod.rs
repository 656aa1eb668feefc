//! Per-keystroke processing, run only from the drain loop.
//!
//! * `insert`  - substitution with exact resync, and default insertion
//! * `delete`  - one-step rewind plus the real backward/forward deletion
//! * `history` - undo / redo handed to the host

use crate::Engine;
use core_events::{ControlKind, Keystroke};
use core_model::EditorHost;
use core_state::DocumentId;

mod delete;
mod history;
mod insert;

use delete::Direction;
use history::HistoryOp;

/// What processing one queued keystroke did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// A staged character was inserted; `cursor` is the new cursor.
    Substituted { cursor: usize, len: usize },
    /// The keystroke's own text was inserted.
    Deferred,
    /// The host refused the edit. Cursor state is unchanged.
    Rejected,
    Deleted { rewound: bool, applied: bool },
    History { applied: bool },
    /// The document closed while the keystroke was queued.
    DocumentGone,
}

impl KeyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyOutcome::Substituted { .. } => "substituted",
            KeyOutcome::Deferred => "deferred",
            KeyOutcome::Rejected => "rejected",
            KeyOutcome::Deleted { .. } => "deleted",
            KeyOutcome::History { .. } => "history",
            KeyOutcome::DocumentGone => "document_gone",
        }
    }
}

pub(crate) async fn process<H: EditorHost>(
    engine: &Engine<H>,
    doc: &DocumentId,
    key: &Keystroke,
) -> KeyOutcome {
    if key.is_substitution_candidate() {
        return insert::substitute_or_defer(engine, doc, key).await;
    }
    match key {
        Keystroke::Control(ControlKind::Backspace) => {
            delete::handle(engine, doc, Direction::Backward).await
        }
        Keystroke::Control(ControlKind::Delete) => {
            delete::handle(engine, doc, Direction::Forward).await
        }
        Keystroke::Control(ControlKind::Undo) => {
            history::handle(engine, doc, HistoryOp::Undo).await
        }
        Keystroke::Control(ControlKind::Redo) => {
            history::handle(engine, doc, HistoryOp::Redo).await
        }
        _ => insert::default_insert(engine, doc, key).await,
    }
}
