//! Undo / redo. The host restores content out of band; the cursor is left as
//! is and corrected by the exact resync of the next substitution.

use super::KeyOutcome;
use crate::Engine;
use core_events::EngineNotice;
use core_model::EditorHost;
use core_state::DocumentId;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HistoryOp {
    Undo,
    Redo,
}

pub(super) async fn handle<H: EditorHost>(
    engine: &Engine<H>,
    doc: &DocumentId,
    op: HistoryOp,
) -> KeyOutcome {
    let applied = match op {
        HistoryOp::Undo => engine.host.undo(doc).await,
        HistoryOp::Redo => engine.host.redo(doc).await,
    };
    debug!(target: "engine.history", doc = %doc.display_name(), op = ?op, applied, "history");
    if applied {
        engine.ctx.notify(EngineNotice::StatusChanged);
    }
    KeyOutcome::History { applied }
}
