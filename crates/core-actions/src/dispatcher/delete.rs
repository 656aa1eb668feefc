//! Deletion path. One logical deletion rewinds the staged cursor by exactly
//! one step, whatever the real deletion removes (a selection, a line join).

use super::KeyOutcome;
use crate::Engine;
use core_events::EngineNotice;
use core_model::EditorHost;
use core_state::DocumentId;
use core_text::EditBatch;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Backward,
    Forward,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Backward => "backward",
            Direction::Forward => "forward",
        }
    }
}

pub(super) async fn handle<H: EditorHost>(
    engine: &Engine<H>,
    doc: &DocumentId,
    direction: Direction,
) -> KeyOutcome {
    let ctx = &engine.ctx;
    let Some(snapshot) = engine.host.snapshot(doc) else {
        return KeyOutcome::DocumentGone;
    };

    let rewound_to = if ctx.gate(doc).can_rewind() {
        ctx.store().with(|s| s.rewind(doc))
    } else {
        None
    };
    if let Some(cursor) = rewound_to {
        trace!(target: "engine.delete", doc = %doc.display_name(), cursor, dir = direction.as_str(), "rewound");
        if cursor % ctx.settings().rewind_refresh_every == 0 {
            ctx.notify(EngineNotice::RefreshMappings);
        }
    }

    let batch = match direction {
        Direction::Backward => EditBatch::delete_backward(&snapshot.buffer, &snapshot.selections),
        Direction::Forward => EditBatch::delete_forward(&snapshot.buffer, &snapshot.selections),
    };
    let applied = engine.host.apply_edit(doc, batch).await;
    if !applied {
        // Keep the cursor where it was when the deletion never happened.
        if let Some(cursor) = rewound_to {
            ctx.store().with(|s| {
                if s.progress(doc).map(|(c, _)| c) == Some(cursor) {
                    s.advance(doc);
                }
            });
        }
        warn!(target: "engine.delete", doc = %doc.display_name(), dir = direction.as_str(), "deletion_rejected");
    }
    if rewound_to.is_some() {
        ctx.notify(EngineNotice::StatusChanged);
    }
    KeyOutcome::Deleted {
        rewound: rewound_to.is_some() && applied,
        applied,
    }
}
