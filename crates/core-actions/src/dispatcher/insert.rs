//! Insertion path: classify, resync, substitute or defer.

use super::KeyOutcome;
use crate::{Engine, ResyncPolicy, resync_locked};
use core_events::{EngineNotice, Keystroke};
use core_model::EditorHost;
use core_state::{Advance, DocumentId};
use core_text::EditBatch;
use tracing::{info, trace, warn};

pub(super) async fn substitute_or_defer<H: EditorHost>(
    engine: &Engine<H>,
    doc: &DocumentId,
    key: &Keystroke,
) -> KeyOutcome {
    let ctx = &engine.ctx;
    if !ctx.gate(doc).is_live() {
        return default_insert(engine, doc, key).await;
    }
    let Some(snapshot) = engine.host.snapshot(doc) else {
        return KeyOutcome::DocumentGone;
    };

    // Resync on the same event that substitutes so an undo since the last
    // keystroke is reflected in the character chosen now.
    let step = ctx.store().with(|s| {
        resync_locked(s, doc, snapshot.buffer.chars(), ResyncPolicy::Exact)?;
        let ch = s.get(doc)?.next_char()?;
        match s.advance(doc) {
            Advance::Stepped { cursor, len } => Some((ch, cursor, len)),
            Advance::Boundary => None,
        }
    });
    let Some((ch, cursor, len)) = step else {
        trace!(target: "engine.insert", doc = %doc.display_name(), "exhausted_after_resync");
        return default_insert(engine, doc, key).await;
    };

    let batch = EditBatch::type_over(&snapshot.selections, &ch.to_string());
    if !engine.host.apply_edit(doc, batch).await {
        let rolled_back = ctx.store().with(|s| {
            if s.progress(doc) == Some((cursor, len)) {
                s.rewind(doc);
                true
            } else {
                false
            }
        });
        warn!(
            target: "engine.insert",
            doc = %doc.display_name(),
            cursor = cursor - 1,
            rolled_back,
            "substitution_rejected"
        );
        return KeyOutcome::Rejected;
    }
    trace!(target: "engine.insert", doc = %doc.display_name(), cursor, len, "substituted");

    let complete = cursor == len;
    if complete && ctx.store().with(|s| s.mark_completed(doc)) {
        let label = ctx
            .store()
            .with(|s| s.get(doc).map(|m| m.label().to_string()))
            .unwrap_or_default();
        info!(target: "engine.insert", doc = %doc.display_name(), len, "mapping_completed");
        ctx.notify(EngineNotice::Completed {
            document: doc.as_str().to_string(),
            label,
        });
    }
    if complete || cursor % ctx.settings().refresh_every == 0 {
        ctx.notify(EngineNotice::RefreshMappings);
    }
    ctx.notify(EngineNotice::StatusChanged);
    KeyOutcome::Substituted { cursor, len }
}

/// Platform default: insert the keystroke's own text at every selection.
pub(super) async fn default_insert<H: EditorHost>(
    engine: &Engine<H>,
    doc: &DocumentId,
    key: &Keystroke,
) -> KeyOutcome {
    let Some(text) = key.typed_text() else {
        return KeyOutcome::Deferred;
    };
    let Some(snapshot) = engine.host.snapshot(doc) else {
        return KeyOutcome::DocumentGone;
    };
    let batch = EditBatch::type_over(&snapshot.selections, &text);
    if engine.host.apply_edit(doc, batch).await {
        trace!(target: "engine.insert", doc = %doc.display_name(), chars = text.chars().count(), "deferred");
        KeyOutcome::Deferred
    } else {
        warn!(target: "engine.insert", doc = %doc.display_name(), "default_insert_rejected");
        KeyOutcome::Rejected
    }
}
