use core_text::{Buffer, Selection};
use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Maximum number of snapshots retained in undo history.
pub const UNDO_HISTORY_MAX: usize = 200;

/// Whole-document snapshot: buffer clone plus the selections at capture time.
#[derive(Debug, Clone)]
pub struct EditSnapshot {
    pub buffer: Buffer,
    pub selections: Vec<Selection>,
    /// Content hash of the buffer at snapshot capture.
    pub hash: u64,
}

#[derive(Debug)]
pub struct UndoEngine {
    undo_stack: Vec<EditSnapshot>,
    redo_stack: Vec<EditSnapshot>,
    /// Count of snapshots skipped due to identical successive state.
    undo_snapshots_skipped: AtomicU64,
}

impl Default for UndoEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoEngine {
    pub fn new() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            undo_snapshots_skipped: AtomicU64::new(0),
        }
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
    pub fn snapshots_skipped(&self) -> u64 {
        self.undo_snapshots_skipped.load(Ordering::Relaxed)
    }

    /// Record the state *before* an edit. Clears redo history.
    pub fn push_snapshot(&mut self, selections: &[Selection], buffer: &Buffer) {
        let current_hash = buffer_hash(buffer);
        if let Some(last) = self.undo_stack.last()
            && last.hash == current_hash
        {
            self.undo_snapshots_skipped.fetch_add(1, Ordering::Relaxed);
            trace!(target: "model.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), hash = current_hash, "snapshot_dedupe_skip");
            return;
        }
        self.undo_stack.push(EditSnapshot {
            buffer: buffer.clone(),
            selections: selections.to_vec(),
            hash: current_hash,
        });
        trace!(target: "model.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), chars = buffer.len_chars(), hash = current_hash, "push_snapshot");
        if self.undo_stack.len() > UNDO_HISTORY_MAX {
            let _ = self.undo_stack.remove(0);
            trace!(target: "model.undo", "undo_stack_trimmed");
        }
        if !self.redo_stack.is_empty() {
            self.redo_stack.clear();
            trace!(target: "model.undo", "redo_stack_cleared_on_new_edit");
        }
    }

    pub fn undo(&mut self, selections: &mut Vec<Selection>, buffer: &mut Buffer) -> bool {
        let Some(last) = self.undo_stack.pop() else {
            return false;
        };
        trace!(target: "model.undo", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), "undo_pop");
        self.redo_stack.push(EditSnapshot {
            buffer: buffer.clone(),
            selections: selections.clone(),
            hash: buffer_hash(buffer),
        });
        *buffer = last.buffer;
        *selections = last.selections;
        true
    }

    pub fn redo(&mut self, selections: &mut Vec<Selection>, buffer: &mut Buffer) -> bool {
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        trace!(target: "model.undo", redo_depth = self.redo_stack.len(), undo_depth = self.undo_stack.len(), "redo_pop");
        self.undo_stack.push(EditSnapshot {
            buffer: buffer.clone(),
            selections: selections.clone(),
            hash: buffer_hash(buffer),
        });
        *buffer = next.buffer;
        *selections = next.selections;
        true
    }
}

fn buffer_hash(buf: &Buffer) -> u64 {
    let mut h = DefaultHasher::new();
    for i in 0..buf.line_count() {
        if let Some(l) = buf.line(i) {
            h.write(l.as_bytes());
        }
    }
    h.finish()
}
