//! Rope-backed text buffer abstraction.
//!
//! Every offset in this crate is a *character* offset (Unicode scalar values),
//! the same unit staged scripts are indexed by. Edits are expressed as an
//! [`EditBatch`] with one [`TextEdit`] per selection and applied atomically:
//! either every edit lands or the buffer is untouched.

use ropey::Rope;
use std::ops::Range;

mod edit;
mod selection;

pub use edit::{EditBatch, EditError, TextEdit};
pub use selection::Selection;

/// A text buffer backed by a `ropey::Rope`.
#[derive(Debug, Clone)]
pub struct Buffer {
    rope: Rope,
    pub name: String,
}

impl Buffer {
    /// Construct a buffer from an in-memory string slice.
    pub fn from_str(name: impl Into<String>, content: &str) -> Self {
        Self {
            rope: Rope::from_str(content),
            name: name.into(),
        }
    }

    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Full buffer content.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.rope.chars()
    }

    pub fn char_at(&self, idx: usize) -> Option<char> {
        if idx < self.rope.len_chars() {
            Some(self.rope.char(idx))
        } else {
            None
        }
    }

    /// Characters in `[start, end)`, clamped to the buffer.
    pub fn slice(&self, range: Range<usize>) -> String {
        let len = self.rope.len_chars();
        let start = range.start.min(len);
        let end = range.end.min(len);
        if start >= end {
            return String::new();
        }
        self.rope.slice(start..end).to_string()
    }

    /// Total number of lines in the buffer.
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Return the requested line as an owned `String` (including trailing newline if present).
    pub fn line(&self, idx: usize) -> Option<String> {
        if idx < self.rope.len_lines() {
            Some(self.rope.line(idx).to_string())
        } else {
            None
        }
    }

    /// (line, column) of a character offset, both zero based. Offsets past the end clamp.
    pub fn line_col(&self, char_idx: usize) -> (usize, usize) {
        let idx = char_idx.min(self.rope.len_chars());
        let line = self.rope.char_to_line(idx);
        (line, idx - self.rope.line_to_char(line))
    }

    /// Apply `batch` atomically and return the collapsed caret for each surviving edit,
    /// in ascending document order.
    ///
    /// Edits with identical ranges (two carets at the same spot) are merged. Any edit
    /// out of range or overlapping another rejects the whole batch.
    pub fn apply(&mut self, batch: &EditBatch) -> Result<Vec<Selection>, EditError> {
        let len = self.rope.len_chars();
        let mut order: Vec<&TextEdit> = batch.edits().iter().collect();
        order.sort_by_key(|e| (e.range.start, e.range.end));
        order.dedup_by(|later, earlier| later.range == earlier.range);

        for e in &order {
            if e.range.start > e.range.end || e.range.end > len {
                return Err(EditError::OutOfRange {
                    start: e.range.start,
                    end: e.range.end,
                    len,
                });
            }
        }
        for pair in order.windows(2) {
            if pair[0].range.end > pair[1].range.start {
                return Err(EditError::Overlap {
                    at: pair[1].range.start,
                });
            }
        }

        for e in order.iter().rev() {
            if !e.range.is_empty() {
                self.rope.remove(e.range.clone());
            }
            if !e.text.is_empty() {
                self.rope.insert(e.range.start, &e.text);
            }
        }

        let mut carets = Vec::with_capacity(order.len());
        let mut shift: isize = 0;
        for e in &order {
            let inserted = e.text.chars().count();
            let start = (e.range.start as isize + shift) as usize;
            carets.push(Selection::caret(start + inserted));
            shift += inserted as isize - e.range.len() as isize;
        }
        Ok(carets)
    }
}

/// Convert CRLF / lone CR line endings to LF.
pub fn normalize_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}
