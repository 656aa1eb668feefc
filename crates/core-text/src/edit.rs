//! Edit batch construction.
//!
//! Builders produce exactly one edit per input selection; a selection with
//! nothing to do (backspace at offset 0) contributes an empty no-op edit so the
//! resulting caret list still lines up with the selections.

use crate::{Buffer, Selection};
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("edit {start}..{end} exceeds buffer length {len}")]
    OutOfRange { start: usize, end: usize, len: usize },
    #[error("overlapping edits at offset {at}")]
    Overlap { at: usize },
}

/// Replace `range` with `text`. Empty range = insertion, empty text = deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Range<usize>,
    pub text: String,
}

impl TextEdit {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            range: at..at,
            text: text.into(),
        }
    }

    pub fn replace(range: Range<usize>, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }

    pub fn delete(range: Range<usize>) -> Self {
        Self {
            range,
            text: String::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.range.is_empty() && self.text.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditBatch {
    edits: Vec<TextEdit>,
}

impl EditBatch {
    pub fn new(edits: Vec<TextEdit>) -> Self {
        Self { edits }
    }

    pub fn edits(&self) -> &[TextEdit] {
        &self.edits
    }

    pub fn is_noop(&self) -> bool {
        self.edits.iter().all(TextEdit::is_noop)
    }

    /// Typed-character semantics: insert at every caret, replace every non-empty selection.
    pub fn type_over(selections: &[Selection], text: &str) -> Self {
        let edits = selections
            .iter()
            .map(|sel| {
                if sel.is_empty() {
                    TextEdit::insert(sel.head, text)
                } else {
                    TextEdit::replace(sel.range(), text)
                }
            })
            .collect();
        Self { edits }
    }

    /// Backspace semantics: remove one character left of each caret (a line break joins
    /// the line with the previous one, CRLF counts as one break) or the whole selection.
    pub fn delete_backward(buffer: &Buffer, selections: &[Selection]) -> Self {
        let len = buffer.len_chars();
        let edits = selections
            .iter()
            .map(|sel| {
                let sel = sel.clamped(len);
                if !sel.is_empty() {
                    return TextEdit::delete(sel.range());
                }
                let p = sel.head;
                if p == 0 {
                    return TextEdit::insert(0, "");
                }
                let crlf = p >= 2
                    && buffer.char_at(p - 1) == Some('\n')
                    && buffer.char_at(p - 2) == Some('\r');
                let start = if crlf { p - 2 } else { p - 1 };
                TextEdit::delete(start..p)
            })
            .collect();
        Self { edits }
    }

    /// Delete-key semantics: remove one character right of each caret (joining the next
    /// line at a line end) or the whole selection.
    pub fn delete_forward(buffer: &Buffer, selections: &[Selection]) -> Self {
        let len = buffer.len_chars();
        let edits = selections
            .iter()
            .map(|sel| {
                let sel = sel.clamped(len);
                if !sel.is_empty() {
                    return TextEdit::delete(sel.range());
                }
                let p = sel.head;
                if p >= len {
                    return TextEdit::insert(p, "");
                }
                let crlf = buffer.char_at(p) == Some('\r') && buffer.char_at(p + 1) == Some('\n');
                let end = if crlf { p + 2 } else { p + 1 };
                TextEdit::delete(p..end)
            })
            .collect();
        Self { edits }
    }
}
