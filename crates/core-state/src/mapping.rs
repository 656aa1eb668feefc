use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a document (for files: the URI or canonical path), never
/// an in-memory handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, used as the default label.
    pub fn display_name(&self) -> &str {
        self.0
            .rsplit(|c: char| c == '/' || c == '\\')
            .find(|s| !s.is_empty())
            .unwrap_or(self.0.as_str())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Stepped { cursor: usize, len: usize },
    /// Cursor already sat at the end; nothing consumed.
    Boundary,
}

/// Staged characters for one document plus the index of the next one to reveal.
///
/// Invariant: `cursor <= staged.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedMapping {
    staged: Vec<char>,
    cursor: usize,
    label: String,
    completion_signalled: bool,
}

impl StagedMapping {
    /// `None` when `text` is empty or whitespace only.
    pub fn new(text: &str, label: impl Into<String>) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }
        Some(Self {
            staged: text.chars().collect(),
            cursor: 0,
            label: label.into(),
            completion_signalled: false,
        })
    }

    pub(crate) fn restored(text: &str, cursor: usize, label: String) -> Option<Self> {
        let mut mapping = Self::new(text, label)?;
        mapping.cursor = cursor.min(mapping.staged.len());
        mapping.completion_signalled = mapping.cursor == mapping.staged.len();
        Some(mapping)
    }

    pub fn staged(&self) -> &[char] {
        &self.staged
    }

    pub fn staged_text(&self) -> String {
        self.staged.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.staged.len() - self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.cursor == self.staged.len()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Staged character at the cursor, if any remain.
    pub fn next_char(&self) -> Option<char> {
        self.staged.get(self.cursor).copied()
    }

    pub(crate) fn advance(&mut self) -> Advance {
        if self.cursor >= self.staged.len() {
            return Advance::Boundary;
        }
        self.cursor += 1;
        Advance::Stepped {
            cursor: self.cursor,
            len: self.staged.len(),
        }
    }

    pub(crate) fn rewind(&mut self) -> usize {
        self.cursor = self.cursor.saturating_sub(1);
        self.cursor
    }

    pub(crate) fn reset(&mut self) {
        self.cursor = 0;
        self.completion_signalled = false;
    }

    pub(crate) fn resync_to(&mut self, index: usize) -> usize {
        self.cursor = index.min(self.staged.len());
        self.cursor
    }

    /// Returns true the first time it is called while complete.
    pub(crate) fn mark_completed(&mut self) -> bool {
        if !self.is_complete() || self.completion_signalled {
            return false;
        }
        self.completion_signalled = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_text_is_rejected() {
        assert!(StagedMapping::new("  \n\t ", "x").is_none());
        assert!(StagedMapping::new("", "x").is_none());
        assert!(StagedMapping::new(" a ", "x").is_some());
    }

    #[test]
    fn advance_stops_at_boundary() {
        let mut m = StagedMapping::new("ab", "x").unwrap();
        assert_eq!(m.advance(), Advance::Stepped { cursor: 1, len: 2 });
        assert_eq!(m.advance(), Advance::Stepped { cursor: 2, len: 2 });
        assert_eq!(m.advance(), Advance::Boundary);
        assert_eq!(m.cursor(), 2);
        assert_eq!(m.next_char(), None);
    }

    #[test]
    fn rewind_floors_at_zero() {
        let mut m = StagedMapping::new("ab", "x").unwrap();
        assert_eq!(m.rewind(), 0);
        m.advance();
        assert_eq!(m.rewind(), 0);
    }

    #[test]
    fn resync_clamps_to_length() {
        let mut m = StagedMapping::new("abc", "x").unwrap();
        assert_eq!(m.resync_to(10), 3);
        assert_eq!(m.resync_to(1), 1);
    }

    #[test]
    fn completion_marks_once_until_reset() {
        let mut m = StagedMapping::new("a", "x").unwrap();
        assert!(!m.mark_completed());
        m.advance();
        assert!(m.mark_completed());
        assert!(!m.mark_completed());
        m.reset();
        m.advance();
        assert!(m.mark_completed());
    }

    #[test]
    fn display_name_takes_last_segment() {
        assert_eq!(
            DocumentId::new("file:///home/u/demo/main.rs").display_name(),
            "main.rs"
        );
        assert_eq!(
            DocumentId::new(r"C:\work\app.ts").display_name(),
            "app.ts"
        );
        assert_eq!(DocumentId::new("scratch").display_name(), "scratch");
    }
}
