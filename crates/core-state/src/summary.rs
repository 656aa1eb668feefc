//! Read-only views over the store used by listings and the status line.

use crate::gate::Gate;
use crate::mapping::DocumentId;

pub const MAPPING_PREVIEW_CHARS: usize = 50;
pub const SCRIPT_PREVIEW_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingSummary {
    pub document: DocumentId,
    pub label: String,
    pub cursor: usize,
    pub total: usize,
}

impl MappingSummary {
    pub fn remaining(&self) -> usize {
        self.total - self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.cursor == self.total
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingListing {
    pub summary: MappingSummary,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptListing {
    pub id: String,
    /// Stored label, or `Command N` when none was given.
    pub title: String,
    pub length: usize,
    pub preview: String,
    pub delay_ms: u64,
    pub is_current: bool,
}

/// Compact status text plus a longer tooltip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub tooltip: String,
}

impl StatusLine {
    pub fn idle() -> Self {
        Self {
            text: "ghostkeys".into(),
            tooltip: "No active document".into(),
        }
    }

    pub fn for_gate(gate: Gate) -> Self {
        match gate {
            Gate::Disabled => Self {
                text: "ghostkeys: paused".into(),
                tooltip: "Substitution is disabled".into(),
            },
            Gate::Unmapped => Self {
                text: "ghostkeys: unmapped".into(),
                tooltip: "No staged content for this document".into(),
            },
            Gate::Exhausted { len } => Self {
                text: "ghostkeys: 0 chars".into(),
                tooltip: format!("0/{len} characters remaining"),
            },
            Gate::Live { cursor, len } => Self {
                text: format!("ghostkeys: {} chars", len - cursor),
                tooltip: format!("{}/{len} characters remaining", len - cursor),
            },
        }
    }
}

/// First `max` chars with line breaks shown as `↵`, suffixed with `...` when cut.
pub fn preview(text: &str, max: usize) -> String {
    let mut out = String::new();
    let mut chars = text.chars().peekable();
    let mut taken = 0;
    while let Some(c) = chars.next() {
        if taken == max {
            out.push_str("...");
            return out;
        }
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('↵');
            }
            '\n' => out.push('↵'),
            _ => out.push(c),
        }
        taken += 1;
    }
    out
}
