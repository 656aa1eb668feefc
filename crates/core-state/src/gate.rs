//! The single decision function shared by insertion, deletion, terminal and
//! status paths. Every caller evaluates the same gate instead of re-checking
//! enabled / mapped / exhausted conditions on its own.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Master switch is off.
    Disabled,
    /// No staged script for the target.
    Unmapped,
    /// Script fully consumed.
    Exhausted { len: usize },
    Live { cursor: usize, len: usize },
}

impl Gate {
    /// `progress` is `(cursor, len)` of the target's script, if it has one.
    pub fn evaluate(enabled: bool, progress: Option<(usize, usize)>) -> Self {
        if !enabled {
            return Gate::Disabled;
        }
        match progress {
            None => Gate::Unmapped,
            Some((cursor, len)) if cursor >= len => Gate::Exhausted { len },
            Some((cursor, len)) => Gate::Live { cursor, len },
        }
    }

    /// Staged content may substitute for the next keystroke.
    pub fn is_live(&self) -> bool {
        matches!(self, Gate::Live { .. })
    }

    /// A deletion may step the cursor back by one.
    pub fn can_rewind(&self) -> bool {
        match *self {
            Gate::Live { cursor, .. } => cursor > 0,
            Gate::Exhausted { len } => len > 0,
            Gate::Disabled | Gate::Unmapped => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gate::Disabled => "disabled",
            Gate::Unmapped => "unmapped",
            Gate::Exhausted { .. } => "exhausted",
            Gate::Live { .. } => "live",
        }
    }
}
