//! Scripted terminal transcripts and the two cursors that walk them.

/// One scripted command: its transcript is revealed a character per keypress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalScript {
    id: String,
    label: String,
    transcript: Vec<char>,
    delay_ms: u64,
}

impl TerminalScript {
    pub(crate) fn from_parts(id: String, label: String, transcript: &str, delay_ms: u64) -> Self {
        Self {
            id,
            label,
            transcript: transcript.chars().collect(),
            delay_ms,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn transcript(&self) -> &[char] {
        &self.transcript
    }

    pub fn transcript_text(&self) -> String {
        self.transcript.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }
}

/// Result of revealing one step of the active script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reveal {
    pub ch: Option<char>,
    /// The active script finished with this step and the next one became active.
    pub finished_script: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalScripts {
    scripts: Vec<TerminalScript>,
    active_index: usize,
    reveal_cursor: usize,
    prompt: String,
}

impl TerminalScripts {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            scripts: Vec::new(),
            active_index: 0,
            reveal_cursor: 0,
            prompt: prompt.into(),
        }
    }

    pub(crate) fn restored(scripts: Vec<TerminalScript>, prompt: String) -> Self {
        Self {
            scripts,
            active_index: 0,
            reveal_cursor: 0,
            prompt,
        }
    }

    pub fn scripts(&self) -> &[TerminalScript] {
        &self.scripts
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn reveal_cursor(&self) -> usize {
        self.reveal_cursor
    }

    /// The script currently being revealed, `None` once every script has played.
    pub fn active(&self) -> Option<&TerminalScript> {
        self.scripts.get(self.active_index)
    }

    /// `(reveal_cursor, transcript_len)` of the active script.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.active().map(|s| (self.reveal_cursor, s.len()))
    }

    pub fn rewind_all(&mut self) {
        self.active_index = 0;
        self.reveal_cursor = 0;
    }

    /// Undo one revealed character. False when nothing of the active script is shown.
    pub fn step_back(&mut self) -> bool {
        if self.active().is_none() || self.reveal_cursor == 0 {
            return false;
        }
        self.reveal_cursor -= 1;
        true
    }

    pub fn reveal_next(&mut self) -> Reveal {
        let Some(script) = self.scripts.get(self.active_index) else {
            return Reveal {
                ch: None,
                finished_script: false,
            };
        };
        let len = script.len();
        let ch = script.transcript.get(self.reveal_cursor).copied();
        if ch.is_some() {
            self.reveal_cursor += 1;
        }
        let finished_script = self.reveal_cursor >= len;
        if finished_script {
            self.active_index += 1;
            self.reveal_cursor = 0;
        }
        Reveal {
            ch,
            finished_script,
        }
    }

    pub(crate) fn push(&mut self, script: TerminalScript) {
        self.scripts.push(script);
    }

    pub(crate) fn remove(&mut self, id: &str) -> bool {
        let Some(idx) = self.scripts.iter().position(|s| s.id == id) else {
            return false;
        };
        self.scripts.remove(idx);
        if idx == self.active_index {
            self.reveal_cursor = 0;
        }
        if self.active_index >= self.scripts.len() {
            self.active_index = self.scripts.len().saturating_sub(1);
        }
        true
    }

    pub(crate) fn clear(&mut self) {
        self.scripts.clear();
        self.rewind_all();
    }

    pub(crate) fn set_prompt(&mut self, prompt: String) {
        self.prompt = prompt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scripts(items: &[&str]) -> TerminalScripts {
        let mut t = TerminalScripts::new("$ ");
        for (i, body) in items.iter().enumerate() {
            t.push(TerminalScript::from_parts(
                format!("id{i}"),
                String::new(),
                body,
                0,
            ));
        }
        t
    }

    #[test]
    fn reveal_walks_scripts_in_order() {
        let mut t = scripts(&["ab", "c"]);
        assert_eq!(
            t.reveal_next(),
            Reveal {
                ch: Some('a'),
                finished_script: false
            }
        );
        assert_eq!(
            t.reveal_next(),
            Reveal {
                ch: Some('b'),
                finished_script: true
            }
        );
        assert_eq!(t.active_index(), 1);
        assert_eq!(t.reveal_cursor(), 0);
        assert!(t.reveal_next().finished_script);
        assert!(t.active().is_none());
        assert_eq!(t.reveal_next().ch, None);
    }

    #[test]
    fn step_back_floors_at_zero() {
        let mut t = scripts(&["ab"]);
        assert!(!t.step_back());
        t.reveal_next();
        assert!(t.step_back());
        assert_eq!(t.reveal_cursor(), 0);
    }

    #[test]
    fn removing_active_script_clamps_index() {
        let mut t = scripts(&["a", "bc"]);
        t.reveal_next();
        t.reveal_next();
        assert_eq!((t.active_index(), t.reveal_cursor()), (1, 1));
        assert!(t.remove("id1"));
        assert_eq!((t.active_index(), t.reveal_cursor()), (0, 0));
        assert!(!t.remove("missing"));
        assert!(t.remove("id0"));
        assert_eq!(t.active_index(), 0);
        assert!(t.active().is_none());
    }
}
