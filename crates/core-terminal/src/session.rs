//! Terminal script engine.
//!
//! Script mode: any input except backspace reveals one character of the
//! active transcript (`\n` is written as `\r\n`). Revealing the last character
//! advances to the next script and redraws the prompt on the same keypress.
//! Backspace steps the reveal cursor back by one and erases one cell.
//!
//! Passthrough mode (no scripts, or every script played): input echoes as
//! typed, Enter redraws the prompt, backspace erases only what this mode
//! echoed. Passthrough never touches script state.

use crate::sink::TerminalSink;
use core_events::{EngineNotice, Notifier};
use core_state::{Gate, ScriptListing, StoreHandle};
use tracing::{debug, info, trace, warn};

/// Cursor left one cell, then clear to end of line.
pub const ERASE_CHAR: &str = "\x1b[D\x1b[K";

/// One raw input chunk as the pseudo-terminal delivers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalInput {
    Enter,
    Backspace,
    Text(String),
}

impl TerminalInput {
    pub fn from_raw(data: &str) -> Self {
        match data {
            "\r" | "\r\n" | "\n" => TerminalInput::Enter,
            "\x7f" | "\x08" => TerminalInput::Backspace,
            other => TerminalInput::Text(other.to_string()),
        }
    }
}

struct TerminalSession {
    sink: Box<dyn TerminalSink>,
    /// Text echoed in passthrough mode since the last prompt.
    echoed: String,
}

impl TerminalSession {
    fn emit(&mut self, text: &str) {
        if let Err(e) = self.sink.write(text) {
            warn!(target: "terminal.session", error = %e, "sink_write_failed");
        }
    }
}

pub struct TerminalScriptEngine {
    store: StoreHandle,
    notifier: Notifier,
    session: Option<TerminalSession>,
}

impl TerminalScriptEngine {
    pub fn new(store: StoreHandle, notifier: Notifier) -> Self {
        Self {
            store,
            notifier,
            session: None,
        }
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Terminal sessions are opted into explicitly, so the editor master
    /// switch does not apply here; only script availability does.
    fn gate(&self) -> Gate {
        Gate::evaluate(true, self.store.with(|s| s.terminal().progress()))
    }

    /// Replaces any open session, rewinds all scripts and writes the prompt.
    pub fn open_session(&mut self, sink: Box<dyn TerminalSink>) {
        self.close_session();
        let (prompt, scripts) = self.store.with(|s| {
            s.reset_terminal_progress();
            (s.terminal().prompt().to_string(), s.terminal().scripts().len())
        });
        let mut session = TerminalSession {
            sink,
            echoed: String::new(),
        };
        session.emit(&prompt);
        self.session = Some(session);
        info!(target: "terminal.session", scripts, "session_opened");
        self.notifier.notify(EngineNotice::RefreshTerminal);
    }

    /// Safe to call with no session open.
    pub fn close_session(&mut self) {
        if self.session.take().is_some() {
            info!(target: "terminal.session", "session_closed");
        }
    }

    /// Returns false when no session is open.
    pub fn handle_input(&mut self, input: TerminalInput) -> bool {
        let gate = self.gate();
        let Some(session) = self.session.as_mut() else {
            trace!(target: "terminal.session", "input_without_session");
            return false;
        };
        if !gate.is_live() {
            passthrough(session, &self.store, input);
            return true;
        }

        if input == TerminalInput::Backspace {
            if gate.can_rewind() && self.store.with(|s| s.terminal_mut().step_back()) {
                session.emit(ERASE_CHAR);
            }
            return true;
        }

        let (reveal, prompt, index) = self.store.with(|s| {
            let reveal = s.terminal_mut().reveal_next();
            (
                reveal,
                s.terminal().prompt().to_string(),
                s.terminal().active_index(),
            )
        });
        match reveal.ch {
            Some('\n') => session.emit("\r\n"),
            Some(c) => session.emit(c.encode_utf8(&mut [0; 4])),
            None => {}
        }
        if reveal.finished_script {
            session.emit(&format!("\r\n{prompt}"));
            debug!(target: "terminal.session", next_index = index, "script_finished");
            self.notifier.notify(EngineNotice::RefreshTerminal);
        }
        true
    }

    /// Feed a raw chunk as delivered by the terminal.
    pub fn handle_raw(&mut self, data: &str) -> bool {
        self.handle_input(TerminalInput::from_raw(data))
    }

    // ---- collaborator commands -------------------------------------------

    pub fn add_script(
        &mut self,
        transcript: &str,
        label: Option<String>,
        delay_ms: u64,
    ) -> Option<String> {
        let id = self
            .store
            .with(|s| s.add_terminal_script(transcript, label, delay_ms));
        if id.is_some() {
            self.notifier.notify(EngineNotice::RefreshTerminal);
        }
        id
    }

    pub fn delete_script(&mut self, id: &str) -> bool {
        let removed = self.store.with(|s| s.remove_terminal_script(id));
        if removed {
            self.notifier.notify(EngineNotice::RefreshTerminal);
        }
        removed
    }

    pub fn reset_progress(&mut self) {
        self.store.with(|s| s.reset_terminal_progress());
        info!(target: "terminal.session", "progress_reset");
        self.notifier.notify(EngineNotice::RefreshTerminal);
    }

    pub fn clear_scripts(&mut self) {
        self.store.with(|s| s.clear_terminal_scripts());
        self.notifier.notify(EngineNotice::RefreshTerminal);
    }

    /// Returns the prompt actually stored (the default when `prompt` is empty).
    pub fn set_prompt(&mut self, prompt: &str) -> String {
        let stored = self
            .store
            .with(|s| s.set_terminal_prompt(prompt).to_string());
        self.notifier.notify(EngineNotice::RefreshTerminal);
        stored
    }

    pub fn prompt(&self) -> String {
        self.store.with(|s| s.terminal().prompt().to_string())
    }

    pub fn scripts(&self) -> Vec<ScriptListing> {
        self.store.with(|s| s.script_listings())
    }
}

fn passthrough(session: &mut TerminalSession, store: &StoreHandle, input: TerminalInput) {
    match input {
        TerminalInput::Enter => {
            session.echoed.clear();
            let prompt = store.with(|s| s.terminal().prompt().to_string());
            session.emit(&format!("\r\n{prompt}"));
        }
        TerminalInput::Backspace => {
            if session.echoed.pop().is_some() {
                session.emit(ERASE_CHAR);
            }
        }
        TerminalInput::Text(text) => {
            session.echoed.push_str(&text);
            session.emit(&text);
        }
    }
}
