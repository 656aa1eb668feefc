//! Fake shell: raw mode on the primary screen, every keypress feeds the
//! terminal script engine. Ctrl-C or Ctrl-D ends the session.

use crate::runtime::{InputPump, LoopControl, ShutdownReason, log_shutdown_stage};
use anyhow::Result;
use core_events::{Event, InputEvent, KeyCode, KeyEvent, KeyModifiers};
use core_terminal::{
    CrosstermBackend, ScreenMode, StdoutSink, TerminalInput, TerminalScriptEngine, TerminalSink,
};
use tokio::sync::mpsc;
use tracing::{info, trace};

/// What a key means to the fake shell. `None` for keys a shell would swallow.
pub fn terminal_input(key: &KeyEvent) -> Option<TerminalInput> {
    if key.mods.contains(KeyModifiers::CTRL) {
        return None;
    }
    match key.code {
        KeyCode::Enter => Some(TerminalInput::Enter),
        KeyCode::Backspace => Some(TerminalInput::Backspace),
        KeyCode::Tab => Some(TerminalInput::Text("\t".to_string())),
        KeyCode::Char(c) => Some(TerminalInput::Text(c.to_string())),
        KeyCode::Esc
        | KeyCode::Delete
        | KeyCode::Up
        | KeyCode::Down
        | KeyCode::Left
        | KeyCode::Right => None,
    }
}

pub struct ShellSession {
    scripts: TerminalScriptEngine,
}

impl ShellSession {
    pub fn new(scripts: TerminalScriptEngine) -> Self {
        Self { scripts }
    }

    pub async fn run(mut self, tx: mpsc::Sender<Event>, mut rx: mpsc::Receiver<Event>) -> Result<()> {
        let mut backend = CrosstermBackend::new(ScreenMode::Inline);
        let guard = backend.enter_guard()?;
        let mut input = InputPump::spawn(tx);
        self.scripts.open_session(Box::new(StdoutSink));
        info!(target: "runtime", scripts = self.scripts.scripts().len(), "shell_session_started");

        let mut reason = ShutdownReason::ChannelClosed;
        while let Some(event) = rx.recv().await {
            let control = match event {
                Event::Input(input) => self.handle_input(input),
                Event::Notice(notice) => {
                    trace!(target: "runtime", ?notice, "notice");
                    LoopControl::Continue
                }
                Event::Shutdown => LoopControl::Break {
                    reason: ShutdownReason::ShutdownEvent,
                },
            };
            if let LoopControl::Break { reason: r } = control {
                reason = r;
                break;
            }
        }

        rx.close();
        log_shutdown_stage(reason, "begin");
        self.scripts.close_session();
        input.stop(reason).await;
        // Leave the real prompt on a fresh line.
        let _ = StdoutSink.write("\r\n");
        drop(guard);
        log_shutdown_stage(reason, "complete");
        Ok(())
    }

    fn handle_input(&mut self, input: InputEvent) -> LoopControl {
        match input {
            InputEvent::CtrlC => LoopControl::Break {
                reason: ShutdownReason::CtrlC,
            },
            InputEvent::Key(key) if key == KeyEvent::ctrl('d') => LoopControl::Break {
                reason: ShutdownReason::Quit,
            },
            InputEvent::Key(key) => {
                if let Some(input) = terminal_input(&key) {
                    self.scripts.handle_input(input);
                }
                LoopControl::Continue
            }
            InputEvent::Paste(text) => {
                self.scripts.handle_input(TerminalInput::Text(text));
                LoopControl::Continue
            }
            InputEvent::Resize(..) => LoopControl::Continue,
        }
    }
}
