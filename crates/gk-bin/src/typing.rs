//! Interactive typing session over one document.
//!
//! Keys are classified into keystrokes and handed to the interception engine;
//! the document is redrawn after every event. Esc or Ctrl-C quits, Ctrl-T
//! flips the master switch, Ctrl-G stages the clipboard, Ctrl-R rewinds the
//! mapping and Ctrl-V (or a terminal paste) inserts text out of band.

use crate::clipboard::SystemClipboard;
use crate::runtime::{InputPump, LoopControl, ShutdownReason, log_shutdown_stage};
use anyhow::{Context, Result};
use core_actions::{Clipboard, Engine};
use core_events::{EngineNotice, Event, InputEvent, KeyCode, KeyEvent, KeyModifiers, Keystroke};
use core_model::{EditorHost, Workspace};
use core_state::DocumentId;
use core_terminal::{CrosstermBackend, ScreenMode, TerminalBackend};
use core_text::{Buffer, Selection};
use crossterm::{
    cursor::{MoveTo, Show},
    queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Visible slice of the document plus the screen position of the primary caret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub lines: Vec<String>,
    pub cursor: (u16, u16),
}

/// Lay out `buffer` so the line holding `caret` is on screen, leaving the last
/// row for the status line. Tabs render as one space so columns stay aligned
/// with char offsets.
pub fn layout_frame(buffer: &Buffer, caret: usize, width: u16, height: u16) -> Frame {
    let rows = usize::from(height.saturating_sub(1).max(1));
    let width = usize::from(width.max(1));
    let (line, col) = buffer.line_col(caret);
    let first = (line + 1).saturating_sub(rows);
    let last = (first + rows).min(buffer.line_count());
    let lines = (first..last)
        .filter_map(|i| buffer.line(i))
        .map(|l| {
            l.trim_end_matches('\n')
                .chars()
                .map(|c| if c == '\t' { ' ' } else { c })
                .take(width)
                .collect()
        })
        .collect();
    let x = col.min(width - 1) as u16;
    let y = (line - first) as u16;
    Frame {
        lines,
        cursor: (x, y),
    }
}

pub struct TypingSession {
    engine: Engine<Workspace>,
    doc: DocumentId,
    path: PathBuf,
    write_back: bool,
    message: Option<String>,
}

impl TypingSession {
    pub fn new(engine: Engine<Workspace>, doc: DocumentId, path: PathBuf, write_back: bool) -> Self {
        Self {
            engine,
            doc,
            path,
            write_back,
            message: None,
        }
    }

    pub async fn run(mut self, tx: mpsc::Sender<Event>, mut rx: mpsc::Receiver<Event>) -> Result<()> {
        let mut backend = CrosstermBackend::new(ScreenMode::Alternate);
        backend.set_title("ghostkeys")?;
        let guard = backend.enter_guard()?;
        let mut input = InputPump::spawn(tx);
        info!(target: "runtime", doc = %self.doc.display_name(), "typing_session_started");
        self.draw_logged();

        let mut reason = ShutdownReason::ChannelClosed;
        while let Some(event) = rx.recv().await {
            let control = match event {
                Event::Input(input) => self.handle_input(input).await,
                Event::Notice(notice) => self.handle_notice(notice),
                Event::Shutdown => LoopControl::Break {
                    reason: ShutdownReason::ShutdownEvent,
                },
            };
            match control {
                LoopControl::Break { reason: r } => {
                    reason = r;
                    break;
                }
                LoopControl::Continue => self.draw_logged(),
            }
        }

        rx.close();
        log_shutdown_stage(reason, "begin");
        input.stop(reason).await;
        drop(guard);
        self.save()?;
        log_shutdown_stage(reason, "complete");
        Ok(())
    }

    async fn handle_input(&mut self, input: InputEvent) -> LoopControl {
        match input {
            InputEvent::Key(key) => self.handle_key(key).await,
            InputEvent::Paste(text) => {
                self.paste(&text);
                LoopControl::Continue
            }
            InputEvent::Resize(w, h) => {
                trace!(target: "runtime", w, h, "resize");
                LoopControl::Continue
            }
            InputEvent::CtrlC => LoopControl::Break {
                reason: ShutdownReason::CtrlC,
            },
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) -> LoopControl {
        let ctrl = key.mods.contains(KeyModifiers::CTRL);
        match key.code {
            KeyCode::Esc => {
                return LoopControl::Break {
                    reason: ShutdownReason::Quit,
                };
            }
            KeyCode::Char('t') if ctrl => {
                let state = if self.engine.toggle_global_enable() {
                    "substitution on"
                } else {
                    "substitution off"
                };
                self.message = Some(state.to_string());
            }
            KeyCode::Char('v') if ctrl => {
                if let Some(text) = SystemClipboard.read_text().await {
                    self.paste(&text);
                }
            }
            KeyCode::Char('g') if ctrl => {
                self.message = Some(
                    match self
                        .engine
                        .stage_from_clipboard(&self.doc, &SystemClipboard)
                        .await
                    {
                        Ok(summary) => format!("staged {} characters", summary.total),
                        Err(e) => e.to_string(),
                    },
                );
            }
            KeyCode::Char('r') if ctrl => {
                if self.engine.reset_progress(&self.doc) {
                    self.message = Some("progress reset".into());
                }
            }
            KeyCode::Left => self.move_carets(false),
            KeyCode::Right => self.move_carets(true),
            _ => match Keystroke::from_key_event(&key) {
                Some(stroke) => {
                    let outcome = self.engine.type_key(stroke).await;
                    trace!(target: "runtime", ?outcome, "key_typed");
                }
                None => trace!(target: "runtime", "key_ignored"),
            },
        }
        LoopControl::Continue
    }

    fn handle_notice(&mut self, notice: EngineNotice) -> LoopControl {
        match notice {
            EngineNotice::Completed { label, .. } => {
                self.message = Some(format!("{label}: all staged text typed"));
            }
            EngineNotice::Warning(w) => self.message = Some(w),
            EngineNotice::Loaded { mappings } => {
                self.message = Some(format!("{mappings} staged mapping(s) restored"));
            }
            EngineNotice::RefreshMappings
            | EngineNotice::RefreshTerminal
            | EngineNotice::StatusChanged => {}
        }
        LoopControl::Continue
    }

    fn paste(&self, text: &str) {
        let ok = self.engine.host().paste(&self.doc, text);
        debug!(target: "runtime", ok, chars = text.chars().count(), "out_of_band_paste");
    }

    fn move_carets(&self, forward: bool) {
        let host = self.engine.host();
        let Some(selections) = host.selections(&self.doc) else {
            return;
        };
        let moved = selections
            .into_iter()
            .map(|s| {
                Selection::caret(if forward {
                    s.head + 1
                } else {
                    s.head.saturating_sub(1)
                })
            })
            .collect();
        host.set_selections(&self.doc, moved);
    }

    fn status_text(&self, width: u16) -> String {
        let status = self.engine.status_line();
        let mut text = format!("{} | {}", status.text, status.tooltip);
        if let Some(msg) = &self.message {
            text.push_str(" | ");
            text.push_str(msg);
        }
        text.chars().take(usize::from(width)).collect()
    }

    fn draw_logged(&self) {
        if let Err(e) = self.draw() {
            warn!(target: "runtime", error = %e, "draw_failed");
        }
    }

    fn draw(&self) -> io::Result<()> {
        let Some(snapshot) = self.engine.host().snapshot(&self.doc) else {
            return Ok(());
        };
        let (w, h) = crossterm::terminal::size()?;
        let caret = snapshot.selections.first().map_or(0, |s| s.head);
        let frame = layout_frame(&snapshot.buffer, caret, w, h);

        let mut out = io::stdout().lock();
        queue!(out, Clear(ClearType::All))?;
        for (row, line) in frame.lines.iter().enumerate() {
            queue!(out, MoveTo(0, row as u16), Print(line))?;
        }
        queue!(
            out,
            MoveTo(0, h.saturating_sub(1)),
            SetAttribute(Attribute::Reverse),
            Print(self.status_text(w)),
            SetAttribute(Attribute::Reset),
            MoveTo(frame.cursor.0, frame.cursor.1),
            Show
        )?;
        out.flush()
    }

    fn save(&self) -> Result<()> {
        if !self.write_back {
            return Ok(());
        }
        let Some(text) = self.engine.host().text(&self.doc) else {
            return Ok(());
        };
        std::fs::write(&self.path, &text)
            .with_context(|| format!("writing {}", self.path.display()))?;
        info!(target: "runtime", path = %self.path.display(), chars = text.chars().count(), "document_saved");
        Ok(())
    }
}
