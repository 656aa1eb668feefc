//! Scripted terminal sessions and the crossterm backend they run on.
//!
//! [`TerminalScriptEngine`] is the terminal counterpart of the keystroke
//! engine: every keypress reveals the next character of the active scripted
//! transcript, and when none is left the session behaves like a plain echoing
//! line. Output goes through a [`TerminalSink`] so sessions can be driven
//! against stdout or recorded in tests.

pub mod backend;
pub mod session;
pub mod sink;

pub use backend::{CrosstermBackend, ScreenMode, TerminalBackend, TerminalGuard};
pub use session::{ERASE_CHAR, TerminalInput, TerminalScriptEngine};
pub use sink::{RecordingSink, StdoutSink, TerminalSink};
