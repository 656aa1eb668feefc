//! Core event types and channel helpers for ghostkeys.
//!
//! Raw terminal input is normalized into [`KeyEvent`] by `core-input`, then
//! classified exactly once into a closed [`Keystroke`] at the boundary of the
//! interception engine. Engine side effects that the presentation shell cares
//! about (completion, refresh hints, warnings) travel back as [`EngineNotice`]
//! over the same bounded channel.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;

mod keystroke;
pub use keystroke::{ControlKind, Keystroke};

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Input and notices share one bounded mpsc channel sized by `EVENT_CHANNEL_CAP`. The input task
// awaits `send` (natural backpressure, keystrokes are never dropped). Notices are produced from
// synchronous engine code and use `try_send`; a full or closed channel only loses the hint, never
// engine state, and is counted in `NOTICE_SEND_FAILURES`.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 8192;

pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static NOTICE_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static KEYPRESS_TOTAL: AtomicU64 = AtomicU64::new(0);
pub static KEYPRESS_REPEAT: AtomicU64 = AtomicU64::new(0);
pub static PASTE_SESSIONS: AtomicU64 = AtomicU64::new(0);
pub static PASTE_BYTES: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STARTS: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_SIGNAL: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_CHANNEL: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_STREAM: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_ERROR: AtomicU64 = AtomicU64::new(0);

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone)]
pub enum Event {
    Input(InputEvent),
    Notice(EngineNotice),
    Shutdown,
}

/// Normalized terminal input.
#[derive(Debug, Clone)]
pub enum InputEvent {
    Key(KeyEvent),
    /// Terminal resize (columns, rows).
    Resize(u16, u16),
    /// Bracketed paste payload. Never logged verbatim.
    Paste(String),
    CtrlC,
}

/// Out-of-band hints from the engines to whatever presentation layer is listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineNotice {
    /// A staged mapping was consumed to its end. Fires once per staging lifetime.
    Completed { document: String, label: String },
    /// Mapping progress moved enough that list views should redraw.
    RefreshMappings,
    /// Terminal script list or its current marker changed.
    RefreshTerminal,
    /// Enable flag or active-document progress changed; status text is stale.
    StatusChanged,
    /// Mappings restored from durable storage at startup.
    Loaded { mappings: usize },
    Warning(String),
}

/// Fire-and-forget notice publisher.
///
/// A detached notifier (no channel) silently discards notices, which is what
/// unit tests and headless CLI commands want.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<Sender<Event>>,
}

impl Notifier {
    pub fn new(tx: Sender<Event>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn detached() -> Self {
        Self { tx: None }
    }

    pub fn notify(&self, notice: EngineNotice) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(Event::Notice(notice)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                NOTICE_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(target: "runtime.events", "notice_dropped_full");
            }
            Err(TrySendError::Closed(_)) => {
                NOTICE_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(target: "runtime.events", "notice_dropped_closed");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

impl KeyEvent {
    pub fn plain(code: KeyCode) -> Self {
        Self {
            code,
            mods: KeyModifiers::empty(),
        }
    }

    pub fn ctrl(c: char) -> Self {
        Self {
            code: KeyCode::Char(c),
            mods: KeyModifiers::CTRL,
        }
    }
}

/// Normalized logical key representations consumed by higher layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Enter,
    Esc,
    Backspace,
    Delete,
    Tab,
    Up,
    Down,
    Left,
    Right,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct KeyModifiers: u8 {
        const CTRL = 0b0000_0001;
        const ALT  = 0b0000_0010;
        const SHIFT= 0b0000_0100;
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{:?}", self.code, self.mods)
    }
}
