//! Async terminal input service.
//!
//! Reads `crossterm::EventStream`, normalizes key events into
//! [`core_events::KeyEvent`] and forwards them over the shared event channel.
//! Paste payloads arrive whole (bracketed paste) and are forwarded as a single
//! [`InputEvent::Paste`] so the caller can apply them out of band.

mod async_service;
pub use async_service::AsyncInputShutdown;

use async_service::spawn_async_event_task;

use core_events::{Event, InputEvent, KeyCode, KeyEvent, KeyModifiers};
use crossterm::event::{KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyModifiers as CMods};
use tokio::task::JoinHandle;

#[inline]
pub(crate) fn log_paste_payload(payload: &str) {
    tracing::trace!(
        target: "input.paste",
        bytes = payload.len(),
        chars = payload.chars().count(),
        "paste_payload"
    );
}

/// Spawn the async input service backed by `crossterm::EventStream`.
///
/// Returns the `JoinHandle` for the background task alongside a shutdown handle
/// that can be used to request immediate termination.
pub fn spawn_async_input(
    sender: tokio::sync::mpsc::Sender<Event>,
) -> (JoinHandle<()>, AsyncInputShutdown) {
    spawn_async_event_task(sender)
}

pub(crate) fn map_mods(m: CMods) -> KeyModifiers {
    let mut out = KeyModifiers::empty();
    if m.contains(CMods::CONTROL) {
        out |= KeyModifiers::CTRL;
    }
    if m.contains(CMods::ALT) {
        out |= KeyModifiers::ALT;
    }
    if m.contains(CMods::SHIFT) {
        out |= KeyModifiers::SHIFT;
    }
    out
}

/// Keys the engines have no use for (function keys, Home/End, media keys) map to `None`.
pub(crate) fn map_code(code: CKeyCode) -> Option<KeyCode> {
    Some(match code {
        CKeyCode::Char(c) => KeyCode::Char(c),
        CKeyCode::Enter => KeyCode::Enter,
        CKeyCode::Esc => KeyCode::Esc,
        CKeyCode::Backspace => KeyCode::Backspace,
        CKeyCode::Delete => KeyCode::Delete,
        CKeyCode::Tab => KeyCode::Tab,
        CKeyCode::Up => KeyCode::Up,
        CKeyCode::Down => KeyCode::Down,
        CKeyCode::Left => KeyCode::Left,
        CKeyCode::Right => KeyCode::Right,
        _ => return None,
    })
}

pub(crate) fn map_key_event(key: &CKeyEvent) -> Option<KeyEvent> {
    let mut mods = map_mods(key.modifiers);
    let code = map_code(key.code)?;
    // Shift is already folded into the character itself.
    if matches!(code, KeyCode::Char(_)) {
        mods.remove(KeyModifiers::SHIFT);
    }
    Some(KeyEvent { code, mods })
}

#[inline]
pub(crate) fn build_key_event(key: KeyEvent) -> Event {
    Event::Input(InputEvent::Key(key))
}
