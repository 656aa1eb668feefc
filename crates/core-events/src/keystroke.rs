//! Closed keystroke model.
//!
//! Classification happens once at the boundary: raw text payloads (as an editor
//! "type" command would deliver them) and normalized [`KeyEvent`]s both map into
//! [`Keystroke`]. Nothing downstream inspects raw strings again.

use crate::{KeyCode, KeyEvent, KeyModifiers};

/// Editing keys that never take part in substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// `\n` or `\r\n`.
    Newline,
    /// Lone `\r`.
    CarriageReturn,
    Tab,
    Backspace,
    Delete,
    Undo,
    Redo,
}

impl ControlKind {
    /// Text the platform inserts when this key falls through to default insertion.
    /// `None` for keys that are not insertions.
    pub fn default_text(self) -> Option<&'static str> {
        match self {
            ControlKind::Newline | ControlKind::CarriageReturn => Some("\n"),
            ControlKind::Tab => Some("\t"),
            ControlKind::Backspace
            | ControlKind::Delete
            | ControlKind::Undo
            | ControlKind::Redo => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Keystroke {
    Printable(char),
    /// Multi-character commit (IME, dead keys). Substitutes as one step.
    Composed(String),
    Control(ControlKind),
}

impl Keystroke {
    /// Classify a raw text payload. Returns `None` for empty input.
    pub fn from_text(text: &str) -> Option<Self> {
        match text {
            "" => None,
            "\n" | "\r\n" => Some(Keystroke::Control(ControlKind::Newline)),
            "\r" => Some(Keystroke::Control(ControlKind::CarriageReturn)),
            "\t" => Some(Keystroke::Control(ControlKind::Tab)),
            "\x7f" | "\x08" => Some(Keystroke::Control(ControlKind::Backspace)),
            _ => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Keystroke::Printable(c)),
                    _ => Some(Keystroke::Composed(text.to_string())),
                }
            }
        }
    }

    /// Classify a normalized key event. Navigation keys and unbound chords yield `None`.
    pub fn from_key_event(key: &KeyEvent) -> Option<Self> {
        if key.mods.contains(KeyModifiers::CTRL) {
            return match key.code {
                KeyCode::Char('z') | KeyCode::Char('Z') => {
                    Some(Keystroke::Control(ControlKind::Undo))
                }
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    Some(Keystroke::Control(ControlKind::Redo))
                }
                _ => None,
            };
        }
        match key.code {
            KeyCode::Char(c) => Some(Keystroke::Printable(c)),
            KeyCode::Enter => Some(Keystroke::Control(ControlKind::Newline)),
            KeyCode::Tab => Some(Keystroke::Control(ControlKind::Tab)),
            KeyCode::Backspace => Some(Keystroke::Control(ControlKind::Backspace)),
            KeyCode::Delete => Some(Keystroke::Control(ControlKind::Delete)),
            KeyCode::Esc | KeyCode::Up | KeyCode::Down | KeyCode::Left | KeyCode::Right => None,
        }
    }

    /// True for keystrokes the engine may replace with a staged character.
    pub fn is_substitution_candidate(&self) -> bool {
        matches!(self, Keystroke::Printable(_) | Keystroke::Composed(_))
    }

    /// Text inserted when the keystroke falls through to default insertion.
    pub fn typed_text(&self) -> Option<String> {
        match self {
            Keystroke::Printable(c) => Some(c.to_string()),
            Keystroke::Composed(s) => Some(s.clone()),
            Keystroke::Control(kind) => kind.default_text().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_breaks_and_tab_are_control() {
        assert_eq!(
            Keystroke::from_text("\n"),
            Some(Keystroke::Control(ControlKind::Newline))
        );
        assert_eq!(
            Keystroke::from_text("\r\n"),
            Some(Keystroke::Control(ControlKind::Newline))
        );
        assert_eq!(
            Keystroke::from_text("\r"),
            Some(Keystroke::Control(ControlKind::CarriageReturn))
        );
        assert_eq!(
            Keystroke::from_text("\t"),
            Some(Keystroke::Control(ControlKind::Tab))
        );
    }

    #[test]
    fn single_and_multi_char_text() {
        assert_eq!(Keystroke::from_text("q"), Some(Keystroke::Printable('q')));
        assert_eq!(Keystroke::from_text("é"), Some(Keystroke::Printable('é')));
        assert_eq!(
            Keystroke::from_text("你好"),
            Some(Keystroke::Composed("你好".into()))
        );
        assert_eq!(Keystroke::from_text(""), None);
    }

    #[test]
    fn key_events_map_to_keystrokes() {
        assert_eq!(
            Keystroke::from_key_event(&KeyEvent::plain(KeyCode::Char('a'))),
            Some(Keystroke::Printable('a'))
        );
        assert_eq!(
            Keystroke::from_key_event(&KeyEvent::ctrl('z')),
            Some(Keystroke::Control(ControlKind::Undo))
        );
        assert_eq!(
            Keystroke::from_key_event(&KeyEvent::plain(KeyCode::Delete)),
            Some(Keystroke::Control(ControlKind::Delete))
        );
        assert_eq!(Keystroke::from_key_event(&KeyEvent::ctrl('q')), None);
        assert_eq!(
            Keystroke::from_key_event(&KeyEvent::plain(KeyCode::Left)),
            None
        );
    }

    #[test]
    fn only_printable_input_substitutes() {
        assert!(Keystroke::Printable('x').is_substitution_candidate());
        assert!(Keystroke::Composed("ab".into()).is_substitution_candidate());
        assert!(!Keystroke::Control(ControlKind::Tab).is_substitution_candidate());
        assert_eq!(
            Keystroke::Control(ControlKind::CarriageReturn).typed_text(),
            Some("\n".to_string())
        );
        assert_eq!(Keystroke::Control(ControlKind::Undo).typed_text(), None);
    }
}
