//! Character and named-key translation for keyboard steps (US layout).

use super::driver::Key;
use crate::steps::{ChordKey, NamedKey};

/// A key plus whether Shift must be held around it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Stroke {
    pub key: Key,
    pub shift: bool,
}

impl Stroke {
    const fn plain(key: Key) -> Self {
        Self { key, shift: false }
    }

    const fn shifted(key: Key) -> Self {
        Self { key, shift: true }
    }
}

/// Translate one character of typed text. `None` for characters with no key
/// on the layout; those are skipped.
pub fn stroke_for_char(ch: char) -> Option<Stroke> {
    match ch {
        'a'..='z' | '0'..='9' => Some(Stroke::plain(Key::Char(ch))),
        'A'..='Z' => Some(Stroke::shifted(Key::Char(ch.to_ascii_lowercase()))),
        ' ' => Some(Stroke::plain(Key::Space)),
        '\n' => Some(Stroke::plain(Key::Enter)),
        '\t' => Some(Stroke::plain(Key::Tab)),
        '`' | '-' | '=' | '[' | ']' | '\\' | ';' | '\'' | ',' | '.' | '/' => {
            Some(Stroke::plain(Key::Char(ch)))
        }
        _ => shifted_base(ch).map(|base| Stroke::shifted(Key::Char(base))),
    }
}

/// Unshifted key that produces `ch` together with Shift.
fn shifted_base(ch: char) -> Option<char> {
    let base = match ch {
        '~' => '`',
        '!' => '1',
        '@' => '2',
        '#' => '3',
        '$' => '4',
        '%' => '5',
        '^' => '6',
        '&' => '7',
        '*' => '8',
        '(' => '9',
        ')' => '0',
        '_' => '-',
        '+' => '=',
        '{' => '[',
        '}' => ']',
        '|' => '\\',
        ':' => ';',
        '"' => '\'',
        '<' => ',',
        '>' => '.',
        '?' => '/',
        _ => return None,
    };
    Some(base)
}

impl ChordKey {
    pub fn key(self) -> Key {
        match self {
            ChordKey::A => Key::Char('a'),
            ChordKey::C => Key::Char('c'),
            ChordKey::V => Key::Char('v'),
        }
    }
}

impl NamedKey {
    /// Keys to press in order (and release in reverse).
    pub fn keys(self) -> &'static [Key] {
        match self {
            NamedKey::Enter => &[Key::Enter],
            NamedKey::Escape => &[Key::Escape],
            NamedKey::CtrlL => &[Key::Control, Key::Char('l')],
        }
    }
}
