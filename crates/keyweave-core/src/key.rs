// Keyweave Key Type
// Canonical key names and the static tables that produce them

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Canonical, platform-independent name of a logical key.
///
/// Printable keys are reduced to their unshifted base character
/// (`"A"` and `"a"` are both `a`, `"!"` is `1`), named keys use the
/// UI Events spelling (`Enter`, `ArrowLeft`, `Control`), and the space bar
/// is `Space`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    /// Wrap an already-canonical name without further normalization.
    pub fn new(name: impl Into<String>) -> Self {
        Key(name.into())
    }

    /// Resolve a user-facing key name (as written in pattern files) to its
    /// canonical form. Unknown names pass through unchanged.
    pub fn from_alias(name: &str) -> Self {
        let trimmed = name.trim();
        if trimmed.chars().count() == 1 {
            return Key(canonical_char(trimmed));
        }
        let lowered = trimmed.to_lowercase();
        if let Some(canonical) = alias_table().get(lowered.as_str()) {
            return Key((*canonical).to_string());
        }
        if let Some(canonical) = legacy_name_table().get(trimmed) {
            return Key((*canonical).to_string());
        }
        Key(trimmed.to_string())
    }

    /// Get the canonical name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether this is one of the four modifier keys
    pub fn is_modifier(&self) -> bool {
        crate::Modifier::from_key(self).is_some()
    }

    /// Check whether this is a lock key (CapsLock, NumLock, ScrollLock)
    pub fn is_lock(&self) -> bool {
        crate::LockKey::from_key(self).is_some()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Key {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Key::from_alias(s))
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::from_alias(name)
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Compute the canonical key for a raw notification.
///
/// `raw_key` is the layout-dependent character or name reported by the host
/// and `raw_code` the physical key identifier. When the host reports no
/// usable key value the physical code is used to derive one. Numpad keys are
/// not handled here; see [`crate::numpad`].
pub fn canonical_key(raw_key: &str, raw_code: &str) -> Key {
    if raw_key.is_empty() || raw_key == "Unidentified" || raw_key == "Dead" {
        return match name_for_code(raw_code) {
            Some(name) => Key(name.to_string()),
            None => Key(raw_code.to_string()),
        };
    }
    if raw_key.chars().count() == 1 {
        return Key(canonical_char(raw_key));
    }
    match legacy_name_table().get(raw_key) {
        Some(name) => Key((*name).to_string()),
        None => Key(raw_key.to_string()),
    }
}

/// Canonical physical code; legacy spellings are rewritten, everything else
/// passes through.
pub fn canonical_code(raw_code: &str) -> String {
    match raw_code {
        "OSLeft" => "MetaLeft".to_string(),
        "OSRight" => "MetaRight".to_string(),
        other => other.to_string(),
    }
}

/// Unshifted base character for a shifted digit or punctuation key.
///
/// Assumes a US physical layout; other layouts produce characters that are
/// not in the table and pass through unchanged.
pub fn shifted_base(c: char) -> Option<char> {
    let base = match c {
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
        '~' => '`',
        _ => return None,
    };
    Some(base)
}

/// Key name derived from a physical code alone (`KeyA` -> `a`).
pub fn name_for_code(code: &str) -> Option<&'static str> {
    code_table().get(code).copied()
}

fn canonical_char(s: &str) -> String {
    let Some(c) = s.chars().next() else {
        return String::new();
    };
    if c == ' ' {
        return "Space".to_string();
    }
    if let Some(base) = shifted_base(c) {
        return base.to_string();
    }
    c.to_lowercase().collect()
}

fn legacy_name_table() -> &'static HashMap<&'static str, &'static str> {
    static LEGACY: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    LEGACY.get_or_init(|| {
        HashMap::from([
            ("Esc", "Escape"),
            ("Left", "ArrowLeft"),
            ("Right", "ArrowRight"),
            ("Up", "ArrowUp"),
            ("Down", "ArrowDown"),
            ("Del", "Delete"),
            ("OS", "Meta"),
            ("Win", "Meta"),
            ("Super", "Meta"),
            ("Hyper", "Meta"),
            ("Spacebar", "Space"),
            ("Apps", "ContextMenu"),
            ("Scroll", "ScrollLock"),
            ("Crsel", "CrSel"),
            ("Exsel", "ExSel"),
            ("MozPrintableKey", "Unidentified"),
        ])
    })
}

fn alias_table() -> &'static HashMap<&'static str, &'static str> {
    static ALIASES: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    ALIASES.get_or_init(|| {
        HashMap::from([
            ("ctrl", "Control"),
            ("control", "Control"),
            ("shift", "Shift"),
            ("alt", "Alt"),
            ("opt", "Alt"),
            ("option", "Alt"),
            ("meta", "Meta"),
            ("cmd", "Meta"),
            ("command", "Meta"),
            ("super", "Meta"),
            ("win", "Meta"),
            ("esc", "Escape"),
            ("escape", "Escape"),
            ("space", "Space"),
            ("spacebar", "Space"),
            ("enter", "Enter"),
            ("return", "Enter"),
            ("tab", "Tab"),
            ("backspace", "Backspace"),
            ("delete", "Delete"),
            ("del", "Delete"),
            ("insert", "Insert"),
            ("home", "Home"),
            ("end", "End"),
            ("pageup", "PageUp"),
            ("pagedown", "PageDown"),
            ("left", "ArrowLeft"),
            ("right", "ArrowRight"),
            ("up", "ArrowUp"),
            ("down", "ArrowDown"),
            ("arrowleft", "ArrowLeft"),
            ("arrowright", "ArrowRight"),
            ("arrowup", "ArrowUp"),
            ("arrowdown", "ArrowDown"),
            ("capslock", "CapsLock"),
            ("numlock", "NumLock"),
            ("scrolllock", "ScrollLock"),
            ("clear", "Clear"),
        ])
    })
}

fn code_table() -> &'static HashMap<&'static str, &'static str> {
    static CODES: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    CODES.get_or_init(|| {
        #[rustfmt::skip]
        const LETTERS: [(&str, &str); 26] = [
            ("KeyA", "a"), ("KeyB", "b"), ("KeyC", "c"), ("KeyD", "d"),
            ("KeyE", "e"), ("KeyF", "f"), ("KeyG", "g"), ("KeyH", "h"),
            ("KeyI", "i"), ("KeyJ", "j"), ("KeyK", "k"), ("KeyL", "l"),
            ("KeyM", "m"), ("KeyN", "n"), ("KeyO", "o"), ("KeyP", "p"),
            ("KeyQ", "q"), ("KeyR", "r"), ("KeyS", "s"), ("KeyT", "t"),
            ("KeyU", "u"), ("KeyV", "v"), ("KeyW", "w"), ("KeyX", "x"),
            ("KeyY", "y"), ("KeyZ", "z"),
        ];
        #[rustfmt::skip]
        const DIGITS: [(&str, &str); 10] = [
            ("Digit0", "0"), ("Digit1", "1"), ("Digit2", "2"), ("Digit3", "3"),
            ("Digit4", "4"), ("Digit5", "5"), ("Digit6", "6"), ("Digit7", "7"),
            ("Digit8", "8"), ("Digit9", "9"),
        ];
        #[rustfmt::skip]
        const FUNCTION: [(&str, &str); 12] = [
            ("F1", "F1"), ("F2", "F2"), ("F3", "F3"), ("F4", "F4"),
            ("F5", "F5"), ("F6", "F6"), ("F7", "F7"), ("F8", "F8"),
            ("F9", "F9"), ("F10", "F10"), ("F11", "F11"), ("F12", "F12"),
        ];
        const NAMED: [(&str, &str); 37] = [
            ("Minus", "-"),
            ("Equal", "="),
            ("BracketLeft", "["),
            ("BracketRight", "]"),
            ("Backslash", "\\"),
            ("Semicolon", ";"),
            ("Quote", "'"),
            ("Backquote", "`"),
            ("Comma", ","),
            ("Period", "."),
            ("Slash", "/"),
            ("Space", "Space"),
            ("Enter", "Enter"),
            ("Tab", "Tab"),
            ("Escape", "Escape"),
            ("Backspace", "Backspace"),
            ("Delete", "Delete"),
            ("Insert", "Insert"),
            ("Home", "Home"),
            ("End", "End"),
            ("PageUp", "PageUp"),
            ("PageDown", "PageDown"),
            ("ArrowLeft", "ArrowLeft"),
            ("ArrowRight", "ArrowRight"),
            ("ArrowUp", "ArrowUp"),
            ("ArrowDown", "ArrowDown"),
            ("ShiftLeft", "Shift"),
            ("ShiftRight", "Shift"),
            ("ControlLeft", "Control"),
            ("ControlRight", "Control"),
            ("AltLeft", "Alt"),
            ("AltRight", "Alt"),
            ("MetaLeft", "Meta"),
            ("MetaRight", "Meta"),
            ("CapsLock", "CapsLock"),
            ("NumLock", "NumLock"),
            ("ScrollLock", "ScrollLock"),
        ];
        let mut map = HashMap::new();
        map.extend(LETTERS);
        map.extend(DIGITS);
        map.extend(FUNCTION);
        map.extend(NAMED);
        map.insert("OSLeft", "Meta");
        map.insert("OSRight", "Meta");
        map.insert("ContextMenu", "ContextMenu");
        map
    })
}
