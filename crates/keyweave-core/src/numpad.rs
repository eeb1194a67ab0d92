// Keyweave Numpad Table
// Dual-mode numpad mapping driven by NumLock state at event time

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::Key;

/// How a numpad key was interpreted for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumpadMode {
    /// NumLock on: digit or decimal point
    Digit,
    /// NumLock off: navigation/editing key
    Navigation,
    /// Operator keys, identical in both modes
    Operator,
}

/// Numpad classification attached to a normalized event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumpadDetail {
    /// Digit value, present for `Numpad0`..`Numpad9` in digit mode
    pub digit: Option<u8>,
    /// Navigation key the physical key stands for when NumLock is off
    pub navigation: Option<Key>,
    /// Interpretation chosen for this event
    pub mode: NumpadMode,
    /// NumLock state the interpretation was based on
    pub num_lock: bool,
}

#[derive(Debug, Clone, Copy)]
struct NumpadEntry {
    /// Key produced with NumLock on (or always, for operators)
    primary: &'static str,
    /// Key produced with NumLock off
    navigation: Option<&'static str>,
}

fn numpad_table() -> &'static HashMap<&'static str, NumpadEntry> {
    static NUMPAD: OnceLock<HashMap<&'static str, NumpadEntry>> = OnceLock::new();
    NUMPAD.get_or_init(|| {
        let dual = |primary: &'static str, navigation: &'static str| NumpadEntry {
            primary,
            navigation: Some(navigation),
        };
        let operator = |primary: &'static str| NumpadEntry {
            primary,
            navigation: None,
        };
        HashMap::from([
            ("Numpad0", dual("0", "Insert")),
            ("Numpad1", dual("1", "End")),
            ("Numpad2", dual("2", "ArrowDown")),
            ("Numpad3", dual("3", "PageDown")),
            ("Numpad4", dual("4", "ArrowLeft")),
            ("Numpad5", dual("5", "Clear")),
            ("Numpad6", dual("6", "ArrowRight")),
            ("Numpad7", dual("7", "Home")),
            ("Numpad8", dual("8", "ArrowUp")),
            ("Numpad9", dual("9", "PageUp")),
            ("NumpadDecimal", dual(".", "Delete")),
            ("NumpadAdd", operator("+")),
            ("NumpadSubtract", operator("-")),
            ("NumpadMultiply", operator("*")),
            ("NumpadDivide", operator("/")),
            ("NumpadEnter", operator("Enter")),
            ("NumpadEqual", operator("=")),
            ("NumpadComma", operator(",")),
        ])
    })
}

/// Check whether a physical code belongs to the numeric keypad
pub fn is_numpad_code(code: &str) -> bool {
    numpad_table().contains_key(code)
}

/// Classify a numpad key under the given NumLock state.
///
/// Returns the canonical key plus the detail record, or `None` when the code
/// is not a numpad key.
pub fn classify(code: &str, num_lock: bool) -> Option<(Key, NumpadDetail)> {
    let entry = numpad_table().get(code)?;
    let navigation = entry.navigation.map(Key::new);
    let (key, mode) = match entry.navigation {
        None => (entry.primary, NumpadMode::Operator),
        Some(_) if num_lock => (entry.primary, NumpadMode::Digit),
        Some(nav) => (nav, NumpadMode::Navigation),
    };
    let digit = match mode {
        NumpadMode::Digit => entry.primary.parse::<u8>().ok(),
        _ => None,
    };
    Some((
        Key::new(key),
        NumpadDetail {
            digit,
            navigation,
            mode,
            num_lock,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numpad_four_with_numlock_on_is_digit() {
        let (key, detail) = classify("Numpad4", true).unwrap();
        assert_eq!(key.as_str(), "4");
        assert_eq!(detail.digit, Some(4));
        assert_eq!(detail.mode, NumpadMode::Digit);
        assert!(detail.num_lock);
    }

    #[test]
    fn test_numpad_four_with_numlock_off_is_left() {
        let (key, detail) = classify("Numpad4", false).unwrap();
        assert_eq!(key.as_str(), "ArrowLeft");
        assert_eq!(detail.digit, None);
        assert_eq!(detail.navigation, Some(Key::new("ArrowLeft")));
        assert_eq!(detail.mode, NumpadMode::Navigation);
    }

    #[test]
    fn test_decimal_has_no_digit_value() {
        let (key, detail) = classify("NumpadDecimal", true).unwrap();
        assert_eq!(key.as_str(), ".");
        assert_eq!(detail.digit, None);
        let (key, _) = classify("NumpadDecimal", false).unwrap();
        assert_eq!(key.as_str(), "Delete");
    }

    #[test]
    fn test_operators_ignore_numlock() {
        for num_lock in [true, false] {
            let (key, detail) = classify("NumpadAdd", num_lock).unwrap();
            assert_eq!(key.as_str(), "+");
            assert_eq!(detail.mode, NumpadMode::Operator);
        }
    }

    #[test]
    fn test_non_numpad_code() {
        assert!(classify("Digit4", true).is_none());
        assert!(is_numpad_code("Numpad0"));
        assert!(!is_numpad_code("KeyA"));
    }
}
