// Keyweave Input Layer - Raw Host Notifications
// The shape a host forwards for every key press/release it observes

use crate::{Action, LockState};

/// Modifier flags as reported by the host alongside a raw event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct RawModifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Raw key notification, before any normalization.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct RawKeyEvent {
    /// Press or release
    pub action: Action,
    /// Layout-dependent key value (`"A"`, `"!"`, `"Shift"`, `"ArrowLeft"`)
    pub key: String,
    /// Physical key identifier (`"KeyA"`, `"Digit1"`, `"Numpad4"`)
    pub code: String,
    /// Modifier flags the host attached to the notification
    #[serde(default)]
    pub modifiers: RawModifiers,
    /// Auto-repeat flag
    #[serde(default)]
    pub repeat: bool,
    /// Host monotonic timestamp in milliseconds
    #[serde(rename = "at")]
    pub timestamp: u64,
    /// Lock-key state queried by the host at event time, if available
    #[serde(default)]
    pub locks: Option<LockState>,
    /// Whether the host suppressed the platform default action
    #[serde(default)]
    pub default_prevented: bool,
}

impl RawKeyEvent {
    /// Create a raw event with no modifier flags
    pub fn new(action: Action, key: impl Into<String>, code: impl Into<String>, timestamp: u64) -> Self {
        Self {
            action,
            key: key.into(),
            code: code.into(),
            modifiers: RawModifiers::default(),
            repeat: false,
            timestamp,
            locks: None,
            default_prevented: false,
        }
    }

    /// Create a press notification
    pub fn press(key: impl Into<String>, code: impl Into<String>, timestamp: u64) -> Self {
        Self::new(Action::Press, key, code, timestamp)
    }

    /// Create a release notification
    pub fn release(key: impl Into<String>, code: impl Into<String>, timestamp: u64) -> Self {
        Self::new(Action::Release, key, code, timestamp)
    }

    /// Set the host-reported modifier flags
    pub fn with_modifiers(mut self, modifiers: RawModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Mark as an auto-repeat press
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Attach host-queried lock state
    pub fn with_locks(mut self, locks: LockState) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Record that the host suppressed the default action
    pub fn with_default_prevented(mut self) -> Self {
        self.default_prevented = true;
        self
    }

    /// A notification with neither key value nor code carries nothing to
    /// normalize
    pub fn is_malformed(&self) -> bool {
        self.key.is_empty() && self.code.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let event = RawKeyEvent::press("a", "KeyA", 10)
            .with_modifiers(RawModifiers {
                shift: true,
                ..RawModifiers::default()
            })
            .repeating()
            .with_default_prevented();
        assert_eq!(event.action, Action::Press);
        assert!(event.modifiers.shift);
        assert!(event.repeat);
        assert!(event.default_prevented);
        assert_eq!(event.timestamp, 10);
    }

    #[test]
    fn test_is_malformed() {
        assert!(RawKeyEvent::press("", "", 0).is_malformed());
        assert!(!RawKeyEvent::press(" ", "", 0).is_malformed());
        assert!(!RawKeyEvent::press("", "KeyA", 0).is_malformed());
        assert!(!RawKeyEvent::release("Enter", "", 0).is_malformed());
    }
}
