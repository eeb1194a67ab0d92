// Keyweave Modifier System
// Modifier keys, lock keys and the snapshot attached to every event

use smallvec::SmallVec;
use strum_macros::{Display, EnumIter, EnumString};

use crate::Key;

/// One of the four combo modifiers.
///
/// Parsing accepts the same alias families pattern files use
/// (`Ctrl`/`C`, `Opt`/`Option`, `Cmd`/`Super`/`Win`), case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Modifier {
    #[strum(to_string = "Shift")]
    Shift,
    #[strum(to_string = "Control", serialize = "Ctrl", serialize = "C")]
    Control,
    #[strum(to_string = "Alt", serialize = "Opt", serialize = "Option", serialize = "A")]
    Alt,
    #[strum(
        to_string = "Meta",
        serialize = "Cmd",
        serialize = "Command",
        serialize = "Super",
        serialize = "Win"
    )]
    Meta,
}

impl Modifier {
    /// Modifier represented by a canonical key, if any
    pub fn from_key(key: &Key) -> Option<Modifier> {
        match key.as_str() {
            "Shift" => Some(Modifier::Shift),
            "Control" => Some(Modifier::Control),
            "Alt" => Some(Modifier::Alt),
            "Meta" => Some(Modifier::Meta),
            _ => None,
        }
    }

    /// Resolve a modifier alias as written in key specs
    pub fn from_alias(alias: &str) -> Option<Modifier> {
        alias.trim().parse().ok()
    }

    /// Canonical key for this modifier
    pub fn key(self) -> Key {
        Key::new(self.to_string())
    }
}

/// Toggle-state keys tracked alongside the modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum LockKey {
    CapsLock,
    NumLock,
    ScrollLock,
}

impl LockKey {
    /// Lock represented by a canonical key, if any
    pub fn from_key(key: &Key) -> Option<LockKey> {
        match key.as_str() {
            "CapsLock" => Some(LockKey::CapsLock),
            "NumLock" => Some(LockKey::NumLock),
            "ScrollLock" => Some(LockKey::ScrollLock),
            _ => None,
        }
    }
}

/// Host-reported lock-key state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct LockState {
    pub caps_lock: bool,
    pub num_lock: bool,
    pub scroll_lock: bool,
}

/// Snapshot of modifier and lock state at the moment of an event.
///
/// Values are replaced, never shared: every transition returns a new
/// snapshot so each emitted event carries the state it was produced under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModifierState {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
    pub caps_lock: bool,
    pub num_lock: bool,
    pub scroll_lock: bool,
}

impl ModifierState {
    /// Check whether a modifier is held
    pub fn is_active(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Shift => self.shift,
            Modifier::Control => self.ctrl,
            Modifier::Alt => self.alt,
            Modifier::Meta => self.meta,
        }
    }

    /// Snapshot with one modifier set to `held`
    pub fn with(mut self, modifier: Modifier, held: bool) -> Self {
        match modifier {
            Modifier::Shift => self.shift = held,
            Modifier::Control => self.ctrl = held,
            Modifier::Alt => self.alt = held,
            Modifier::Meta => self.meta = held,
        }
        self
    }

    /// Check whether a lock is engaged
    pub fn lock(&self, lock: LockKey) -> bool {
        match lock {
            LockKey::CapsLock => self.caps_lock,
            LockKey::NumLock => self.num_lock,
            LockKey::ScrollLock => self.scroll_lock,
        }
    }

    /// Snapshot with one lock set to `engaged`
    pub fn with_lock(mut self, lock: LockKey, engaged: bool) -> Self {
        match lock {
            LockKey::CapsLock => self.caps_lock = engaged,
            LockKey::NumLock => self.num_lock = engaged,
            LockKey::ScrollLock => self.scroll_lock = engaged,
        }
        self
    }

    /// Snapshot with all lock states replaced
    pub fn with_locks(self, locks: LockState) -> Self {
        self.with_lock(LockKey::CapsLock, locks.caps_lock)
            .with_lock(LockKey::NumLock, locks.num_lock)
            .with_lock(LockKey::ScrollLock, locks.scroll_lock)
    }

    /// Snapshot with the four modifiers cleared and locks untouched
    pub fn without_modifiers(self) -> Self {
        Self {
            shift: false,
            ctrl: false,
            alt: false,
            meta: false,
            ..self
        }
    }

    /// Check if any of the four modifiers is held
    pub fn any_modifier(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

/// Subset of modifier constraints; modifiers not listed are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ModifierRequirement {
    constraints: SmallVec<[(Modifier, bool); 4]>,
}

impl ModifierRequirement {
    /// Create an empty (unconstrained) requirement
    pub fn new() -> Self {
        Self::default()
    }

    /// Require all given modifiers to be held
    pub fn held(modifiers: impl IntoIterator<Item = Modifier>) -> Self {
        let mut requirement = Self::new();
        for modifier in modifiers {
            requirement.require(modifier, true);
        }
        requirement
    }

    /// Constrain `modifier` to `held`, replacing any earlier constraint on it
    pub fn require(&mut self, modifier: Modifier, held: bool) {
        if let Some(existing) = self.constraints.iter_mut().find(|(m, _)| *m == modifier) {
            existing.1 = held;
        } else {
            self.constraints.push((modifier, held));
            self.constraints.sort_by_key(|(m, _)| *m);
        }
    }

    /// Check every constraint against a snapshot
    pub fn is_satisfied_by(&self, state: &ModifierState) -> bool {
        self.constraints
            .iter()
            .all(|(modifier, held)| state.is_active(*modifier) == *held)
    }

    /// Check if there are no constraints
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Iterate over (modifier, must_be_held) constraints
    pub fn iter(&self) -> impl Iterator<Item = (Modifier, bool)> + '_ {
        self.constraints.iter().copied()
    }

    /// Check whether the requirement constrains `modifier` to be held
    pub fn requires_held(&self, modifier: Modifier) -> bool {
        self.constraints.iter().any(|(m, held)| *m == modifier && *held)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_modifier_from_alias() {
        assert_eq!(Modifier::from_alias("Ctrl"), Some(Modifier::Control));
        assert_eq!(Modifier::from_alias("ctrl"), Some(Modifier::Control));
        assert_eq!(Modifier::from_alias("Cmd"), Some(Modifier::Meta));
        assert_eq!(Modifier::from_alias("option"), Some(Modifier::Alt));
        assert_eq!(Modifier::from_alias("Shift"), Some(Modifier::Shift));
        assert_eq!(Modifier::from_alias("Hyper"), None);
    }

    #[test]
    fn test_modifier_display_is_canonical_key() {
        assert_eq!(Modifier::Control.to_string(), "Control");
        assert_eq!(Modifier::Meta.key().as_str(), "Meta");
        for modifier in Modifier::iter() {
            assert_eq!(Modifier::from_key(&modifier.key()), Some(modifier));
        }
    }

    #[test]
    fn test_state_transitions_return_new_snapshot() {
        let before = ModifierState::default();
        let after = before.with(Modifier::Shift, true);
        assert!(!before.shift);
        assert!(after.shift);
        assert!(after.any_modifier());
        assert!(!after.without_modifiers().any_modifier());
    }

    #[test]
    fn test_lock_state() {
        let state = ModifierState::default().with_lock(LockKey::NumLock, true);
        assert!(state.lock(LockKey::NumLock));
        assert!(!state.lock(LockKey::CapsLock));
        let replaced = state.with_locks(LockState {
            caps_lock: true,
            ..LockState::default()
        });
        assert!(replaced.caps_lock);
        assert!(!replaced.num_lock);
    }

    #[test]
    fn test_requirement_subset_semantics() {
        let requirement = ModifierRequirement::held([Modifier::Control]);
        let ctrl = ModifierState::default().with(Modifier::Control, true);
        let ctrl_shift = ctrl.with(Modifier::Shift, true);
        assert!(requirement.is_satisfied_by(&ctrl));
        // Shift is unconstrained
        assert!(requirement.is_satisfied_by(&ctrl_shift));
        assert!(!requirement.is_satisfied_by(&ModifierState::default()));
    }

    #[test]
    fn test_requirement_negative_constraint() {
        let mut requirement = ModifierRequirement::new();
        requirement.require(Modifier::Shift, false);
        assert!(requirement.is_satisfied_by(&ModifierState::default()));
        assert!(!requirement.is_satisfied_by(&ModifierState::default().with(Modifier::Shift, true)));
        requirement.require(Modifier::Shift, true);
        assert_eq!(requirement.iter().count(), 1);
        assert!(requirement.requires_held(Modifier::Shift));
    }
}
