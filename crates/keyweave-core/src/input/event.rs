// Keyweave Input Layer - Normalized Events
// Canonical, loss-free representation of one key notification

use std::fmt;

use crate::numpad::NumpadDetail;
use crate::{Action, Key, ModifierState};

/// Press duration and tap/hold classification, attached to releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseTiming {
    /// Milliseconds between the tracked press and this release
    pub duration_ms: u64,
    /// Duration below the tap threshold
    pub is_tap: bool,
    /// Duration at or above the tap threshold
    pub is_hold: bool,
}

impl ReleaseTiming {
    /// Classify a press duration against a tap threshold
    pub fn classify(duration_ms: u64, tap_threshold_ms: u64) -> Self {
        let is_tap = duration_ms < tap_threshold_ms;
        Self {
            duration_ms,
            is_tap,
            is_hold: !is_tap,
        }
    }
}

/// A key notification in canonical form.
///
/// Built once by the normalizer (and annotated once by the held-key ledger
/// on release); consumers only ever receive shared references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedKeyEvent {
    /// Canonical key name
    pub key: Key,
    /// Key value exactly as the host reported it
    pub raw_key: String,
    /// Canonical physical code
    pub code: String,
    /// Physical code exactly as the host reported it
    pub raw_code: String,
    /// Press or release
    pub action: Action,
    /// Modifier and lock state this event was produced under
    pub modifiers: ModifierState,
    /// Host monotonic timestamp in milliseconds
    pub timestamp: u64,
    /// Auto-repeat press
    pub repeat: bool,
    /// Numpad classification, present for numeric keypad keys
    pub numpad: Option<NumpadDetail>,
    /// Press duration and tap/hold classification, present on releases of
    /// tracked keys
    pub release: Option<ReleaseTiming>,
    /// Whether the host suppressed the platform default action
    pub default_prevented: bool,
    /// Generated by the engine (forced release on focus loss), not by the host
    pub synthetic: bool,
}

impl NormalizedKeyEvent {
    /// Check if this is a press (including repeats)
    pub fn is_press(&self) -> bool {
        self.action.is_pressed()
    }

    /// Check if this is a release
    pub fn is_release(&self) -> bool {
        self.action.is_released()
    }

    /// Check if this is a first press (not auto-repeat)
    pub fn is_initial_press(&self) -> bool {
        self.is_press() && !self.repeat
    }

    /// Check whether this event came from the numeric keypad
    pub fn is_numpad(&self) -> bool {
        self.numpad.is_some()
    }

    /// Attach release timing, consuming the event
    pub fn with_release_timing(mut self, timing: ReleaseTiming) -> Self {
        self.release = Some(timing);
        self
    }

    /// Build the release generated when a held key is force-released
    pub fn synthetic_release(
        key: Key,
        code: String,
        modifiers: ModifierState,
        timestamp: u64,
        timing: ReleaseTiming,
    ) -> Self {
        Self {
            raw_key: key.as_str().to_string(),
            key,
            raw_code: code.clone(),
            code,
            action: Action::Release,
            modifiers,
            timestamp,
            repeat: false,
            numpad: None,
            release: Some(timing),
            default_prevented: false,
            synthetic: true,
        }
    }
}

impl fmt::Display for NormalizedKeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({}) @{}", self.action, self.key, self.code, self.timestamp)?;
        if self.repeat {
            write!(f, " repeat")?;
        }
        if let Some(timing) = self.release {
            let class = if timing.is_tap { "tap" } else { "hold" };
            write!(f, " {}ms {}", timing.duration_ms, class)?;
        }
        if self.synthetic {
            write!(f, " synthetic")?;
        }
        Ok(())
    }
}
