// Keyweave Held-Key Ledger
// Press durations and tap/hold classification for keys currently down

use std::collections::HashMap;

use crate::{Key, ModifierState, NormalizedKeyEvent, ReleaseTiming};

/// A tracked key that is currently down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldEntry {
    /// Timestamp of the initial (non-repeat) press
    pub press_start: u64,
    /// Canonical physical code of the press
    pub code: String,
}

/// Ledger of currently-down keys.
///
/// Keyed by canonical key, so a key is tracked at most once no matter how
/// many auto-repeat presses arrive while it is held.
#[derive(Debug, Clone)]
pub struct HeldKeyLedger {
    entries: HashMap<Key, HeldEntry>,
    tap_threshold_ms: u64,
}

impl HeldKeyLedger {
    /// Create an empty ledger with the given tap/hold threshold
    pub fn new(tap_threshold_ms: u64) -> Self {
        Self {
            entries: HashMap::new(),
            tap_threshold_ms,
        }
    }

    /// Get the tap/hold threshold
    pub fn tap_threshold_ms(&self) -> u64 {
        self.tap_threshold_ms
    }

    /// Get the number of tracked keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no key is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check whether a key is currently tracked as down
    pub fn is_held(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Get the entry for a held key
    pub fn get(&self, key: &Key) -> Option<&HeldEntry> {
        self.entries.get(key)
    }

    /// Iterate over held keys, in no particular order
    pub fn held_keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.keys()
    }

    /// Record a press. Only the first press of an untracked key starts an
    /// entry; repeats and duplicate presses keep the original start.
    pub fn on_press(&mut self, event: &NormalizedKeyEvent) {
        if event.repeat {
            return;
        }
        self.entries.entry(event.key.clone()).or_insert_with(|| HeldEntry {
            press_start: event.timestamp,
            code: event.code.clone(),
        });
    }

    /// Record a release, returning its timing when the key was tracked
    pub fn on_release(&mut self, event: &NormalizedKeyEvent) -> Option<ReleaseTiming> {
        self.entries.remove(&event.key).map(|entry| {
            let duration = event.timestamp.saturating_sub(entry.press_start);
            ReleaseTiming::classify(duration, self.tap_threshold_ms)
        })
    }

    /// Feed an event through the ledger; releases come back annotated with
    /// their timing
    pub fn annotate(&mut self, event: NormalizedKeyEvent) -> NormalizedKeyEvent {
        if event.is_press() {
            self.on_press(&event);
            event
        } else {
            match self.on_release(&event) {
                Some(timing) => event.with_release_timing(timing),
                None => event,
            }
        }
    }

    /// Release every tracked key at `timestamp`, returning one synthetic
    /// release per key, oldest press first
    pub fn force_release_all(&mut self, timestamp: u64, modifiers: ModifierState) -> Vec<NormalizedKeyEvent> {
        let mut drained: Vec<(Key, HeldEntry)> = self.entries.drain().collect();
        drained.sort_by(|(ka, a), (kb, b)| a.press_start.cmp(&b.press_start).then_with(|| ka.cmp(kb)));
        drained
            .into_iter()
            .map(|(key, entry)| {
                let duration = timestamp.saturating_sub(entry.press_start);
                let timing = ReleaseTiming::classify(duration, self.tap_threshold_ms);
                NormalizedKeyEvent::synthetic_release(key, entry.code, modifiers, timestamp, timing)
            })
            .collect()
    }

    /// Forget all tracked keys without producing releases
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for HeldKeyLedger {
    fn default() -> Self {
        Self::new(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{normalize_event, ModifierTracker, RawKeyEvent};

    fn normalized(raw: RawKeyEvent) -> NormalizedKeyEvent {
        normalize_event(&raw, ModifierTracker::default(), true).unwrap().0
    }

    #[test]
    fn test_tap_and_hold_classification() {
        let mut ledger = HeldKeyLedger::new(200);
        ledger.annotate(normalized(RawKeyEvent::press("a", "KeyA", 0)));
        let tap = ledger.annotate(normalized(RawKeyEvent::release("a", "KeyA", 120)));
        let timing = tap.release.unwrap();
        assert_eq!(timing.duration_ms, 120);
        assert!(timing.is_tap);

        ledger.annotate(normalized(RawKeyEvent::press("a", "KeyA", 1000)));
        let hold = ledger.annotate(normalized(RawKeyEvent::release("a", "KeyA", 1200)));
        assert!(hold.release.unwrap().is_hold);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_repeat_does_not_restart_press() {
        let mut ledger = HeldKeyLedger::new(200);
        ledger.annotate(normalized(RawKeyEvent::press("a", "KeyA", 0)));
        ledger.annotate(normalized(RawKeyEvent::press("a", "KeyA", 500).repeating()));
        ledger.annotate(normalized(RawKeyEvent::press("a", "KeyA", 530).repeating()));
        assert_eq!(ledger.len(), 1);
        let release = ledger.annotate(normalized(RawKeyEvent::release("a", "KeyA", 600)));
        assert_eq!(release.release.unwrap().duration_ms, 600);
    }

    #[test]
    fn test_untracked_release_has_no_timing() {
        let mut ledger = HeldKeyLedger::new(200);
        let release = ledger.annotate(normalized(RawKeyEvent::release("b", "KeyB", 10)));
        assert!(release.release.is_none());
    }

    #[test]
    fn test_force_release_all() {
        let mut ledger = HeldKeyLedger::new(200);
        ledger.annotate(normalized(RawKeyEvent::press("Shift", "ShiftLeft", 0)));
        ledger.annotate(normalized(RawKeyEvent::press("a", "KeyA", 100)));
        let released = ledger.force_release_all(400, ModifierState::default());
        assert_eq!(released.len(), 2);
        assert_eq!(released[0].key.as_str(), "Shift");
        assert_eq!(released[0].release.unwrap().duration_ms, 400);
        assert_eq!(released[1].key.as_str(), "a");
        assert!(released.iter().all(|e| e.synthetic && e.is_release()));
        assert!(ledger.is_empty());
    }
}
