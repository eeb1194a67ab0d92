// Keyweave Platform Quirk Filters
// Raw event in, possibly-suppressed raw events out
//
// One host platform reports a numpad press made while a modifier is held as
// a spurious modifier release, the numpad press/release, then a spurious
// modifier press. Modifier flags alone cannot tell that apart from a quick
// genuine tap, so the filter works on timing: a modifier release is held
// back for a short window, and if a numpad press arrives inside it the
// release is dropped and the matching re-press is dropped later.
//
// This is a heuristic. A genuine modifier tap immediately followed by a
// numpad press is suppressed too, and a platform that is slower than the
// window slips through. Both constants are tunable.

use smallvec::{smallvec, SmallVec};

use crate::key::canonical_key;
use crate::numpad::is_numpad_code;
use crate::{Modifier, RawKeyEvent};

/// Events released by a filter, in delivery order
pub type Filtered = SmallVec<[RawKeyEvent; 2]>;

/// Seam for per-platform raw-event quirk handling.
///
/// A filter may hold events back; the owner must call [`QuirkFilter::flush`]
/// once the host clock reaches [`QuirkFilter::deadline`].
pub trait QuirkFilter: Send {
    /// Feed one raw event and get back the events to normalize now
    fn filter(&mut self, raw: RawKeyEvent) -> Filtered;

    /// Host timestamp by which held-back events must be flushed
    fn deadline(&self) -> Option<u64>;

    /// Timestamp of the earliest event still held back
    fn held_since(&self) -> Option<u64>;

    /// Release held-back events whose deadline has passed
    fn flush(&mut self, now: u64) -> Filtered;

    /// Release everything held back and forget any suppression state
    fn reset(&mut self) -> Filtered;

    /// Whether host-reported modifier flags are currently known to be wrong
    fn is_suppressing(&self) -> bool {
        false
    }
}

/// Filter that forwards every event untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughFilter;

impl QuirkFilter for PassthroughFilter {
    fn filter(&mut self, raw: RawKeyEvent) -> Filtered {
        smallvec![raw]
    }

    fn deadline(&self) -> Option<u64> {
        None
    }

    fn held_since(&self) -> Option<u64> {
        None
    }

    fn flush(&mut self, _now: u64) -> Filtered {
        Filtered::new()
    }

    fn reset(&mut self) -> Filtered {
        Filtered::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhantomMode {
    Idle,
    /// A phantom release of `modifier` was dropped; its re-press is expected.
    /// `since` is the timestamp of the last event attributed to the phantom
    /// pair.
    Suppressing { modifier: Modifier, since: u64 },
}

/// Numpad phantom-modifier filter
#[derive(Debug, Clone)]
pub struct NumpadPhantomFilter {
    window_ms: u64,
    genuine_gap_ms: u64,
    pending: Option<RawKeyEvent>,
    mode: PhantomMode,
    debug: bool,
}

impl NumpadPhantomFilter {
    /// Create a filter.
    ///
    /// `window_ms` bounds release-to-numpad-press for a phantom pair: the
    /// press must arrive strictly before the release's flush deadline,
    /// `genuine_gap_ms` is the quiet time after which a modifier release in
    /// suppression mode is taken as genuine.
    pub fn new(window_ms: u64, genuine_gap_ms: u64) -> Self {
        Self {
            window_ms,
            genuine_gap_ms,
            pending: None,
            mode: PhantomMode::Idle,
            debug: false,
        }
    }

    /// Enable per-decision debug logging
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    fn modifier_of(raw: &RawKeyEvent) -> Option<Modifier> {
        Modifier::from_key(&canonical_key(&raw.key, &raw.code))
    }

    fn trace(&self, message: &str, raw: &RawKeyEvent) {
        if crate::debug::enabled(self.debug) {
            log::debug!("phantom filter: {} ({} {} @{})", message, raw.action, raw.code, raw.timestamp);
        }
    }

    fn exit_suppression(&mut self) {
        self.mode = PhantomMode::Idle;
    }
}

impl QuirkFilter for NumpadPhantomFilter {
    fn filter(&mut self, raw: RawKeyEvent) -> Filtered {
        let mut out = Filtered::new();
        let numpad = is_numpad_code(&raw.code);

        if let Some(pending) = self.pending.take() {
            let within_window = raw.timestamp.saturating_sub(pending.timestamp) < self.window_ms;
            if numpad && raw.action.is_pressed() && within_window {
                if let Some(modifier) = Self::modifier_of(&pending) {
                    self.trace("dropped phantom modifier release", &pending);
                    self.mode = PhantomMode::Suppressing {
                        modifier,
                        since: raw.timestamp,
                    };
                    out.push(raw);
                    return out;
                }
            }
            // Nothing followed inside the window: the release was genuine
            self.exit_suppression();
            out.push(pending);
        }

        let modifier = Self::modifier_of(&raw);
        match (self.mode, modifier) {
            (PhantomMode::Suppressing { modifier: held, .. }, Some(m))
                if m == held && raw.action.is_pressed() =>
            {
                self.trace("dropped phantom modifier press", &raw);
                self.exit_suppression();
            }
            (PhantomMode::Suppressing { modifier: held, since }, Some(m))
                if m == held && raw.action.is_released() =>
            {
                if raw.timestamp.saturating_sub(since) > self.genuine_gap_ms {
                    self.trace("genuine modifier release ends suppression", &raw);
                    self.exit_suppression();
                    out.push(raw);
                } else {
                    self.pending = Some(raw);
                }
            }
            (_, Some(_)) if raw.action.is_released() && !raw.repeat => {
                self.pending = Some(raw);
            }
            (PhantomMode::Suppressing { modifier, .. }, None) if numpad => {
                self.mode = PhantomMode::Suppressing {
                    modifier,
                    since: raw.timestamp,
                };
                out.push(raw);
            }
            (PhantomMode::Suppressing { since, .. }, None) => {
                if raw.timestamp.saturating_sub(since) > self.genuine_gap_ms {
                    // The re-press never came; stop distrusting host flags
                    self.exit_suppression();
                }
                out.push(raw);
            }
            _ => out.push(raw),
        }
        out
    }

    fn deadline(&self) -> Option<u64> {
        self.pending
            .as_ref()
            .map(|pending| pending.timestamp.saturating_add(self.window_ms))
    }

    fn held_since(&self) -> Option<u64> {
        self.pending.as_ref().map(|pending| pending.timestamp)
    }

    fn flush(&mut self, now: u64) -> Filtered {
        let mut out = Filtered::new();
        if let Some(deadline) = self.deadline() {
            if now >= deadline {
                if let Some(pending) = self.pending.take() {
                    self.exit_suppression();
                    out.push(pending);
                }
            }
        }
        out
    }

    fn reset(&mut self) -> Filtered {
        self.exit_suppression();
        self.pending.take().into_iter().collect()
    }

    fn is_suppressing(&self) -> bool {
        matches!(self.mode, PhantomMode::Suppressing { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> NumpadPhantomFilter {
        NumpadPhantomFilter::new(8, 40)
    }

    #[test]
    fn test_passthrough_forwards_everything() {
        let mut passthrough = PassthroughFilter;
        let out = passthrough.filter(RawKeyEvent::release("Shift", "ShiftLeft", 0));
        assert_eq!(out.len(), 1);
        assert_eq!(passthrough.deadline(), None);
    }

    #[test]
    fn test_modifier_release_is_held_back_until_deadline() {
        let mut f = filter();
        assert!(f.filter(RawKeyEvent::press("Shift", "ShiftLeft", 0)).len() == 1);
        assert!(f.filter(RawKeyEvent::release("Shift", "ShiftLeft", 100)).is_empty());
        assert_eq!(f.deadline(), Some(108));
        assert!(f.flush(107).is_empty());
        let flushed = f.flush(108);
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].timestamp, 100);
        assert!(!f.is_suppressing());
    }

    #[test]
    fn test_phantom_pair_around_numpad_press_is_dropped() {
        let mut f = filter();
        f.filter(RawKeyEvent::press("Shift", "ShiftLeft", 0));
        assert!(f.filter(RawKeyEvent::release("Shift", "ShiftLeft", 500)).is_empty());

        let out = f.filter(RawKeyEvent::press("ArrowLeft", "Numpad4", 502));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].code, "Numpad4");
        assert!(f.is_suppressing());

        assert_eq!(f.filter(RawKeyEvent::release("ArrowLeft", "Numpad4", 600)).len(), 1);
        // Phantom re-press right after the numpad release
        assert!(f.filter(RawKeyEvent::press("Shift", "ShiftLeft", 601)).is_empty());
        assert!(!f.is_suppressing());
    }

    #[test]
    fn test_slow_numpad_press_keeps_release() {
        let mut f = filter();
        f.filter(RawKeyEvent::release("Shift", "ShiftLeft", 500));
        let out = f.filter(RawKeyEvent::press("4", "Numpad4", 530));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].code, "ShiftLeft");
        assert_eq!(out[1].code, "Numpad4");
        assert!(!f.is_suppressing());
    }

    #[test]
    fn test_numpad_press_at_deadline_is_not_phantom() {
        let mut f = filter();
        f.filter(RawKeyEvent::release("Shift", "ShiftLeft", 100));
        assert_eq!(f.held_since(), Some(100));
        let out = f.filter(RawKeyEvent::press("ArrowLeft", "Numpad4", 108));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].code, "ShiftLeft");
        assert!(!f.is_suppressing());

        f.filter(RawKeyEvent::release("Shift", "ShiftLeft", 200));
        let out = f.filter(RawKeyEvent::press("ArrowLeft", "Numpad4", 207));
        assert_eq!(out.len(), 1);
        assert!(f.is_suppressing());
        assert_eq!(f.held_since(), None);
    }

    #[test]
    fn test_non_numpad_press_after_release_flushes_in_order() {
        let mut f = filter();
        f.filter(RawKeyEvent::release("Control", "ControlLeft", 10));
        let out = f.filter(RawKeyEvent::press("a", "KeyA", 12));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].code, "ControlLeft");
        assert_eq!(out[1].code, "KeyA");
    }

    #[test]
    fn test_genuine_release_after_long_gap_in_suppression() {
        let mut f = filter();
        f.filter(RawKeyEvent::release("Shift", "ShiftLeft", 500));
        f.filter(RawKeyEvent::press("ArrowLeft", "Numpad4", 503));
        f.filter(RawKeyEvent::release("ArrowLeft", "Numpad4", 560));
        // No phantom re-press: the user let go of Shift during the numpad
        // press and the platform reports the release much later
        let out = f.filter(RawKeyEvent::release("Shift", "ShiftLeft", 700));
        assert_eq!(out.len(), 1);
        assert!(!f.is_suppressing());
    }

    #[test]
    fn test_reset_releases_pending() {
        let mut f = filter();
        f.filter(RawKeyEvent::release("Alt", "AltLeft", 10));
        let out = f.reset();
        assert_eq!(out.len(), 1);
        assert_eq!(f.deadline(), None);
    }
}
