// Keyweave Event Normalizer
// Raw notifications -> NormalizedKeyEvent, with modifier tracking and
// platform quirk suppression

pub mod phantom;

use smallvec::SmallVec;

use crate::key::{canonical_code, canonical_key};
use crate::numpad;
use crate::{LockKey, LockState, Modifier, ModifierState, NormalizedKeyEvent, RawKeyEvent};

pub use phantom::{NumpadPhantomFilter, PassthroughFilter, QuirkFilter};

/// Events produced by one normalization step, in delivery order
pub type NormalizedBatch = SmallVec<[NormalizedKeyEvent; 2]>;

/// Configuration for the normalizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizerConfig {
    /// Enable the numpad phantom-modifier filter (host-platform specific)
    pub numpad_phantom_filter: bool,
    /// Max gap between a modifier release and a numpad press for the pair
    /// to count as phantom (milliseconds)
    pub phantom_window_ms: u64,
    /// Quiet time after which a modifier release during suppression is
    /// genuine (milliseconds)
    pub genuine_release_gap_ms: u64,
    /// Per-event debug logging
    pub debug: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            numpad_phantom_filter: false,
            phantom_window_ms: 8,
            genuine_release_gap_ms: 40,
            debug: false,
        }
    }
}

/// Explicit modifier state threaded through every normalization step.
///
/// Left and right modifier keys are tracked by physical code so releasing
/// one side keeps the modifier held while the other side is down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifierTracker {
    snapshot: ModifierState,
    held: SmallVec<[(Modifier, String); 4]>,
}

impl ModifierTracker {
    /// Current snapshot
    pub fn snapshot(&self) -> ModifierState {
        self.snapshot
    }

    fn press(mut self, modifier: Modifier, code: &str) -> Self {
        if !self.held.iter().any(|(m, c)| *m == modifier && c == code) {
            self.held.push((modifier, code.to_string()));
        }
        self.snapshot = self.snapshot.with(modifier, true);
        self
    }

    fn release(mut self, modifier: Modifier, code: &str) -> Self {
        self.held.retain(|(m, c)| !(*m == modifier && c == code));
        let still_held = self.held.iter().any(|(m, _)| *m == modifier);
        self.snapshot = self.snapshot.with(modifier, still_held);
        self
    }

    fn reconcile(mut self, raw: &RawKeyEvent) -> Self {
        let reported = [
            (Modifier::Shift, raw.modifiers.shift),
            (Modifier::Control, raw.modifiers.ctrl),
            (Modifier::Alt, raw.modifiers.alt),
            (Modifier::Meta, raw.modifiers.meta),
        ];
        for (modifier, held) in reported {
            if self.snapshot.is_active(modifier) && !held {
                self.held.retain(|(m, _)| *m != modifier);
                self.snapshot = self.snapshot.with(modifier, false);
            } else if !self.snapshot.is_active(modifier) && held {
                self.snapshot = self.snapshot.with(modifier, true);
            }
        }
        self
    }

    fn with_locks(mut self, locks: LockState) -> Self {
        self.snapshot = self.snapshot.with_locks(locks);
        self
    }

    fn toggle_lock(mut self, lock: LockKey) -> Self {
        self.snapshot = self.snapshot.with_lock(lock, !self.snapshot.lock(lock));
        self
    }

    fn cleared(self) -> Self {
        Self {
            snapshot: self.snapshot.without_modifiers(),
            held: SmallVec::new(),
        }
    }
}

/// Normalize one raw event against an explicit modifier state.
///
/// Returns the event together with the updated state, or `None` for
/// malformed input. `reconcile` lets host-reported modifier flags repair the
/// tracked state on non-modifier events; it must be off while the host's
/// flags are known to be wrong.
pub fn normalize_event(
    raw: &RawKeyEvent,
    tracker: ModifierTracker,
    reconcile: bool,
) -> Option<(NormalizedKeyEvent, ModifierTracker)> {
    if raw.is_malformed() {
        return None;
    }

    let mut tracker = match raw.locks {
        Some(locks) => tracker.with_locks(locks),
        None => tracker,
    };

    // NumLock is read from the live state, not from the key value the host
    // chose, so one physical key maps to a digit or to navigation per event
    let (key, numpad_detail) = match numpad::classify(&raw.code, tracker.snapshot.num_lock) {
        Some((key, detail)) => (key, Some(detail)),
        None => (canonical_key(&raw.key, &raw.code), None),
    };
    let code = canonical_code(&raw.code);

    if let Some(modifier) = Modifier::from_key(&key) {
        tracker = if raw.action.is_pressed() {
            tracker.press(modifier, &code)
        } else {
            tracker.release(modifier, &code)
        };
    } else if let Some(lock) = LockKey::from_key(&key) {
        if raw.locks.is_none() && raw.action.is_pressed() && !raw.repeat {
            tracker = tracker.toggle_lock(lock);
        }
    } else if reconcile {
        tracker = tracker.reconcile(raw);
    }

    let event = NormalizedKeyEvent {
        key,
        raw_key: raw.key.clone(),
        code,
        raw_code: raw.code.clone(),
        action: raw.action,
        modifiers: tracker.snapshot,
        timestamp: raw.timestamp,
        repeat: raw.repeat,
        numpad: numpad_detail,
        release: None,
        default_prevented: raw.default_prevented,
        synthetic: false,
    };
    Some((event, tracker))
}

/// Stateful normalizer owning the authoritative modifier snapshot
pub struct Normalizer {
    tracker: ModifierTracker,
    filter: Box<dyn QuirkFilter>,
    debug: bool,
}

impl Normalizer {
    /// Create a normalizer, choosing the quirk filter from configuration
    pub fn new(config: &NormalizerConfig) -> Self {
        let filter: Box<dyn QuirkFilter> = if config.numpad_phantom_filter {
            Box::new(
                NumpadPhantomFilter::new(config.phantom_window_ms, config.genuine_release_gap_ms)
                    .with_debug(config.debug),
            )
        } else {
            Box::new(PassthroughFilter)
        };
        Self::with_filter(filter, config.debug)
    }

    /// Create a normalizer with a custom quirk filter
    pub fn with_filter(filter: Box<dyn QuirkFilter>, debug: bool) -> Self {
        Self {
            tracker: ModifierTracker::default(),
            filter,
            debug,
        }
    }

    /// Normalize one raw event.
    ///
    /// Usually yields one event; yields none when the filter holds the event
    /// back or drops it, and two when a held-back event is released ahead of
    /// this one.
    pub fn normalize(&mut self, raw: RawKeyEvent) -> NormalizedBatch {
        if raw.is_malformed() {
            if crate::debug::enabled(self.debug) {
                log::debug!("normalizer: ignoring malformed event {:?}", raw);
            }
            return NormalizedBatch::new();
        }
        let released = self.filter.filter(raw);
        self.apply(released)
    }

    /// Release events the filter held back past their deadline
    pub fn flush(&mut self, now: u64) -> NormalizedBatch {
        let released = self.filter.flush(now);
        self.apply(released)
    }

    /// Host timestamp at which [`Normalizer::flush`] must run
    pub fn pending_deadline(&self) -> Option<u64> {
        self.filter.deadline()
    }

    /// Timestamp of the earliest raw event the filter is holding back
    pub fn pending_since(&self) -> Option<u64> {
        self.filter.held_since()
    }

    /// Current modifier snapshot
    pub fn modifiers(&self) -> ModifierState {
        self.tracker.snapshot()
    }

    /// Replace lock state from a host query
    pub fn set_lock_state(&mut self, locks: LockState) {
        self.tracker = std::mem::take(&mut self.tracker).with_locks(locks);
    }

    /// Drain held-back events and forget all held modifiers.
    ///
    /// The drained events are normalized before the modifiers are cleared so
    /// they carry the state they happened under.
    pub fn release_all(&mut self) -> NormalizedBatch {
        let released = self.filter.reset();
        let batch = self.apply(released);
        self.tracker = std::mem::take(&mut self.tracker).cleared();
        batch
    }

    fn apply(&mut self, released: phantom::Filtered) -> NormalizedBatch {
        let mut batch = NormalizedBatch::new();
        for raw in released {
            let reconcile = !self.filter.is_suppressing();
            let tracker = std::mem::take(&mut self.tracker);
            match normalize_event(&raw, tracker.clone(), reconcile) {
                Some((event, updated)) => {
                    self.tracker = updated;
                    batch.push(event);
                }
                None => self.tracker = tracker,
            }
        }
        batch
    }
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer")
            .field("tracker", &self.tracker)
            .field("suppressing", &self.filter.is_suppressing())
            .finish()
    }
}
