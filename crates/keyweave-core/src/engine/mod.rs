// Keyweave Sequence Engine
// Sequence, chord and hold recognition over the normalized event stream
//
// All three matchers share one engine-owned state and one timer registry.
// Processing is synchronous; timer callbacks arrive through `on_timer`
// between input events.

pub mod chord;
pub mod history;
pub mod hold;
pub mod sequence;
pub mod timer;

use indexmap::IndexMap;

use crate::dispatch::MatchSink;
use crate::{NormalizedKeyEvent, PatternDefinition, PatternError, PatternSet, PatternType};

pub use chord::ChordTracker;
pub use history::{MatchHistory, MatchedPattern};
pub use hold::{HoldProgress, HoldTracker};
pub use sequence::SequenceMatcher;
pub use timer::{ManualScheduler, Scheduler, TimerFire, TimerRegistry, TimerSlot, TimerToken};

/// Configuration for the sequence engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Inter-key timeout for sequences that do not set their own (milliseconds)
    pub sequence_timeout_ms: u64,
    /// Delay after a press before chord membership is evaluated (milliseconds)
    pub chord_settle_ms: u64,
    /// Hold duration for hold patterns that do not set their own (milliseconds)
    pub hold_threshold_ms: u64,
    /// Tap/hold classification threshold for releases (milliseconds)
    pub tap_threshold_ms: u64,
    /// Rolling sequence buffer length
    pub max_buffer_len: usize,
    /// Match history capacity
    pub history_len: usize,
    /// Per-event debug logging
    pub debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sequence_timeout_ms: 1000,
            chord_settle_ms: 50,
            hold_threshold_ms: 500,
            tap_threshold_ms: 200,
            max_buffer_len: 20,
            history_len: 50,
            debug: false,
        }
    }
}

/// Pattern recognition engine.
///
/// Generic over the host scheduler; [`ManualScheduler`] drives timers from
/// the host's own clock via [`SequenceEngine::advance_to`].
pub struct SequenceEngine<S: Scheduler = ManualScheduler> {
    config: EngineConfig,
    patterns: PatternSet,
    scheduler: S,
    timers: TimerRegistry,
    sequences: SequenceMatcher,
    chord: ChordTracker,
    holds: HoldTracker,
    history: MatchHistory,
    sink: Option<Box<dyn MatchSink>>,
}

impl SequenceEngine<ManualScheduler> {
    /// Create an engine on a virtual-clock scheduler
    pub fn new(config: EngineConfig) -> Self {
        Self::with_scheduler(config, ManualScheduler::new())
    }
}

impl Default for SequenceEngine<ManualScheduler> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<S: Scheduler> SequenceEngine<S> {
    /// Create an engine on a host scheduler
    pub fn with_scheduler(config: EngineConfig, scheduler: S) -> Self {
        Self {
            sequences: SequenceMatcher::new(config.max_buffer_len, config.sequence_timeout_ms),
            history: MatchHistory::new(config.history_len),
            patterns: PatternSet::default(),
            scheduler,
            timers: TimerRegistry::new(),
            chord: ChordTracker::new(),
            holds: HoldTracker::new(),
            sink: None,
            config,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the registered patterns
    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Get the scheduler
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Get the scheduler mutably, for owners that schedule their own timers
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Install the host notification sink
    pub fn set_sink(&mut self, sink: Box<dyn MatchSink>) {
        self.sink = Some(sink);
    }

    /// Remove the host notification sink
    pub fn clear_sink(&mut self) -> Option<Box<dyn MatchSink>> {
        self.sink.take()
    }

    fn debug(&self) -> bool {
        crate::debug::enabled(self.config.debug)
    }

    /// Replace the pattern list.
    ///
    /// Invalid definitions are excluded and returned. A list with the same
    /// ids, kinds and keys as the current one keeps all in-flight state; any
    /// structural difference resets the engine first.
    pub fn set_patterns(&mut self, definitions: impl IntoIterator<Item = PatternDefinition>) -> Vec<PatternError> {
        let (patterns, rejected) = PatternSet::build_bounded(definitions, self.config.max_buffer_len);
        for err in &rejected {
            log::warn!("rejected pattern: {}", err);
        }
        if patterns.same_structure(&self.patterns) {
            if self.debug() {
                log::debug!("engine: pattern list unchanged in structure, keeping state");
            }
        } else {
            if self.debug() {
                log::debug!(
                    "engine: pattern list changed ({} -> {} patterns), resetting",
                    self.patterns.len(),
                    patterns.len()
                );
            }
            self.reset();
        }
        self.patterns = patterns;
        self.sequences.configure(&self.patterns);
        rejected
    }

    /// Feed one normalized event. Returns the matches it completed.
    ///
    /// Timers due before the event must be delivered first; see
    /// [`SequenceEngine::advance_to`].
    pub fn process(&mut self, event: &NormalizedKeyEvent) -> Vec<MatchedPattern> {
        if self.debug() {
            log::debug!("engine: {}", event);
        }
        if event.is_press() {
            self.on_press(event)
        } else {
            self.on_release(event);
            Vec::new()
        }
    }

    fn on_press(&mut self, event: &NormalizedKeyEvent) -> Vec<MatchedPattern> {
        let matches = self.sequences.on_press(event, &self.patterns);

        let has_chords = self.patterns.of_type(PatternType::Chord).next().is_some();
        if self.chord.on_press(event) && has_chords {
            self.timers.arm(
                &mut self.scheduler,
                TimerSlot::ChordSettle,
                event.timestamp,
                self.config.chord_settle_ms,
            );
        }

        let arms = self.holds.on_press(event, &self.patterns, self.config.hold_threshold_ms);
        for (pattern_id, delay) in arms {
            self.timers
                .arm(&mut self.scheduler, TimerSlot::Hold(pattern_id.clone()), event.timestamp, delay);
            if let (Some(sink), Some(progress)) = (self.sink.as_mut(), self.holds.get(&pattern_id)) {
                sink.on_hold_progress(progress);
            }
        }

        self.emit(matches)
    }

    fn on_release(&mut self, event: &NormalizedKeyEvent) {
        if self.chord.on_release(event) {
            self.timers.cancel(&mut self.scheduler, &TimerSlot::ChordSettle);
        }
        for pattern_id in self.holds.on_release(event, &self.patterns) {
            self.timers.cancel(&mut self.scheduler, &TimerSlot::Hold(pattern_id.clone()));
            if self.debug() {
                log::debug!("engine: hold '{}' released early", pattern_id);
            }
            if let Some(sink) = self.sink.as_mut() {
                sink.on_hold_cancelled(&pattern_id);
            }
        }
    }

    /// Deliver a fired timer. Tokens the engine no longer owns are ignored.
    pub fn on_timer(&mut self, token: TimerToken, now: u64) -> Vec<MatchedPattern> {
        let Some(slot) = self.timers.take_fired(token) else {
            if self.debug() {
                log::debug!("engine: ignoring stale timer {:?} at {}", token, now);
            }
            return Vec::new();
        };
        let matches = match slot {
            TimerSlot::ChordSettle => self.chord.evaluate(&self.patterns, now),
            TimerSlot::Hold(pattern_id) => {
                let matched = self.holds.fire(&pattern_id, now, &self.patterns);
                if matched.is_none() && self.debug() {
                    log::debug!("engine: hold timer for '{}' fired against stale state", pattern_id);
                }
                if let (Some(sink), Some(progress)) = (self.sink.as_mut(), self.holds.get(&pattern_id)) {
                    sink.on_hold_progress(progress);
                }
                matched.into_iter().collect()
            }
        };
        self.emit(matches)
    }

    /// Fire every timer due at or before `now`, each at its own deadline
    pub fn advance_to(&mut self, now: u64) -> Vec<MatchedPattern> {
        let mut matches = Vec::new();
        for fire in self.scheduler.take_due(now) {
            matches.extend(self.on_timer(fire.token, fire.deadline));
        }
        matches
    }

    fn emit(&mut self, matches: Vec<MatchedPattern>) -> Vec<MatchedPattern> {
        for matched in &matches {
            if self.debug() {
                log::debug!("engine: matched {}", matched);
            }
            self.history.push(matched.clone());
            if let Some(sink) = self.sink.as_mut() {
                sink.on_match(matched);
            }
        }
        matches
    }

    /// Clear all buffers, cancel all timers and drop progress and history
    pub fn reset(&mut self) {
        self.timers.cancel_all(&mut self.scheduler);
        self.sequences.clear();
        self.chord.clear();
        self.holds.clear();
        self.history.clear();
    }

    /// Live hold progress by pattern id
    pub fn hold_progress(&self) -> &IndexMap<String, HoldProgress> {
        self.holds.progress()
    }

    /// Recompute hold progress at `now` and notify the sink
    pub fn refresh_progress(&mut self, now: u64) -> &IndexMap<String, HoldProgress> {
        self.holds.refresh(now);
        if let Some(sink) = self.sink.as_mut() {
            for progress in self.holds.progress().values() {
                sink.on_hold_progress(progress);
            }
        }
        self.holds.progress()
    }

    /// Recent matches
    pub fn history(&self) -> &MatchHistory {
        &self.history
    }

    /// Number of engine timers still outstanding
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Sequence buffer state
    pub fn sequence_buffer(&self) -> &SequenceMatcher {
        &self.sequences
    }

    /// Chord candidate state
    pub fn chord_state(&self) -> &ChordTracker {
        &self.chord
    }
}

impl<S: Scheduler> std::fmt::Debug for SequenceEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceEngine")
            .field("config", &self.config)
            .field("patterns", &self.patterns.len())
            .field("pending_timers", &self.timers.len())
            .field("history", &self.history.len())
            .finish()
    }
}
