// Keyweave Input Pipeline
// Raw event -> Normalizer -> Held-Key Ledger -> Sequence Engine

use indexmap::IndexMap;

use crate::engine::{
    EngineConfig, HoldProgress, ManualScheduler, MatchHistory, Scheduler, SequenceEngine, TimerFire, TimerToken,
};
use crate::normalize::{NormalizedBatch, Normalizer, NormalizerConfig};
use crate::state::HeldKeyLedger;
use crate::{LockState, MatchedPattern, ModifierState, NormalizedKeyEvent, PatternDefinition, PatternError, RawKeyEvent};

/// Everything one pipeline step produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOutput {
    /// Normalized events in delivery order, releases annotated with timing
    pub events: Vec<NormalizedKeyEvent>,
    /// Matches in emission order
    pub matches: Vec<MatchedPattern>,
}

impl PipelineOutput {
    pub fn extend(&mut self, other: PipelineOutput) {
        self.events.extend(other.events);
        self.matches.extend(other.matches);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.matches.is_empty()
    }
}

/// One input stream's complete processing chain.
///
/// Owns the normalizer, ledger and engine exclusively. The normalizer's
/// held-back quirk events share the engine's scheduler through a flush
/// timer the pipeline owns.
///
/// While the filter holds an event back, engine timers due after that
/// event's timestamp are deferred: the held-back event happened first and
/// may cancel them once the filter resolves it.
pub struct InputPipeline<S: Scheduler = ManualScheduler> {
    normalizer: Normalizer,
    ledger: HeldKeyLedger,
    engine: SequenceEngine<S>,
    flush_timer: Option<(TimerToken, u64)>,
    // Sorted by deadline
    deferred: Vec<TimerFire>,
    focused: bool,
}

impl InputPipeline<ManualScheduler> {
    /// Create a pipeline on a virtual-clock scheduler
    pub fn new(engine: EngineConfig, normalizer: NormalizerConfig) -> Self {
        Self::with_scheduler(engine, normalizer, ManualScheduler::new())
    }
}

impl Default for InputPipeline<ManualScheduler> {
    fn default() -> Self {
        Self::new(EngineConfig::default(), NormalizerConfig::default())
    }
}

impl<S: Scheduler> InputPipeline<S> {
    /// Create a pipeline on a host scheduler
    pub fn with_scheduler(engine: EngineConfig, normalizer: NormalizerConfig, scheduler: S) -> Self {
        Self {
            normalizer: Normalizer::new(&normalizer),
            ledger: HeldKeyLedger::new(engine.tap_threshold_ms),
            engine: SequenceEngine::with_scheduler(engine, scheduler),
            flush_timer: None,
            deferred: Vec::new(),
            focused: true,
        }
    }

    /// Replace the normalizer, e.g. to install a custom quirk filter
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Process one raw notification.
    ///
    /// Timers due at or before the event's timestamp are delivered first.
    pub fn handle_raw(&mut self, raw: RawKeyEvent) -> PipelineOutput {
        let now = raw.timestamp;
        let mut output = self.advance_to(now);
        let batch = self.normalizer.normalize(raw);
        output.extend(self.deliver(batch));
        self.sync_flush_timer(now);
        output.matches.extend(self.fire_deferred(now));
        output
    }

    /// Deliver a fired timer.
    ///
    /// Engine timers firing after an event the filter still holds back wait
    /// until that event is flushed or dropped.
    pub fn on_timer(&mut self, token: TimerToken, now: u64) -> PipelineOutput {
        if self.flush_timer.is_some_and(|(flush, _)| flush == token) {
            self.flush_timer = None;
            let batch = self.normalizer.flush(now);
            let mut output = self.deliver(batch);
            self.sync_flush_timer(now);
            output.matches.extend(self.fire_deferred(now));
            return output;
        }
        if self.normalizer.pending_since().is_some_and(|held| now > held) {
            let at = self.deferred.partition_point(|fire| fire.deadline <= now);
            self.deferred.insert(at, TimerFire { token, deadline: now });
            return PipelineOutput::default();
        }
        PipelineOutput {
            events: Vec::new(),
            matches: self.engine.on_timer(token, now),
        }
    }

    /// Deliver deferred engine timers due at or before `now` that no
    /// held-back event precedes
    fn fire_deferred(&mut self, now: u64) -> Vec<MatchedPattern> {
        let limit = match self.normalizer.pending_since() {
            Some(held) => held.min(now),
            None => now,
        };
        let due = self.deferred.partition_point(|fire| fire.deadline <= limit);
        let fires: Vec<TimerFire> = self.deferred.drain(..due).collect();
        let mut matches = Vec::new();
        for fire in fires {
            matches.extend(self.engine.on_timer(fire.token, fire.deadline));
        }
        matches
    }

    /// Fire every timer due at or before `now`, each at its own deadline.
    ///
    /// Schedulers that deliver callbacks themselves have nothing due here.
    pub fn advance_to(&mut self, now: u64) -> PipelineOutput {
        let mut output = PipelineOutput::default();
        loop {
            let due = self.engine.scheduler_mut().take_due(now);
            if due.is_empty() {
                break;
            }
            for fire in due {
                output.extend(self.on_timer(fire.token, fire.deadline));
            }
        }
        output
    }

    fn deliver(&mut self, batch: NormalizedBatch) -> PipelineOutput {
        let mut output = PipelineOutput::default();
        for event in batch {
            output.matches.extend(self.fire_deferred(event.timestamp));
            let event = self.ledger.annotate(event);
            output.matches.extend(self.engine.process(&event));
            output.events.push(event);
        }
        output
    }

    fn sync_flush_timer(&mut self, now: u64) {
        let wanted = self.normalizer.pending_deadline();
        let current = self.flush_timer.map(|(_, deadline)| deadline);
        if wanted == current {
            return;
        }
        if let Some((token, _)) = self.flush_timer.take() {
            self.engine.scheduler_mut().cancel(token);
        }
        if let Some(deadline) = wanted {
            let token = self
                .engine
                .scheduler_mut()
                .schedule(now, deadline.saturating_sub(now));
            self.flush_timer = Some((token, deadline));
        }
    }

    fn cancel_flush_timer(&mut self) {
        if let Some((token, _)) = self.flush_timer.take() {
            self.engine.scheduler_mut().cancel(token);
        }
    }

    /// Report a focus change from the host.
    ///
    /// Losing focus force-releases every tracked key: held-back events are
    /// delivered, each held key gets a synthetic release that flows through
    /// the engine, and the modifier snapshot is cleared.
    pub fn set_focus(&mut self, focused: bool, now: u64) -> PipelineOutput {
        let mut output = PipelineOutput::default();
        if !focused && self.focused {
            output.extend(self.advance_to(now));
            self.cancel_flush_timer();
            let drained = self.normalizer.release_all();
            output.extend(self.deliver(drained));
            output.matches.extend(self.fire_deferred(now));
            let modifiers = self.normalizer.modifiers();
            let debug = crate::debug::enabled(self.engine.config().debug);
            for event in self.ledger.force_release_all(now, modifiers) {
                if debug {
                    log::debug!("focus lost: forcing {}", event);
                }
                output.matches.extend(self.engine.process(&event));
                output.events.push(event);
            }
        }
        self.focused = focused;
        output
    }

    /// Whether the host last reported focus
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Replace lock state from a host query
    pub fn set_lock_state(&mut self, locks: LockState) {
        self.normalizer.set_lock_state(locks);
    }

    /// Replace the pattern list; see [`SequenceEngine::set_patterns`]
    pub fn set_patterns(&mut self, definitions: impl IntoIterator<Item = PatternDefinition>) -> Vec<PatternError> {
        self.engine.set_patterns(definitions)
    }

    /// Reset engine state and forget held keys and modifiers
    pub fn reset(&mut self) {
        self.cancel_flush_timer();
        self.deferred.clear();
        self.normalizer.release_all();
        self.ledger.clear();
        self.engine.reset();
    }

    /// Current modifier snapshot
    pub fn modifiers(&self) -> ModifierState {
        self.normalizer.modifiers()
    }

    pub fn ledger(&self) -> &HeldKeyLedger {
        &self.ledger
    }

    pub fn engine(&self) -> &SequenceEngine<S> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SequenceEngine<S> {
        &mut self.engine
    }

    pub fn hold_progress(&self) -> &IndexMap<String, HoldProgress> {
        self.engine.hold_progress()
    }

    pub fn refresh_progress(&mut self, now: u64) -> &IndexMap<String, HoldProgress> {
        self.engine.refresh_progress(now)
    }

    pub fn history(&self) -> &MatchHistory {
        self.engine.history()
    }
}

impl<S: Scheduler> std::fmt::Debug for InputPipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputPipeline")
            .field("normalizer", &self.normalizer)
            .field("held", &self.ledger.len())
            .field("deferred", &self.deferred.len())
            .field("engine", &self.engine)
            .field("focused", &self.focused)
            .finish()
    }
}
