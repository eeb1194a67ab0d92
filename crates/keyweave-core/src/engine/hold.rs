// Keyweave Hold Matcher
// Sustained single-key holds with live progress, fired mid-press by timer

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{
    HoldSpec, Key, MatchedPattern, Modifier, NormalizedKeyEvent, PatternDefinition, PatternKind, PatternSet,
    PatternType,
};

/// Live progress of one hold pattern
#[derive(Debug, Clone, PartialEq)]
pub struct HoldProgress {
    pub pattern_id: String,
    pub key: Key,
    pub started_at: u64,
    pub required_ms: u64,
    pub elapsed_ms: u64,
    pub remaining_ms: u64,
    /// 0.0 to 100.0
    pub percent: f32,
    pub completed: bool,
}

impl HoldProgress {
    fn new(pattern_id: &str, key: Key, started_at: u64, required_ms: u64) -> Self {
        Self {
            pattern_id: pattern_id.to_string(),
            key,
            started_at,
            required_ms,
            elapsed_ms: 0,
            remaining_ms: required_ms,
            percent: 0.0,
            completed: false,
        }
    }

    fn update(&mut self, now: u64) {
        if self.completed {
            return;
        }
        self.elapsed_ms = now.saturating_sub(self.started_at).min(self.required_ms);
        self.remaining_ms = self.required_ms - self.elapsed_ms;
        self.percent = if self.required_ms == 0 {
            100.0
        } else {
            self.elapsed_ms as f32 * 100.0 / self.required_ms as f32
        };
    }

    fn complete(&mut self) {
        self.elapsed_ms = self.required_ms;
        self.remaining_ms = 0;
        self.percent = 100.0;
        self.completed = true;
    }
}

/// Hold-relevant keys currently down and the progress of each hold
#[derive(Debug, Default)]
pub struct HoldTracker {
    pressed: HashMap<Key, NormalizedKeyEvent>,
    progress: IndexMap<String, HoldProgress>,
}

fn hold_spec(definition: &PatternDefinition) -> Option<&HoldSpec> {
    match &definition.kind {
        PatternKind::Hold(spec) => Some(spec),
        _ => None,
    }
}

fn requires_modifier(spec: &HoldSpec, modifier: Modifier) -> bool {
    spec.key.modifiers.requires_held(modifier)
        || spec
            .required_modifiers
            .as_ref()
            .is_some_and(|required| required.requires_held(modifier))
}

impl HoldTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start progress for every hold pattern this press satisfies.
    /// Returns `(pattern id, delay)` for each timer to arm.
    pub fn on_press(
        &mut self,
        event: &NormalizedKeyEvent,
        patterns: &PatternSet,
        default_duration_ms: u64,
    ) -> Vec<(String, u64)> {
        let mut arms = Vec::new();
        if !event.is_initial_press() {
            return arms;
        }
        for definition in patterns.of_type(PatternType::Hold) {
            let Some(spec) = hold_spec(definition) else {
                continue;
            };
            if !spec.key.matches(event, definition.case_sensitive) {
                continue;
            }
            if let Some(required) = &spec.required_modifiers {
                if !required.is_satisfied_by(&event.modifiers) {
                    continue;
                }
            }
            if self.progress.contains_key(&definition.id) {
                continue;
            }
            let duration = spec.min_duration_ms.unwrap_or(default_duration_ms);
            self.pressed.insert(event.key.clone(), event.clone());
            self.progress.insert(
                definition.id.clone(),
                HoldProgress::new(&definition.id, event.key.clone(), event.timestamp, duration),
            );
            arms.push((definition.id.clone(), duration));
        }
        arms
    }

    /// Drop progress ended by a release. Returns the ids of holds that were
    /// still running, whose timers must be cancelled.
    pub fn on_release(&mut self, event: &NormalizedKeyEvent, patterns: &PatternSet) -> Vec<String> {
        let mut cancelled = Vec::new();
        if self.pressed.remove(&event.key).is_some() {
            self.progress.retain(|id, progress| {
                if progress.key != event.key {
                    return true;
                }
                if !progress.completed {
                    cancelled.push(id.clone());
                }
                false
            });
        }

        // Releasing a required modifier ends the hold early
        if let Some(modifier) = Modifier::from_key(&event.key) {
            if !event.modifiers.is_active(modifier) {
                self.progress.retain(|id, progress| {
                    let required = patterns
                        .get(id)
                        .and_then(hold_spec)
                        .is_some_and(|spec| requires_modifier(spec, modifier));
                    if required && !progress.completed {
                        cancelled.push(id.clone());
                        return false;
                    }
                    true
                });
            }
        }
        cancelled
    }

    /// Complete a hold whose timer fired.
    ///
    /// Returns `None` when the progress is gone or the pattern no longer
    /// exists; such a timer is stale.
    pub fn fire(&mut self, pattern_id: &str, now: u64, patterns: &PatternSet) -> Option<MatchedPattern> {
        let definition = patterns.get(pattern_id)?;
        let progress = self.progress.get_mut(pattern_id)?;
        if progress.completed {
            return None;
        }
        let press = self.pressed.get(&progress.key)?;
        progress.complete();
        let start = progress.started_at;
        let end = start.saturating_add(progress.required_ms);
        Some(MatchedPattern::new(definition, start, end, vec![press.clone()], now))
    }

    /// Recompute elapsed/remaining/percent at `now`
    pub fn refresh(&mut self, now: u64) {
        for progress in self.progress.values_mut() {
            progress.update(now);
        }
    }

    pub fn progress(&self) -> &IndexMap<String, HoldProgress> {
        &self.progress
    }

    pub fn get(&self, pattern_id: &str) -> Option<&HoldProgress> {
        self.progress.get(pattern_id)
    }

    pub fn clear(&mut self) {
        self.pressed.clear();
        self.progress.clear();
    }
}
