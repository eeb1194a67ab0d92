// Keyweave Chord Matcher
// Simultaneously held key sets, confirmed after a settle delay

use indexmap::IndexMap;

use crate::{ChordSpec, Key, MatchedPattern, NormalizedKeyEvent, PatternKind, PatternSet, PatternType};

/// Active chord candidate: keys down and not yet released, in press order
#[derive(Debug, Default)]
pub struct ChordTracker {
    active: IndexMap<Key, NormalizedKeyEvent>,
    started_at: Option<u64>,
    already_matched: bool,
}

impl ChordTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a press to the candidate. Returns true when the settle timer
    /// should be (re)armed.
    pub fn on_press(&mut self, event: &NormalizedKeyEvent) -> bool {
        if event.repeat || self.active.contains_key(&event.key) {
            return false;
        }
        if self.active.is_empty() {
            self.started_at = Some(event.timestamp);
        }
        self.active.insert(event.key.clone(), event.clone());
        !self.already_matched
    }

    /// Remove a released key. Returns true when the candidate became empty,
    /// which also re-enables matching.
    pub fn on_release(&mut self, event: &NormalizedKeyEvent) -> bool {
        if self.active.shift_remove(&event.key).is_none() {
            return false;
        }
        if self.active.is_empty() {
            self.started_at = None;
            self.already_matched = false;
            return true;
        }
        false
    }

    /// Compare the settled candidate against every chord pattern.
    ///
    /// Patterns whose key set equals the candidate win over patterns that
    /// only match by permitting extra keys; every pattern in the winning
    /// tier is reported.
    pub fn evaluate(&mut self, patterns: &PatternSet, now: u64) -> Vec<MatchedPattern> {
        if self.already_matched || self.active.is_empty() {
            return Vec::new();
        }
        let mut exact = Vec::new();
        let mut with_extra = Vec::new();
        for definition in patterns.of_type(PatternType::Chord) {
            let PatternKind::Chord(spec) = &definition.kind else {
                continue;
            };
            let Some(events) = self.contributing(spec, definition.case_sensitive) else {
                continue;
            };
            let start = events.first().map(|e| e.timestamp).unwrap_or(now);
            let end = events.last().map(|e| e.timestamp).unwrap_or(now);
            if events.len() == self.active.len() {
                exact.push(MatchedPattern::new(definition, start, end, events, now));
            } else if spec.allow_extra {
                with_extra.push(MatchedPattern::new(definition, start, end, events, now));
            }
        }
        let matched = if exact.is_empty() { with_extra } else { exact };
        if !matched.is_empty() {
            self.already_matched = true;
        }
        matched
    }

    /// Events satisfying every key of the chord, in press order
    fn contributing(&self, spec: &ChordSpec, case_sensitive: bool) -> Option<Vec<NormalizedKeyEvent>> {
        for matcher in &spec.keys {
            let event = self.active.get(&matcher.key)?;
            if !matcher.matches(event, case_sensitive) {
                return None;
            }
        }
        Some(
            self.active
                .values()
                .filter(|event| spec.keys.iter().any(|matcher| matcher.key == event.key))
                .cloned()
                .collect(),
        )
    }

    /// Keys currently in the candidate, in press order
    pub fn active_keys(&self) -> impl Iterator<Item = &Key> {
        self.active.keys()
    }

    pub fn started_at(&self) -> Option<u64> {
        self.started_at
    }

    pub fn already_matched(&self) -> bool {
        self.already_matched
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.started_at = None;
        self.already_matched = false;
    }
}
