// Keyweave Sequence Matcher
// Ordered subsequences over a bounded rolling buffer of presses

use std::collections::{HashMap, HashSet, VecDeque};

use crate::{Key, MatchedPattern, NormalizedKeyEvent, PatternDefinition, PatternKind, PatternSet, SequenceSpec};

#[derive(Debug, Clone)]
struct BufferedPress {
    seq: u64,
    event: NormalizedKeyEvent,
}

/// Rolling press buffer shared by every sequence pattern.
///
/// Modifier presses are buffered only when some sequence pattern names the
/// modifier as a step; otherwise holding Shift for a capital would break a
/// sequence. Each pattern keeps a floor below which buffered presses are
/// already spent for it, so one press never completes the same pattern
/// twice.
#[derive(Debug)]
pub struct SequenceMatcher {
    buffer: VecDeque<BufferedPress>,
    next_seq: u64,
    max_len: usize,
    default_timeout_ms: u64,
    /// Longest timeout across sequence patterns; gaps beyond it truncate
    /// the buffer for everyone
    max_timeout_ms: u64,
    floors: HashMap<String, u64>,
    step_modifiers: HashSet<Key>,
    sequence_start: Option<u64>,
    last_accepted: Option<u64>,
}

impl SequenceMatcher {
    pub fn new(max_len: usize, default_timeout_ms: u64) -> Self {
        Self {
            buffer: VecDeque::with_capacity(max_len),
            next_seq: 0,
            max_len: max_len.max(1),
            default_timeout_ms,
            max_timeout_ms: default_timeout_ms,
            floors: HashMap::new(),
            step_modifiers: HashSet::new(),
            sequence_start: None,
            last_accepted: None,
        }
    }

    /// Recompute per-pattern-set data after the pattern list changes
    pub fn configure(&mut self, patterns: &PatternSet) {
        self.step_modifiers.clear();
        self.max_timeout_ms = self.default_timeout_ms;
        for definition in patterns.iter() {
            if let PatternKind::Sequence(spec) = &definition.kind {
                self.max_timeout_ms = self.max_timeout_ms.max(self.timeout_of(spec));
                self.step_modifiers.extend(
                    spec.keys
                        .iter()
                        .filter(|matcher| matcher.key.is_modifier())
                        .map(|matcher| matcher.key.clone()),
                );
            }
        }
        self.floors.retain(|id, _| patterns.get(id).is_some());
    }

    fn timeout_of(&self, spec: &SequenceSpec) -> u64 {
        spec.timeout_ms.unwrap_or(self.default_timeout_ms)
    }

    /// Get the number of buffered presses
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Timestamp of the oldest press in the current run
    pub fn sequence_start(&self) -> Option<u64> {
        self.sequence_start
    }

    /// Timestamp of the most recent accepted press
    pub fn last_accepted(&self) -> Option<u64> {
        self.last_accepted
    }

    /// Accept an initial press and return every sequence it completes
    pub fn on_press(&mut self, event: &NormalizedKeyEvent, patterns: &PatternSet) -> Vec<MatchedPattern> {
        if !event.is_initial_press() {
            return Vec::new();
        }
        if event.key.is_modifier() && !self.step_modifiers.contains(&event.key) {
            return Vec::new();
        }

        if let Some(last) = self.last_accepted {
            if event.timestamp.saturating_sub(last) > self.max_timeout_ms {
                self.buffer.clear();
            }
        }
        if self.buffer.is_empty() {
            self.sequence_start = Some(event.timestamp);
        }
        self.next_seq += 1;
        let seq = self.next_seq;
        self.buffer.push_back(BufferedPress {
            seq,
            event: event.clone(),
        });
        while self.buffer.len() > self.max_len {
            self.buffer.pop_front();
        }
        if let Some(front) = self.buffer.front() {
            self.sequence_start = Some(front.event.timestamp);
        }
        self.last_accepted = Some(event.timestamp);

        let mut matches = Vec::new();
        for definition in patterns.iter() {
            let PatternKind::Sequence(spec) = &definition.kind else {
                continue;
            };
            match self.try_match(definition, spec, seq) {
                Some(matched) => {
                    self.floors.insert(definition.id.clone(), seq);
                    matches.push(matched);
                }
                None if spec.reset_on_mismatch => self.reset_if_broken(definition, spec, seq),
                None => {}
            }
        }
        matches
    }

    /// Buffered presses still available to a pattern, oldest first
    fn candidates(&self, definition: &PatternDefinition, spec: &SequenceSpec) -> Vec<&BufferedPress> {
        let floor = self.floors.get(&definition.id).copied().unwrap_or(0);
        self.buffer
            .iter()
            .filter(|press| press.seq > floor)
            .filter(|press| {
                !press.event.key.is_modifier() || spec.keys.iter().any(|matcher| matcher.key == press.event.key)
            })
            .collect()
    }

    /// Scan backward from the newest press for the most recent window that
    /// satisfies the pattern
    fn try_match(&self, definition: &PatternDefinition, spec: &SequenceSpec, newest: u64) -> Option<MatchedPattern> {
        let candidates = self.candidates(definition, spec);
        let last = candidates.last()?;
        if last.seq != newest {
            return None;
        }
        let case_sensitive = definition.case_sensitive;
        let timeout = self.timeout_of(spec);
        let (final_step, earlier_steps) = spec.keys.split_last()?;
        if !final_step.matches(&last.event, case_sensitive) {
            return None;
        }

        let mut picked = vec![&last.event];
        let mut steps = earlier_steps.iter().rev().peekable();
        let mut index = candidates.len() - 1;
        while let Some(step) = steps.peek() {
            if index == 0 {
                return None;
            }
            let newer = candidates[index];
            let older = candidates[index - 1];
            if newer.event.timestamp.saturating_sub(older.event.timestamp) > timeout {
                return None;
            }
            index -= 1;
            if step.matches(&older.event, case_sensitive) {
                picked.push(&older.event);
                steps.next();
            } else if !spec.allow_intervening {
                return None;
            }
        }

        picked.reverse();
        let start = picked.first().map(|e| e.timestamp)?;
        let end = last.event.timestamp;
        let events = picked.into_iter().cloned().collect();
        Some(MatchedPattern::new(definition, start, end, events, end))
    }

    /// Abandon partial progress when the newest press is a step of the
    /// pattern but not the one expected next
    fn reset_if_broken(&mut self, definition: &PatternDefinition, spec: &SequenceSpec, newest: u64) {
        let case_sensitive = definition.case_sensitive;
        let candidates = self.candidates(definition, spec);
        let Some((last, before)) = candidates.split_last() else {
            return;
        };
        if last.seq != newest {
            return;
        }

        let mut progress = 0;
        for press in before {
            if progress < spec.keys.len() && spec.keys[progress].matches(&press.event, case_sensitive) {
                progress += 1;
            }
        }
        let relevant = !spec.allow_intervening || spec.keys.iter().any(|matcher| matcher.key == last.event.key);
        let expected = spec.keys.get(progress);
        if !relevant || expected.is_some_and(|step| step.matches(&last.event, case_sensitive)) {
            return;
        }

        // The breaking press may itself begin a new attempt
        let restarts = spec.keys[0].matches(&last.event, case_sensitive);
        let floor = if restarts { newest - 1 } else { newest };
        self.floors.insert(definition.id.clone(), floor);
    }

    /// Drop all buffered presses and per-pattern progress
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.floors.clear();
        self.sequence_start = None;
        self.last_accepted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{normalize_event, ModifierTracker, RawKeyEvent};

    fn press(key: &str, at: u64) -> NormalizedKeyEvent {
        normalize_event(&RawKeyEvent::press(key, "", at), ModifierTracker::default(), true)
            .unwrap()
            .0
    }

    fn feed(matcher: &mut SequenceMatcher, patterns: &PatternSet, keys: &[(&str, u64)]) -> Vec<String> {
        let mut ids = Vec::new();
        for (key, at) in keys {
            for matched in matcher.on_press(&press(key, *at), patterns) {
                ids.push(format!("{}@{}", matched.pattern_id, at));
            }
        }
        ids
    }

    fn set(definitions: Vec<PatternDefinition>) -> (SequenceMatcher, PatternSet) {
        let (patterns, rejected) = PatternSet::build(definitions);
        assert!(rejected.is_empty());
        let mut matcher = SequenceMatcher::new(20, 1000);
        matcher.configure(&patterns);
        (matcher, patterns)
    }

    fn with_options(mut definition: PatternDefinition, intervening: bool, reset: bool) -> PatternDefinition {
        if let PatternKind::Sequence(spec) = &mut definition.kind {
            spec.allow_intervening = intervening;
            spec.reset_on_mismatch = reset;
        }
        definition
    }

    #[test]
    fn test_contiguous_sequence() {
        let (mut m, p) = set(vec![PatternDefinition::sequence("abc", ["a", "b", "c"], 300)]);
        assert_eq!(feed(&mut m, &p, &[("a", 0), ("b", 100), ("c", 200)]), vec!["abc@200"]);
    }

    #[test]
    fn test_gap_beyond_timeout_breaks_sequence() {
        let (mut m, p) = set(vec![PatternDefinition::sequence("abc", ["a", "b", "c"], 300)]);
        assert!(feed(&mut m, &p, &[("a", 0), ("b", 400), ("c", 500)]).is_empty());
    }

    #[test]
    fn test_intervening_key_fails_without_option() {
        let (mut m, p) = set(vec![PatternDefinition::sequence("abc", ["a", "b", "c"], 300)]);
        assert!(feed(&mut m, &p, &[("a", 0), ("x", 50), ("b", 100), ("c", 150)]).is_empty());
    }

    #[test]
    fn test_intervening_key_skipped_with_option() {
        let (mut m, p) = set(vec![with_options(
            PatternDefinition::sequence("abc", ["a", "b", "c"], 300),
            true,
            false,
        )]);
        assert_eq!(
            feed(&mut m, &p, &[("a", 0), ("x", 50), ("b", 100), ("c", 150)]),
            vec!["abc@150"]
        );
    }

    #[test]
    fn test_presses_are_not_reused_after_match() {
        let (mut m, p) = set(vec![PatternDefinition::sequence("aa", ["a", "a"], 300)]);
        assert_eq!(
            feed(&mut m, &p, &[("a", 0), ("a", 50), ("a", 100), ("a", 150)]),
            vec!["aa@50", "aa@150"]
        );
    }

    #[test]
    fn test_reset_on_mismatch_abandons_progress() {
        let keys = [("a", 0), ("b", 50), ("a", 100), ("c", 150)];
        let (mut lenient, p) = set(vec![with_options(
            PatternDefinition::sequence("abc", ["a", "b", "c"], 300),
            true,
            false,
        )]);
        assert_eq!(feed(&mut lenient, &p, &keys), vec!["abc@150"]);

        let (mut strict, p) = set(vec![with_options(
            PatternDefinition::sequence("abc", ["a", "b", "c"], 300),
            true,
            true,
        )]);
        assert!(feed(&mut strict, &p, &keys).is_empty());
        assert_eq!(
            feed(&mut strict, &p, &[("a", 200), ("b", 250), ("c", 300)]),
            vec!["abc@300"]
        );
    }

    #[test]
    fn test_unreferenced_modifiers_are_not_buffered() {
        let (mut m, p) = set(vec![PatternDefinition::sequence("jk", ["j", "k"], 300)]);
        assert_eq!(
            feed(&mut m, &p, &[("j", 0), ("Shift", 50), ("k", 100)]),
            vec!["jk@100"]
        );
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_buffer_is_bounded() {
        let (patterns, _) = PatternSet::build(vec![PatternDefinition::sequence("z", ["z"], 300)]);
        let mut m = SequenceMatcher::new(3, 1000);
        m.configure(&patterns);
        feed(&mut m, &patterns, &[("a", 0), ("b", 10), ("c", 20), ("d", 30)]);
        assert_eq!(m.len(), 3);
        assert_eq!(m.sequence_start(), Some(10));
    }

    #[test]
    fn test_match_span() {
        let (mut m, p) = set(vec![PatternDefinition::sequence("jk", ["j", "k"], 300)]);
        m.on_press(&press("j", 0), &p);
        let matches = m.on_press(&press("k", 120), &p);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].start, 0);
        assert_eq!(matches[0].end, 120);
        assert_eq!(matches[0].duration_ms, 120);
        assert_eq!(matches[0].events.len(), 2);
    }
}
