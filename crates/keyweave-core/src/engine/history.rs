// Keyweave Match Records
// Immutable match records and the bounded history ring

use std::collections::VecDeque;
use std::fmt;

use crate::{NormalizedKeyEvent, PatternDefinition, PatternType};

/// One recognized pattern occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPattern {
    pub pattern_id: String,
    pub name: Option<String>,
    pub kind: PatternType,
    /// Timestamp of the first contributing event
    pub start: u64,
    /// Timestamp the pattern was satisfied at
    pub end: u64,
    pub duration_ms: u64,
    /// Contributing events in order
    pub events: Vec<NormalizedKeyEvent>,
    /// Host time the match was emitted
    pub matched_at: u64,
}

impl MatchedPattern {
    pub(crate) fn new(
        definition: &PatternDefinition,
        start: u64,
        end: u64,
        events: Vec<NormalizedKeyEvent>,
        matched_at: u64,
    ) -> Self {
        Self {
            pattern_id: definition.id.clone(),
            name: definition.name.clone(),
            kind: definition.pattern_type(),
            start,
            end,
            duration_ms: end.saturating_sub(start),
            events,
            matched_at,
        }
    }
}

impl fmt::Display for MatchedPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.pattern_id)?;
        if let Some(name) = &self.name {
            write!(f, " ({})", name)?;
        }
        let keys: Vec<&str> = self.events.iter().map(|e| e.key.as_str()).collect();
        write!(
            f,
            " [{}] {}..{} {}ms",
            keys.join(" "),
            self.start,
            self.end,
            self.duration_ms
        )
    }
}

/// Bounded ring of recent matches, oldest evicted first
#[derive(Debug, Clone)]
pub struct MatchHistory {
    entries: VecDeque<MatchedPattern>,
    capacity: usize,
}

impl MatchHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    pub fn push(&mut self, matched: MatchedPattern) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(matched);
    }

    /// Most recent match
    pub fn latest(&self) -> Option<&MatchedPattern> {
        self.entries.back()
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &MatchedPattern> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(id: &str, at: u64) -> MatchedPattern {
        let definition = PatternDefinition::hold(id, "Space", 100);
        MatchedPattern::new(&definition, at, at + 100, Vec::new(), at + 100)
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut history = MatchHistory::new(2);
        history.push(matched("a", 0));
        history.push(matched("b", 10));
        history.push(matched("c", 20));
        let ids: Vec<&str> = history.iter().map(|m| m.pattern_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(history.latest().unwrap().pattern_id, "c");
    }

    #[test]
    fn test_matched_pattern_display() {
        let m = matched("charge", 0);
        assert_eq!(m.duration_ms, 100);
        assert_eq!(m.to_string(), "hold charge [] 0..100 100ms");
    }
}
