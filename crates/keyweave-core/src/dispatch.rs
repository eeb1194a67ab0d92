// Keyweave Dispatch
// Host notification interface for matches and hold progress

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{HoldProgress, MatchedPattern};

/// Receiver of engine notifications.
///
/// Callbacks run synchronously inside event processing or timer handling,
/// so implementations must not block.
pub trait MatchSink: Send {
    /// Called once per emitted match
    fn on_match(&mut self, matched: &MatchedPattern);

    /// Called when hold progress starts, is refreshed or completes
    fn on_hold_progress(&mut self, _progress: &HoldProgress) {}

    /// Called when a running hold is abandoned without a match
    fn on_hold_cancelled(&mut self, _pattern_id: &str) {}
}

impl<F> MatchSink for F
where
    F: FnMut(&MatchedPattern) + Send,
{
    fn on_match(&mut self, matched: &MatchedPattern) {
        self(matched)
    }
}

/// Shared collector of matches, cloneable across owners
#[derive(Debug, Clone, Default)]
pub struct MatchLog {
    matches: Arc<Mutex<Vec<MatchedPattern>>>,
}

impl MatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every collected match, oldest first
    pub fn matches(&self) -> Vec<MatchedPattern> {
        self.matches.lock().clone()
    }

    /// Ids of collected matches, oldest first
    pub fn ids(&self) -> Vec<String> {
        self.matches.lock().iter().map(|m| m.pattern_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.matches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.lock().is_empty()
    }

    pub fn clear(&self) {
        self.matches.lock().clear();
    }
}

impl MatchSink for MatchLog {
    fn on_match(&mut self, matched: &MatchedPattern) {
        self.matches.lock().push(matched.clone());
    }
}
