// Keyweave Engine Timers
// Host scheduler seam, virtual-clock scheduler and the owned timer registry

use std::collections::{BTreeMap, HashMap};

/// Opaque handle for one scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(pub u64);

/// A timer that came due, with the host time it was scheduled for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFire {
    pub token: TimerToken,
    pub deadline: u64,
}

/// Host deferred-callback facility.
///
/// The engine schedules a callback and later receives it through
/// `on_timer(token, now)`. Cancellation is synchronous: a cancelled token
/// must never be delivered.
pub trait Scheduler {
    /// Schedule a callback `delay_ms` after `now`
    fn schedule(&mut self, now: u64, delay_ms: u64) -> TimerToken;

    /// Cancel a scheduled callback; unknown tokens are ignored
    fn cancel(&mut self, token: TimerToken);

    /// Remove and return every timer due at or before `now`, earliest first.
    ///
    /// Schedulers that deliver callbacks themselves return nothing.
    fn take_due(&mut self, _now: u64) -> Vec<TimerFire> {
        Vec::new()
    }

    /// Number of callbacks still scheduled
    fn pending(&self) -> usize;
}

/// Virtual-clock scheduler: timers fire only when the clock is advanced
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_token: u64,
    // (deadline, token) orders ties by scheduling order
    queue: BTreeMap<(u64, TimerToken), ()>,
    deadlines: HashMap<TimerToken, u64>,
}

impl ManualScheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Earliest scheduled deadline
    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Deadline of a scheduled token
    pub fn deadline_of(&self, token: TimerToken) -> Option<u64> {
        self.deadlines.get(&token).copied()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, now: u64, delay_ms: u64) -> TimerToken {
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        let deadline = now.saturating_add(delay_ms);
        self.queue.insert((deadline, token), ());
        self.deadlines.insert(token, deadline);
        token
    }

    fn cancel(&mut self, token: TimerToken) {
        if let Some(deadline) = self.deadlines.remove(&token) {
            self.queue.remove(&(deadline, token));
        }
    }

    fn take_due(&mut self, now: u64) -> Vec<TimerFire> {
        let mut fired = Vec::new();
        while let Some((&(deadline, token), _)) = self.queue.iter().next() {
            if deadline > now {
                break;
            }
            self.queue.remove(&(deadline, token));
            self.deadlines.remove(&token);
            fired.push(TimerFire { token, deadline });
        }
        fired
    }

    fn pending(&self) -> usize {
        self.deadlines.len()
    }
}

/// What an engine timer is for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    /// Hold completion for a pattern id
    Hold(String),
    /// Chord settle confirmation
    ChordSettle,
}

/// Owned registry of outstanding engine timers.
///
/// Every token lives here until it is cancelled or fires, never both.
#[derive(Debug, Default)]
pub struct TimerRegistry {
    by_slot: HashMap<TimerSlot, TimerToken>,
    by_token: HashMap<TimerToken, TimerSlot>,
}

impl TimerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a timer for a slot, cancelling the one it replaces
    pub fn arm<S: Scheduler>(&mut self, scheduler: &mut S, slot: TimerSlot, now: u64, delay_ms: u64) -> TimerToken {
        self.cancel(scheduler, &slot);
        let token = scheduler.schedule(now, delay_ms);
        self.by_slot.insert(slot.clone(), token);
        self.by_token.insert(token, slot);
        token
    }

    /// Cancel the timer for a slot, if armed
    pub fn cancel<S: Scheduler>(&mut self, scheduler: &mut S, slot: &TimerSlot) -> bool {
        match self.by_slot.remove(slot) {
            Some(token) => {
                self.by_token.remove(&token);
                scheduler.cancel(token);
                true
            }
            None => false,
        }
    }

    /// Cancel every outstanding timer
    pub fn cancel_all<S: Scheduler>(&mut self, scheduler: &mut S) {
        for (token, _) in self.by_token.drain() {
            scheduler.cancel(token);
        }
        self.by_slot.clear();
    }

    /// Claim a fired token. Returns `None` for tokens this registry no
    /// longer owns (already cancelled or fired).
    pub fn take_fired(&mut self, token: TimerToken) -> Option<TimerSlot> {
        let slot = self.by_token.remove(&token)?;
        self.by_slot.remove(&slot);
        Some(slot)
    }

    /// Check whether a slot has an armed timer
    pub fn is_armed(&self, slot: &TimerSlot) -> bool {
        self.by_slot.contains_key(slot)
    }

    /// Check whether a token is owned by this registry
    pub fn owns(&self, token: TimerToken) -> bool {
        self.by_token.contains_key(&token)
    }

    /// Get the number of armed timers
    pub fn len(&self) -> usize {
        self.by_slot.len()
    }

    /// Check if no timer is armed
    pub fn is_empty(&self) -> bool {
        self.by_slot.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_scheduler_fires_in_deadline_order() {
        let mut scheduler = ManualScheduler::new();
        let late = scheduler.schedule(0, 500);
        let early = scheduler.schedule(10, 40);
        assert_eq!(scheduler.next_deadline(), Some(50));
        assert!(scheduler.take_due(49).is_empty());

        let fired = scheduler.take_due(1000);
        assert_eq!(
            fired,
            vec![
                TimerFire { token: early, deadline: 50 },
                TimerFire { token: late, deadline: 500 },
            ]
        );
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut scheduler = ManualScheduler::new();
        let token = scheduler.schedule(0, 100);
        scheduler.cancel(token);
        assert!(scheduler.take_due(200).is_empty());
        // Second cancel is a no-op
        scheduler.cancel(token);
    }

    #[test]
    fn test_registry_rearm_cancels_previous() {
        let mut scheduler = ManualScheduler::new();
        let mut registry = TimerRegistry::new();
        let first = registry.arm(&mut scheduler, TimerSlot::ChordSettle, 0, 50);
        let second = registry.arm(&mut scheduler, TimerSlot::ChordSettle, 20, 50);
        assert_ne!(first, second);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.deadline_of(second), Some(70));
        assert!(!registry.owns(first));
    }

    #[test]
    fn test_registry_take_fired_once() {
        let mut scheduler = ManualScheduler::new();
        let mut registry = TimerRegistry::new();
        let token = registry.arm(&mut scheduler, TimerSlot::Hold("charge".into()), 0, 500);
        assert_eq!(registry.take_fired(token), Some(TimerSlot::Hold("charge".into())));
        assert_eq!(registry.take_fired(token), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_cancel_all() {
        let mut scheduler = ManualScheduler::new();
        let mut registry = TimerRegistry::new();
        registry.arm(&mut scheduler, TimerSlot::Hold("a".into()), 0, 500);
        registry.arm(&mut scheduler, TimerSlot::Hold("b".into()), 0, 700);
        registry.arm(&mut scheduler, TimerSlot::ChordSettle, 0, 50);
        registry.cancel_all(&mut scheduler);
        assert!(registry.is_empty());
        assert_eq!(scheduler.pending(), 0);
    }
}
