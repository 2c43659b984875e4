//! Per-lobby delayed events, drained by the lobby at tick boundaries

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use uuid::Uuid;

/// Deferred effect scheduled by the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Refill the magazine and clear the reloading flag; stale if the
    /// token no longer matches
    ReloadComplete { player_id: Uuid, token: u64 },
    /// Dash cooldown elapsed
    DashReady { player_id: Uuid },
    /// Automatic respawn; stale if the token no longer matches
    Respawn { player_id: Uuid, token: u64 },
}

#[derive(Debug)]
struct Scheduled {
    fire_at: u64,
    seq: u64,
    event: TimerEvent,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed so the max-heap pops the earliest fire time first,
    // insertion order breaking ties
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of deferred events ordered by fire time
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, fire_at: u64, event: TimerEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Scheduled { fire_at, seq, event });
    }

    /// Remove and return every event due at `now`, earliest first
    pub fn pop_due(&mut self, now: u64) -> Vec<TimerEvent> {
        let mut due = Vec::new();
        while self.heap.peek().map_or(false, |s| s.fire_at <= now) {
            if let Some(scheduled) = self.heap.pop() {
                due.push(scheduled.event);
            }
        }
        due
    }

    /// Fire time of the next pending event
    pub fn next_fire_at(&self) -> Option<u64> {
        self.heap.peek().map(|s| s.fire_at)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Latest token issued per player for a cancellable event
#[derive(Debug, Default)]
pub struct TokenTable {
    current: HashMap<Uuid, u64>,
    next: u64,
}

impl TokenTable {
    /// Issue a fresh token, superseding any earlier one for `id`
    pub fn issue(&mut self, id: Uuid) -> u64 {
        self.next += 1;
        self.current.insert(id, self.next);
        self.next
    }

    pub fn cancel(&mut self, id: Uuid) {
        self.current.remove(&id);
    }

    /// Consume `token` if it is still the current one for `id`
    pub fn redeem(&mut self, id: Uuid, token: u64) -> bool {
        if self.current.get(&id) == Some(&token) {
            self.current.remove(&id);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.current.clear();
    }
}
