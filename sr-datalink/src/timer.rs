//! Keyed countdown timers.
//!
//! The link keeps one retransmission timer per outstanding sequence number
//! plus a single ACK coalescing timer.  [`TimerQueue`] stores them as a
//! priority queue of `(deadline, key)` pairs with cancel-by-key:
//!
//! - [`TimerQueue::start`] on a key that already runs **replaces** it.
//! - [`TimerQueue::stop`] on a key with no timer is a no-op.
//! - [`TimerQueue::remaining`] reports the time left, which the NAK guard
//!   compares against its threshold.
//!
//! Time is a [`Duration`] since an arbitrary epoch chosen by the caller
//! (the simulator uses virtual time starting at zero).  Cancelled and
//! replaced entries stay in the heap and are skipped lazily by generation.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;
use std::time::Duration;

/// Timers run by one station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKey {
    /// Retransmission timer of a data frame.
    Data(u8),
    /// The ACK coalescing timer.
    Ack,
}

/// Priority queue of deadlines, at most one per key.
#[derive(Debug)]
pub struct TimerQueue<K> {
    heap: BinaryHeap<Reverse<(Duration, u64, K)>>,
    /// Live timer of each key: `(deadline, generation)`.
    active: HashMap<K, (Duration, u64)>,
    generation: u64,
}

impl<K: Copy + Eq + Hash + Ord> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Eq + Hash + Ord> TimerQueue<K> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            active: HashMap::new(),
            generation: 0,
        }
    }

    /// Arm `key` to fire at `now + duration`, replacing any running timer.
    pub fn start(&mut self, key: K, now: Duration, duration: Duration) {
        self.generation += 1;
        let deadline = now + duration;
        self.active.insert(key, (deadline, self.generation));
        self.heap.push(Reverse((deadline, self.generation, key)));
    }

    /// Cancel `key`.  Unknown keys are ignored.
    pub fn stop(&mut self, key: K) {
        self.active.remove(&key);
    }

    pub fn is_running(&self, key: K) -> bool {
        self.active.contains_key(&key)
    }

    /// Time left before `key` fires, or `None` when it is not running.
    pub fn remaining(&self, key: K, now: Duration) -> Option<Duration> {
        self.active
            .get(&key)
            .map(|&(deadline, _)| deadline.saturating_sub(now))
    }

    /// Earliest live deadline.
    pub fn next_deadline(&mut self) -> Option<Duration> {
        self.discard_stale();
        self.heap.peek().map(|Reverse((deadline, _, _))| *deadline)
    }

    /// Remove and return the earliest timer whose deadline is `<= now`.
    pub fn pop_expired(&mut self, now: Duration) -> Option<K> {
        self.discard_stale();
        match self.heap.peek() {
            Some(Reverse((deadline, _, _))) if *deadline <= now => {}
            _ => return None,
        }
        let Reverse((_, _, key)) = self.heap.pop()?;
        self.active.remove(&key);
        Some(key)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse((_, generation, key))) = self.heap.peek() {
            match self.active.get(key) {
                Some(&(_, live)) if live == *generation => break,
                _ => {
                    self.heap.pop();
                }
            }
        }
    }
}
