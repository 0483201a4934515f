//! Pending-acknowledgement queue.
//!
//! Acknowledgements for accepted data frames wait here for a ride on the
//! next outgoing data frame.  Whatever is still queued when the ACK timer
//! fires goes out as standalone ACK frames.
//!
//! The queue is a ring of `window_size` entries addressed by head / tail
//! counters that run modulo `2 × window_size`, so `head == tail` always
//! means empty and a full ring is still distinguishable.

/// Bounded FIFO of sequence numbers awaiting acknowledgement.
#[derive(Debug)]
pub struct AckQueue {
    ring: Vec<u8>,
    head: usize,
    tail: usize,
}

impl AckQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "ack queue capacity must be at least 1");
        Self {
            ring: vec![0; capacity],
            head: 0,
            tail: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    pub fn len(&self) -> usize {
        let wrap = 2 * self.capacity();
        (self.tail + wrap - self.head) % wrap
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Append `seq`.
    ///
    /// A full queue gives up its oldest entry to make room; the evicted
    /// number is returned and must be acknowledged right away.
    pub fn push(&mut self, seq: u8) -> Option<u8> {
        let evicted = if self.is_full() { self.pop() } else { None };
        let cap = self.capacity();
        self.ring[self.tail % cap] = seq;
        self.tail = (self.tail + 1) % (2 * cap);
        evicted
    }

    /// Remove and return the oldest entry.
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let cap = self.capacity();
        let seq = self.ring[self.head % cap];
        self.head = (self.head + 1) % (2 * cap);
        Some(seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let mut q = AckQueue::new(4);
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn fifo_order() {
        let mut q = AckQueue::new(4);
        q.push(5);
        q.push(2);
        q.push(7);
        assert_eq!(q.pop(), Some(5));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(7));
        assert!(q.is_empty());
    }

    #[test]
    fn full_is_not_empty() {
        let mut q = AckQueue::new(2);
        q.push(1);
        q.push(2);
        assert!(q.is_full());
        assert!(!q.is_empty());
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut q = AckQueue::new(2);
        assert_eq!(q.push(1), None);
        assert_eq!(q.push(2), None);
        assert_eq!(q.push(3), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
    }

    #[test]
    fn counters_wrap_many_times() {
        let mut q = AckQueue::new(3);
        for i in 0..50u8 {
            q.push(i);
            if i % 2 == 1 {
                assert_eq!(q.pop(), Some(i - 1));
                assert_eq!(q.pop(), Some(i));
            }
            assert!(q.len() <= 1);
        }
        assert!(q.is_empty());
    }
}
