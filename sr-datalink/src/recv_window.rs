//! Selective-repeat receive-side window.
//!
//! [`RecvWindow`] implements the receiver of a selective-repeat link:
//!
//! - Any frame inside `[front, tail)` is **buffered**, even out of order.
//! - Payloads leave the window strictly in sequence order, as soon as the
//!   gap in front of them closes.
//! - A frame outside the window, or one that already arrived, is reported as
//!   [`DataOutcome::Duplicate`] and changes nothing.  The caller still acks
//!   it so the sender can retire its copy.
//! - On a corrupted frame the caller asks [`RecvWindow::choose_nak`] which
//!   missing frame to request again.
//!
//! The window keeps a constant width: `front` and `tail` always advance
//! together.  This module only manages state; acknowledgements and frame
//! I/O are the caller's responsibility.

use crate::seq::SeqSpace;

/// What happened to a structurally valid data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataOutcome {
    /// Buffered.  `delivered` holds the payloads released to the network
    /// layer by this arrival, in sequence order (often empty).
    Accepted { delivered: Vec<Vec<u8>> },
    /// Out of window or already buffered; nothing changed.
    Duplicate,
}

/// Receive-side state for one link.
#[derive(Debug)]
pub struct RecvWindow {
    space: SeqSpace,
    /// Lowest sequence number not yet delivered (lower edge, inclusive).
    front: u8,
    /// Upper edge, exclusive; always `front + window_size`.
    tail: u8,
    /// Furthest number known to be missing; bounds the NAK search.
    frame_expect_new: u8,
    /// Buffered payloads; `Some` is the "arrived" flag.
    slots: Vec<Option<Vec<u8>>>,
    /// NAKs already sent for the number occupying each slot.
    nak_counter: Vec<u32>,
}

impl RecvWindow {
    pub fn new(space: SeqSpace) -> Self {
        let width = space.window_size();
        Self {
            space,
            front: 0,
            tail: space.add(0, width),
            frame_expect_new: 0,
            slots: vec![None; width],
            nak_counter: vec![0; width],
        }
    }

    pub fn front(&self) -> u8 {
        self.front
    }

    pub fn tail(&self) -> u8 {
        self.tail
    }

    pub fn frame_expect_new(&self) -> u8 {
        self.frame_expect_new
    }

    /// `true` when `seq` falls inside `[front, tail)`.
    pub fn accepts(&self, seq: u8) -> bool {
        if !self.space.is_valid(seq) {
            log::warn!(
                "[dl] bad sequence number {seq}, expected at most {}",
                self.space.max_seq()
            );
            return false;
        }
        if self.front == self.tail {
            return false;
        }
        self.space.within_range(self.front, self.tail, seq)
    }

    /// `true` when `seq` is inside the window and already buffered.
    pub fn has_arrived(&self, seq: u8) -> bool {
        self.accepts(seq) && self.slots[self.space.slot(seq)].is_some()
    }

    /// NAKs sent so far for an in-window sequence number.
    pub fn nak_count(&self, seq: u8) -> Option<u32> {
        self.accepts(seq)
            .then(|| self.nak_counter[self.space.slot(seq)])
    }

    /// Process a data frame that passed checksum verification.
    pub fn on_data_frame(&mut self, seq: u8, payload: Vec<u8>) -> DataOutcome {
        if !self.accepts(seq) || self.slots[self.space.slot(seq)].is_some() {
            return DataOutcome::Duplicate;
        }

        let idx = self.space.slot(seq);
        self.slots[idx] = Some(payload);
        self.nak_counter[idx] = 0;
        self.advance_expect_new(seq);

        let mut delivered = Vec::new();
        loop {
            let idx = self.space.slot(self.front);
            let Some(payload) = self.slots[idx].take() else {
                break;
            };
            self.nak_counter[idx] = 0;
            self.front = self.space.next(self.front);
            self.tail = self.space.next(self.tail);
            delivered.push(payload);
        }

        if !self
            .space
            .within_range(self.front, self.tail, self.frame_expect_new)
        {
            self.frame_expect_new = self.front;
        }
        DataOutcome::Accepted { delivered }
    }

    /// Pick the missing frame to NAK after a corrupted arrival.
    ///
    /// Scans `front ..= frame_expect_new` and returns the unarrived number
    /// with the fewest NAKs so far, the earliest one on ties, after bumping
    /// its counter.  Returns `None` only if nothing in that span is missing.
    pub fn choose_nak(&mut self) -> Option<u8> {
        let mut best: Option<(u8, u32)> = None;
        let mut seq = self.front;
        for _ in 0..self.space.window_size() {
            let idx = self.space.slot(seq);
            if self.slots[idx].is_none() {
                let count = self.nak_counter[idx];
                if best.map_or(true, |(_, c)| count < c) {
                    best = Some((seq, count));
                }
            }
            if seq == self.frame_expect_new {
                break;
            }
            seq = self.space.next(seq);
        }

        let (seq, _) = best?;
        self.nak_counter[self.space.slot(seq)] += 1;
        Some(seq)
    }

    /// Push `frame_expect_new` out to the first hole at or after `seq`.
    ///
    /// Without a hole before `tail` the last in-window number is used, so
    /// every gap behind `seq` stays inside the NAK search.
    fn advance_expect_new(&mut self, seq: u8) {
        let last = self.space.add(self.tail, self.space.modulus() - 1);
        let mut candidate = last;
        let mut s = seq;
        while s != self.tail {
            if self.slots[self.space.slot(s)].is_none() {
                candidate = s;
                break;
            }
            s = self.space.next(s);
        }

        let reach = |v: u8| self.space.distance(self.front, v);
        if reach(candidate) > reach(self.frame_expect_new) {
            self.frame_expect_new = candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Window of 4 over sequence numbers 0..=7.
    fn window() -> RecvWindow {
        RecvWindow::new(SeqSpace::new(7).unwrap())
    }

    fn delivered(outcome: DataOutcome) -> Vec<Vec<u8>> {
        match outcome {
            DataOutcome::Accepted { delivered } => delivered,
            DataOutcome::Duplicate => panic!("frame unexpectedly treated as duplicate"),
        }
    }

    #[test]
    fn initial_state() {
        let r = window();
        assert_eq!(r.front(), 0);
        assert_eq!(r.tail(), 4);
        assert!(r.accepts(0));
        assert!(r.accepts(3));
        assert!(!r.accepts(4));
    }

    #[test]
    fn in_order_frame_delivered_immediately() {
        let mut r = window();
        assert_eq!(delivered(r.on_data_frame(0, b"a".to_vec())), vec![b"a".to_vec()]);
        assert_eq!(r.front(), 1);
        assert_eq!(r.tail(), 5);
    }

    #[test]
    fn out_of_order_frames_buffered_until_gap_closes() {
        let mut r = window();
        assert!(delivered(r.on_data_frame(2, b"c".to_vec())).is_empty());
        assert!(delivered(r.on_data_frame(1, b"b".to_vec())).is_empty());
        assert_eq!(r.front(), 0);

        let out = delivered(r.on_data_frame(0, b"a".to_vec()));
        assert_eq!(out, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(r.front(), 3);
        assert_eq!(r.tail(), 7);
    }

    #[test]
    fn duplicate_in_window_is_not_rebuffered() {
        let mut r = window();
        r.on_data_frame(2, b"first".to_vec());
        assert_eq!(r.on_data_frame(2, b"second".to_vec()), DataOutcome::Duplicate);

        r.on_data_frame(1, b"x".to_vec());
        let out = delivered(r.on_data_frame(0, b"y".to_vec()));
        assert_eq!(out[2], b"first".to_vec());
    }

    #[test]
    fn already_delivered_frame_is_duplicate() {
        let mut r = window();
        r.on_data_frame(0, b"a".to_vec());
        assert_eq!(r.on_data_frame(0, b"a".to_vec()), DataOutcome::Duplicate);
        assert_eq!(r.front(), 1);
    }

    #[test]
    fn invalid_sequence_number_is_a_noop() {
        let mut r = window();
        assert_eq!(r.on_data_frame(8, b"?".to_vec()), DataOutcome::Duplicate);
        assert_eq!(r.on_data_frame(250, b"?".to_vec()), DataOutcome::Duplicate);
        assert_eq!(r.front(), 0);
    }

    #[test]
    fn window_wraps_around_sequence_space() {
        let mut r = window();
        for seq in 0..6u8 {
            r.on_data_frame(seq, vec![seq]);
        }
        // front = 6, window = {6, 7, 0, 1}
        assert!(r.accepts(1));
        assert!(!r.accepts(2));
        assert!(delivered(r.on_data_frame(0, vec![8])).is_empty());
        let out = delivered(r.on_data_frame(7, vec![7]));
        assert!(out.is_empty());
        let out = delivered(r.on_data_frame(6, vec![6]));
        assert_eq!(out, vec![vec![6], vec![7], vec![8]]);
        assert_eq!(r.front(), 1);
    }

    #[test]
    fn expect_new_tracks_first_hole_after_arrival() {
        let mut r = window();
        r.on_data_frame(1, b"b".to_vec());
        assert_eq!(r.frame_expect_new(), 2);
        r.on_data_frame(2, b"c".to_vec());
        assert_eq!(r.frame_expect_new(), 3);
    }

    #[test]
    fn expect_new_never_moves_backwards() {
        let mut r = window();
        r.on_data_frame(2, b"c".to_vec());
        assert_eq!(r.frame_expect_new(), 3);
        r.on_data_frame(1, b"b".to_vec());
        assert_eq!(r.frame_expect_new(), 3);
    }

    #[test]
    fn expect_new_pulled_up_by_slide() {
        let mut r = window();
        r.on_data_frame(0, b"a".to_vec());
        r.on_data_frame(1, b"b".to_vec());
        assert_eq!(r.front(), 2);
        assert_eq!(r.frame_expect_new(), 2);
    }

    #[test]
    fn nak_targets_front_when_nothing_else_known() {
        let mut r = window();
        assert_eq!(r.choose_nak(), Some(0));
        assert_eq!(r.nak_count(0), Some(1));
    }

    #[test]
    fn nak_prefers_lowest_counter() {
        let mut r = window();
        r.on_data_frame(2, b"c".to_vec()); // 0, 1 and 3 missing
        assert_eq!(r.choose_nak(), Some(0));
        // counter[0] = 1, counter[1] = 0
        assert_eq!(r.choose_nak(), Some(1));
        assert_eq!(r.choose_nak(), Some(3));
        // all at 1 again: earliest wins
        assert_eq!(r.choose_nak(), Some(0));
    }

    #[test]
    fn nak_skips_arrived_frames() {
        let mut r = window();
        r.on_data_frame(1, b"b".to_vec());
        r.on_data_frame(3, b"d".to_vec());
        let mut picks = Vec::new();
        for _ in 0..4 {
            picks.push(r.choose_nak().unwrap());
        }
        assert_eq!(picks, vec![0, 2, 0, 2]);
    }

    #[test]
    fn arrival_resets_nak_counter() {
        let mut r = window();
        r.on_data_frame(3, b"d".to_vec());
        r.choose_nak(); // 0
        r.choose_nak(); // 1
        r.choose_nak(); // 2
        assert_eq!(r.nak_count(1), Some(1));
        r.on_data_frame(1, b"b".to_vec());
        assert_eq!(r.nak_count(1), Some(0));
    }

    #[test]
    fn reused_slot_starts_with_fresh_counter() {
        let mut r = window();
        r.choose_nak();
        r.choose_nak();
        assert_eq!(r.nak_count(0), Some(2));
        r.on_data_frame(0, b"a".to_vec());
        // 4 now occupies slot 0
        assert_eq!(r.nak_count(4), Some(0));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_arrival_order_delivers_in_sequence(
                order in Just((0u8..32).collect::<Vec<_>>()).prop_shuffle(),
                start in 0u8..64,
            ) {
                let space = SeqSpace::new(63).unwrap();
                let mut r = RecvWindow::new(space);
                // Move the window so the shuffled batch may straddle the wrap.
                for i in 0..start {
                    r.on_data_frame(i, vec![]);
                }
                let base = r.front();

                let mut out = Vec::new();
                for off in order.iter().copied() {
                    let seq = space.add(base, off as usize);
                    if let DataOutcome::Accepted { delivered } = r.on_data_frame(seq, vec![off]) {
                        out.extend(delivered);
                    }
                    // Replaying the same frame never delivers twice.
                    prop_assert_eq!(r.on_data_frame(seq, vec![off]), DataOutcome::Duplicate);
                }
                let expected: Vec<Vec<u8>> = (0u8..32).map(|i| vec![i]).collect();
                prop_assert_eq!(out, expected);
            }
        }
    }
}
