//! Modular sequence-number arithmetic.
//!
//! Frames are numbered `0..=max_seq` and the numbering wraps.  The window
//! is exactly half of the space: that is the largest window for which a
//! receiver can still tell a retransmission of an old frame from a brand
//! new frame carrying the same number.
//!
//! Sequence numbers are single bytes on the wire, so everything here is
//! `u8`.  Values above `max_seq` are never wrapped into range; every
//! predicate rejects them.

use crate::error::ConfigError;

/// The wrapping sequence space `[0, max_seq]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpace {
    max_seq: u8,
}

impl SeqSpace {
    /// Build a space whose highest number is `max_seq`.
    ///
    /// `max_seq` must be odd (so the space halves evenly into a window) and
    /// below 255 (so `max_seq + 1` is free to act as the "no ack" marker).
    pub fn new(max_seq: u8) -> Result<Self, ConfigError> {
        if max_seq % 2 == 0 || max_seq == u8::MAX {
            return Err(ConfigError::InvalidMaxSeq(max_seq));
        }
        Ok(Self { max_seq })
    }

    pub fn max_seq(&self) -> u8 {
        self.max_seq
    }

    /// Number of distinct sequence numbers (`SEQ_SPACE`).
    pub fn modulus(&self) -> usize {
        self.max_seq as usize + 1
    }

    /// Slots in each window: half the space.
    pub fn window_size(&self) -> usize {
        self.modulus() / 2
    }

    /// Wire value meaning "this data frame piggybacks no acknowledgement".
    pub fn no_ack(&self) -> u8 {
        self.max_seq + 1
    }

    #[inline]
    pub fn is_valid(&self, val: u8) -> bool {
        val <= self.max_seq
    }

    /// `val + 1` modulo the space.
    #[inline]
    pub fn next(&self, val: u8) -> u8 {
        self.add(val, 1)
    }

    /// `val + n` modulo the space.
    #[inline]
    pub fn add(&self, val: u8, n: usize) -> u8 {
        ((val as usize + n) % self.modulus()) as u8
    }

    /// Steps needed to walk forward from `from` to `to`.
    #[inline]
    pub fn distance(&self, from: u8, to: u8) -> usize {
        let m = self.modulus();
        (to as usize + m - from as usize) % m
    }

    /// Ring slot for `val` in a window-sized buffer.
    #[inline]
    pub fn slot(&self, val: u8) -> usize {
        val as usize % self.window_size()
    }

    /// `true` iff `val` lies in the circular half-open interval `[low, high)`.
    ///
    /// When `low > high` the interval wraps: `[low, max] ∪ [0, high)`.
    /// `low == high` is the empty interval; callers that can be either
    /// empty or full at `low == high` must decide that before asking.
    pub fn within_range(&self, low: u8, high: u8, val: u8) -> bool {
        if !self.is_valid(low) || !self.is_valid(high) || !self.is_valid(val) {
            return false;
        }
        if low <= high {
            low <= val && val < high
        } else {
            low <= val || val < high
        }
    }
}
