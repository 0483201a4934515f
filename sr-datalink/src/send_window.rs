//! Selective-repeat send-side window.
//!
//! [`SendWindow`] holds every admitted data frame until the peer
//! acknowledges it.  Unlike Go-Back-N, acknowledgements are **selective**:
//! each names one frame.  The lower edge only moves across a contiguous run
//! of acknowledged frames ("cumulative-ack collapse"), but a frame acked
//! ahead of the edge is remembered so it is never retransmitted again.
//!
//! # Protocol contract
//!
//! - At most `window_size` frames are outstanding at once; the engine checks
//!   [`SendWindow::can_admit`] before pulling a packet from the network
//!   layer.
//! - An admitted frame is never dropped.  It stays in its slot, byte for
//!   byte, until acknowledged.
//!
//! This module only manages state; frame I/O and timers are the engine's
//! responsibility.

use crate::seq::SeqSpace;

// ---------------------------------------------------------------------------
// SendSlot
// ---------------------------------------------------------------------------

/// One outstanding frame.
#[derive(Debug, Clone)]
pub struct SendSlot {
    /// Network-layer packet carried by the frame.
    pub payload: Vec<u8>,
    /// Set once the peer acknowledged this exact sequence number.
    pub acked: bool,
    /// Total number of transmissions (1 = only the original send).
    pub tx_count: u32,
}

/// Result of a successful [`SendWindow::handle_ack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckOutcome {
    /// Slots released by advancing the lower edge (0 for an ack beyond it).
    pub collapsed: usize,
}

// ---------------------------------------------------------------------------
// SendWindow
// ---------------------------------------------------------------------------

/// Send-side state for one link.
///
/// # Sequence-number layout
///
/// ```text
///  oldest_frame_id        next_frame_id
///        │                      │
///  ──────┼──────────────────────┼──────────────▶ seq space (mod max_seq+1)
///        │ <── outstanding ───▶ │ <── admissible ─▶
/// ```
#[derive(Debug)]
pub struct SendWindow {
    space: SeqSpace,
    /// First frame not yet released (lower edge, inclusive).
    oldest_frame_id: u8,
    /// Number the next admitted frame receives (upper edge, exclusive).
    next_frame_id: u8,
    /// Frames currently held, i.e. `next - oldest` modulo the space.
    buffered: usize,
    /// Ring of `window_size` slots indexed by `seq % window_size`.
    slots: Vec<Option<SendSlot>>,
}

impl SendWindow {
    pub fn new(space: SeqSpace) -> Self {
        Self {
            space,
            oldest_frame_id: 0,
            next_frame_id: 0,
            buffered: 0,
            slots: vec![None; space.window_size()],
        }
    }

    pub fn oldest_frame_id(&self) -> u8 {
        self.oldest_frame_id
    }

    pub fn next_frame_id(&self) -> u8 {
        self.next_frame_id
    }

    /// Frames admitted but not yet released by the lower edge.
    pub fn outstanding(&self) -> usize {
        self.buffered
    }

    /// `true` while there is room for one more frame.
    pub fn can_admit(&self) -> bool {
        self.buffered < self.space.window_size()
    }

    pub fn is_empty(&self) -> bool {
        self.buffered == 0
    }

    /// Store `payload` under the next sequence number and return that number.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if the window is full.  Check [`can_admit`]
    /// first.
    ///
    /// [`can_admit`]: SendWindow::can_admit
    pub fn admit(&mut self, payload: Vec<u8>) -> u8 {
        debug_assert!(
            self.can_admit(),
            "admit called on a full send window ({} / {})",
            self.buffered,
            self.space.window_size()
        );
        let seq = self.next_frame_id;
        self.slots[self.space.slot(seq)] = Some(SendSlot {
            payload,
            acked: false,
            tx_count: 1,
        });
        self.next_frame_id = self.space.next(seq);
        self.buffered += 1;
        seq
    }

    /// `true` when `seq` is in `[oldest_frame_id, next_frame_id)`.
    pub fn is_outstanding(&self, seq: u8) -> bool {
        if !self.space.is_valid(seq) {
            return false;
        }
        // With a half-space window the edges only meet when nothing is held.
        if self.oldest_frame_id == self.next_frame_id {
            return false;
        }
        self.space
            .within_range(self.oldest_frame_id, self.next_frame_id, seq)
    }

    /// Outstanding and still waiting for its acknowledgement.
    pub fn is_pending(&self, seq: u8) -> bool {
        self.is_outstanding(seq) && self.slot(seq).is_some_and(|s| !s.acked)
    }

    /// Record the peer's acknowledgement of `ack_seq`.
    ///
    /// Returns `None` (and changes nothing) when `ack_seq` is invalid,
    /// outside the window, or already acknowledged.  Otherwise marks the
    /// slot and slides the lower edge across every acknowledged frame at
    /// the front of the window.
    pub fn handle_ack(&mut self, ack_seq: u8) -> Option<AckOutcome> {
        if !self.is_pending(ack_seq) {
            return None;
        }
        let idx = self.space.slot(ack_seq);
        if let Some(slot) = self.slots[idx].as_mut() {
            slot.acked = true;
        }

        let mut collapsed = 0;
        while self.oldest_frame_id != self.next_frame_id {
            let idx = self.space.slot(self.oldest_frame_id);
            match &self.slots[idx] {
                Some(slot) if slot.acked => {
                    self.slots[idx] = None;
                    self.oldest_frame_id = self.space.next(self.oldest_frame_id);
                    self.buffered -= 1;
                    collapsed += 1;
                }
                _ => break,
            }
        }
        Some(AckOutcome { collapsed })
    }

    /// Payload of an outstanding frame, for (re)transmission.
    pub fn frame(&self, seq: u8) -> Option<&[u8]> {
        if !self.is_outstanding(seq) {
            return None;
        }
        self.slot(seq).map(|s| s.payload.as_slice())
    }

    /// Bump the transmission count of a frame that is being resent.
    pub fn record_retransmit(&mut self, seq: u8) {
        if !self.is_outstanding(seq) {
            return;
        }
        let idx = self.space.slot(seq);
        if let Some(slot) = self.slots[idx].as_mut() {
            slot.tx_count += 1;
        }
    }

    /// Transmission count of an outstanding frame.
    pub fn tx_count(&self, seq: u8) -> Option<u32> {
        if !self.is_outstanding(seq) {
            return None;
        }
        self.slot(seq).map(|s| s.tx_count)
    }

    fn slot(&self, seq: u8) -> Option<&SendSlot> {
        self.slots[self.space.slot(seq)].as_ref()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
