//! Link parameters.
//!
//! The protocol has no runtime negotiation: both stations must be built
//! from the same [`LinkConfig`].  [`LinkConfig::default`] is the reference
//! configuration; the CLI overrides individual fields from flags.

use std::time::Duration;

use crate::error::ConfigError;
use crate::seq::SeqSpace;

/// Largest sequence number in the reference configuration (64 numbers).
pub const DEFAULT_MAX_SEQ: u8 = 63;
/// Payload bytes per data frame in the reference configuration.
pub const DEFAULT_PKT_LEN: usize = 256;

/// Sequence space, frame size, and timer durations for one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Highest sequence number; the space is `0..=max_seq`.
    pub max_seq: u8,
    /// Maximum payload carried by one data frame.
    pub pkt_len: usize,
    /// Retransmission timeout for an unacknowledged data frame.
    pub data_timer: Duration,
    /// How long an acknowledgement may wait for a piggyback ride.
    pub ack_timer: Duration,
    /// Time to clock one full-size frame onto the wire.
    ///
    /// Only used to age NAKs; the channel itself is external.
    pub frame_time: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_seq: DEFAULT_MAX_SEQ,
            pkt_len: DEFAULT_PKT_LEN,
            data_timer: Duration::from_millis(2000),
            ack_timer: Duration::from_millis(300),
            frame_time: Duration::from_millis(270),
        }
    }
}

impl LinkConfig {
    /// Check every field and return the sequence space it describes.
    pub fn validate(&self) -> Result<SeqSpace, ConfigError> {
        let space = SeqSpace::new(self.max_seq)?;
        if self.pkt_len == 0 {
            return Err(ConfigError::ZeroPacketLen);
        }
        if self.data_timer.is_zero() {
            return Err(ConfigError::ZeroDataTimer);
        }
        if self.ack_timer >= self.data_timer {
            return Err(ConfigError::AckTimerTooLong {
                ack_ms: self.ack_timer.as_millis(),
                data_ms: self.data_timer.as_millis(),
            });
        }
        Ok(space)
    }

    /// A NAK is honoured only while the frame's timer has more than this left.
    ///
    /// Saturates at zero when `ack_timer + frame_time` exceeds `data_timer`.
    pub fn nak_threshold(&self) -> Duration {
        self.data_timer
            .saturating_sub(self.ack_timer)
            .saturating_sub(self.frame_time)
    }
}
