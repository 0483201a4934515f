//! Error types for the data link.
//!
//! Only caller contract violations ever leave [`crate::engine::Engine`] as
//! an `Err`.  Channel faults (corruption, stray sequence numbers, duplicates)
//! are recovered locally and never surface here as errors.

use thiserror::Error;

/// A [`crate::config::LinkConfig`] that cannot drive the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `max_seq + 1` must be even and the "no ack" sentinel must fit a byte.
    #[error("max_seq must be odd and below 255, got {0}")]
    InvalidMaxSeq(u8),
    #[error("pkt_len must be at least 1")]
    ZeroPacketLen,
    #[error("data_timer must be non-zero")]
    ZeroDataTimer,
    /// The ACK coalescing delay has to expire well before a retransmit.
    #[error("ack_timer ({ack_ms} ms) must be shorter than data_timer ({data_ms} ms)")]
    AckTimerTooLong { ack_ms: u128, data_ms: u128 },
}

/// Reasons a received buffer is rejected by [`crate::frame::Frame::decode`].
///
/// Every variant is treated as corruption by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame of {0} bytes is shorter than the minimum header")]
    TooShort(usize),
    #[error("checksum mismatch: computed {computed:#010x}, trailer {trailer:#010x}")]
    ChecksumMismatch { computed: u32, trailer: u32 },
    #[error("unknown frame kind {0}")]
    UnknownKind(u8),
    /// A DATA frame too short to hold its sequence number.
    #[error("data frame is missing its sequence number")]
    MissingSeq,
}

/// Errors returned by [`crate::engine::Engine`] and
/// [`crate::simulator::Simulator`].
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("invalid link configuration: {0}")]
    Config(#[from] ConfigError),
    /// The network layer handed over more bytes than a frame can carry.
    #[error("packet of {len} bytes exceeds the {max}-byte frame payload")]
    PacketTooLarge { len: usize, max: usize },
    /// A simulator fault probability outside `[0, 1]`.
    #[error("{name} must be within [0, 1], got {value}")]
    InvalidRate { name: &'static str, value: f64 },
}
