//! Wire format of data-link frames.
//!
//! Every buffer handed to the physical layer is an encoded [`Frame`].  This
//! module only transforms bytes; it knows nothing about windows or timers,
//! and in particular it does not interpret the `ack` field (the "no ack"
//! sentinel depends on the configured sequence space).
//!
//! # Wire format
//!
//! ```text
//!  DATA      +------+-----+-----+----------------------+-----------------+
//!            | kind | ack | seq | payload (0..=PKT_LEN) | CRC-32 (LE, 4)  |
//!            +------+-----+-----+----------------------+-----------------+
//!
//!  ACK / NAK +------+-----+-----------------+
//!            | kind | ack | CRC-32 (LE, 4)  |
//!            +------+-----+-----------------+
//! ```
//!
//! The CRC-32 (IEEE) covers every byte before the trailer.  For ACK and NAK
//! frames `ack` names the acknowledged / requested sequence number.

use crate::error::FrameError;

/// Size of the checksum trailer.
pub const CRC_LEN: usize = 4;
/// Header bytes of an ACK or NAK frame (kind + ack).
pub const CONTROL_HEADER_LEN: usize = 2;
/// Header bytes of a DATA frame (kind + ack + seq).
pub const DATA_HEADER_LEN: usize = 3;
/// Anything shorter is a framing error on the channel.
pub const MIN_FRAME_LEN: usize = CONTROL_HEADER_LEN + CRC_LEN;

const OFF_KIND: usize = 0;
const OFF_ACK: usize = 1;
const OFF_SEQ: usize = 2;

/// Frame type tag, the first byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Data = 1,
    Ack = 2,
    Nak = 3,
}

impl TryFrom<u8> for FrameKind {
    type Error = FrameError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            1 => Ok(Self::Data),
            2 => Ok(Self::Ack),
            3 => Ok(Self::Nak),
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}

/// One decoded frame.
///
/// `seq` and `payload` are meaningful only for [`FrameKind::Data`]; they are
/// zero / empty for control frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    /// Piggybacked ack (DATA) or the acknowledged / NAKed number (ACK, NAK).
    pub ack: u8,
    pub seq: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn data(seq: u8, ack: u8, payload: Vec<u8>) -> Self {
        Self {
            kind: FrameKind::Data,
            ack,
            seq,
            payload,
        }
    }

    pub fn ack(ack: u8) -> Self {
        Self::control(FrameKind::Ack, ack)
    }

    pub fn nak(nak: u8) -> Self {
        Self::control(FrameKind::Nak, nak)
    }

    fn control(kind: FrameKind, ack: u8) -> Self {
        Self {
            kind,
            ack,
            seq: 0,
            payload: Vec::new(),
        }
    }

    /// Serialise into a new buffer, checksum trailer included.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = match self.kind {
            FrameKind::Data => {
                let mut buf =
                    Vec::with_capacity(DATA_HEADER_LEN + self.payload.len() + CRC_LEN);
                buf.extend_from_slice(&[self.kind as u8, self.ack, self.seq]);
                buf.extend_from_slice(&self.payload);
                buf
            }
            FrameKind::Ack | FrameKind::Nak => {
                let mut buf = Vec::with_capacity(MIN_FRAME_LEN);
                buf.extend_from_slice(&[self.kind as u8, self.ack]);
                buf
            }
        };
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Parse a received buffer.
    ///
    /// Length and checksum are verified before any field is read, so a
    /// corrupted frame never leaks a half-trusted value.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < MIN_FRAME_LEN {
            return Err(FrameError::TooShort(buf.len()));
        }
        let (body, trailer) = buf.split_at(buf.len() - CRC_LEN);
        let trailer = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let computed = crc32fast::hash(body);
        if computed != trailer {
            return Err(FrameError::ChecksumMismatch { computed, trailer });
        }

        let kind = FrameKind::try_from(body[OFF_KIND])?;
        let ack = body[OFF_ACK];
        match kind {
            FrameKind::Data => {
                if body.len() < DATA_HEADER_LEN {
                    return Err(FrameError::MissingSeq);
                }
                Ok(Self::data(
                    body[OFF_SEQ],
                    ack,
                    body[DATA_HEADER_LEN..].to_vec(),
                ))
            }
            FrameKind::Ack | FrameKind::Nak => Ok(Self::control(kind, ack)),
        }
    }
}
