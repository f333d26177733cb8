//! Segment and acknowledgment wire format
//!
//! There are exactly two message shapes and no type tag between them:
//!
//! - a **segment** is a fixed-size block of [`SEGMENT_SIZE`] bytes whose
//!   leading 4 bytes carry the sequence number;
//! - an **acknowledgment** is a bare 4-byte sequence number.
//!
//! The two are told apart by length alone. Integers are big-endian.

use crate::sequence::SeqNumber;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size of every segment on the wire (MTU 1500 - 40 bytes of IP/UDP headroom)
pub const SEGMENT_SIZE: usize = 1460;

/// Size of the sequence number stored at the front of each segment
pub const SEQ_FIELD_SIZE: usize = 4;

/// Application bytes carried by each segment
pub const PAYLOAD_SIZE: usize = SEGMENT_SIZE - SEQ_FIELD_SIZE;

/// Size of an acknowledgment on the wire
pub const ACK_SIZE: usize = 4;

/// Receive buffer size; larger than any valid datagram so oversized ones are
/// detected instead of silently truncated to a valid length
pub const RECV_BUFFER_SIZE: usize = 2048;

/// A numbered, fixed-size block of application data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    seq: SeqNumber,
    payload: Bytes,
}

impl Segment {
    /// Create a segment
    ///
    /// The payload is truncated or zero-padded to [`PAYLOAD_SIZE`].
    pub fn new(seq: SeqNumber, payload: &[u8]) -> Self {
        let mut buf = BytesMut::zeroed(PAYLOAD_SIZE);
        let n = payload.len().min(PAYLOAD_SIZE);
        buf[..n].copy_from_slice(&payload[..n]);
        Segment {
            seq,
            payload: buf.freeze(),
        }
    }

    /// Create a segment whose payload is filled with a byte derived from `seq`
    ///
    /// Used by the senders so the receiving side can check payload integrity.
    pub fn patterned(seq: SeqNumber) -> Self {
        Segment {
            seq,
            payload: Bytes::from(vec![pattern_byte(seq); PAYLOAD_SIZE]),
        }
    }

    pub fn seq_number(&self) -> SeqNumber {
        self.seq
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Check whether the payload matches [`Segment::patterned`]
    pub fn has_pattern(&self) -> bool {
        let expected = pattern_byte(self.seq);
        self.payload.iter().all(|&b| b == expected)
    }

    /// Serialize the segment to its fixed-size wire form
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(SEGMENT_SIZE);
        buf.put_u32(self.seq.as_raw());
        buf.put_slice(&self.payload);
        buf
    }

    /// Parse a segment from a datagram
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() != SEGMENT_SIZE {
            return Err(PacketError::WrongSize {
                kind: "segment",
                expected: SEGMENT_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = bytes;
        let seq = SeqNumber::new(buf.get_u32());

        Ok(Segment {
            seq,
            payload: Bytes::copy_from_slice(buf),
        })
    }
}

fn pattern_byte(seq: SeqNumber) -> u8 {
    (seq.as_raw() % 251) as u8
}

/// A single acknowledgment value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack(pub SeqNumber);

impl Ack {
    pub fn seq_number(self) -> SeqNumber {
        self.0
    }

    /// Serialize to the 4-byte wire form
    pub fn to_bytes(self) -> [u8; ACK_SIZE] {
        self.0.as_raw().to_be_bytes()
    }

    /// Parse an acknowledgment from a datagram
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        let raw: [u8; ACK_SIZE] = bytes.try_into().map_err(|_| PacketError::WrongSize {
            kind: "ack",
            expected: ACK_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Ack(SeqNumber::new(u32::from_be_bytes(raw))))
    }
}

/// Any datagram the protocol understands, classified by size
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    Segment(Segment),
    Ack(Ack),
}

impl Datagram {
    pub fn classify(bytes: &[u8]) -> Result<Self, PacketError> {
        match bytes.len() {
            SEGMENT_SIZE => Ok(Datagram::Segment(Segment::from_bytes(bytes)?)),
            ACK_SIZE => Ok(Datagram::Ack(Ack::from_bytes(bytes)?)),
            actual => Err(PacketError::Unrecognized(actual)),
        }
    }
}

/// Datagram parsing errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PacketError {
    #[error("Wrong {kind} size: expected {expected} bytes, got {actual}")]
    WrongSize {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Unrecognized datagram of {0} bytes")]
    Unrecognized(usize),
}
