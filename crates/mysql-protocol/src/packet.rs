//! Packet envelope definitions.
//!
//! Every protocol message travels in one or more frames of the form
//! `[length: 3 bytes LE][sequence: 1 byte][payload: length bytes]`.

use bytes::{Buf, BufMut};

use crate::codec::unpack_le;
use crate::error::ProtocolError;

/// Packet header size in bytes.
pub const PACKET_HEADER_SIZE: usize = 4;

/// Largest payload a single frame can carry (2^24 - 1).
///
/// A frame of exactly this size signals that the message continues in the
/// next frame.
pub const MAX_PAYLOAD_LEN: usize = 0x00FF_FFFF;

/// Default max packet size advertised to the server (16 MiB - 1).
pub const DEFAULT_MAX_PACKET_SIZE: u32 = 0x00FF_FFFF;

/// Packet header.
///
/// The sequence number starts at 0 for the first packet of an exchange and
/// increments by one (wrapping at 256) for every packet in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketHeader {
    /// Payload length (24-bit).
    pub length: u32,
    /// Sequence number.
    pub sequence: u8,
}

impl PacketHeader {
    /// Create a header, validating the payload length.
    pub fn new(length: usize, sequence: u8) -> Result<Self, ProtocolError> {
        if length > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PacketTooLarge {
                size: length,
                max: MAX_PAYLOAD_LEN,
            });
        }

        Ok(Self {
            length: length as u32,
            sequence,
        })
    }

    /// Build a header from its four wire bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; PACKET_HEADER_SIZE]) -> Self {
        Self {
            length: unpack_le(&bytes, 3) as u32,
            sequence: bytes[3],
        }
    }

    /// Parse a packet header from a buffer.
    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        if src.remaining() < PACKET_HEADER_SIZE {
            return Err(ProtocolError::Incomplete {
                field: "packet header",
                expected: PACKET_HEADER_SIZE,
                actual: src.remaining(),
            });
        }

        let mut bytes = [0u8; PACKET_HEADER_SIZE];
        src.copy_to_slice(&mut bytes);
        Ok(Self::from_bytes(bytes))
    }

    /// The four wire bytes of this header.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PACKET_HEADER_SIZE] {
        let len = self.length.to_le_bytes();
        [len[0], len[1], len[2], self.sequence]
    }

    /// Encode the packet header.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(&self.to_bytes());
    }

    /// Payload length as `usize`.
    #[must_use]
    pub const fn payload_length(&self) -> usize {
        self.length as usize
    }

    /// Whether another frame of the same message follows this one.
    #[must_use]
    pub const fn is_continued(&self) -> bool {
        self.length as usize == MAX_PAYLOAD_LEN
    }
}
