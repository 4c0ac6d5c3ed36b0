//! Message reassembly.
//!
//! A message larger than one frame is sent as a run of full frames followed
//! by a shorter one. This module buffers frames until the short one arrives.

use bytes::{Bytes, BytesMut};

use crate::packet_codec::Packet;

/// A complete message reassembled from one or more frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Sequence number of the message's first frame.
    pub sequence: u8,
    /// The complete message payload (all frames combined).
    pub payload: Bytes,
}

impl Message {
    /// Create a message from a single, final frame.
    #[must_use]
    pub fn from_packet(packet: Packet) -> Self {
        Self {
            sequence: packet.header.sequence,
            payload: packet.payload.freeze(),
        }
    }

    /// Get the message payload length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the message is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Reassembles frames into complete messages.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    buffer: BytesMut,
    first_sequence: Option<u8>,
    packet_count: usize,
}

impl MessageAssembler {
    /// Create a new message assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame into the assembler.
    ///
    /// Returns `Some(Message)` if this frame completes a message,
    /// `None` if more frames are needed.
    pub fn push(&mut self, packet: Packet) -> Option<Message> {
        let sequence = *self.first_sequence.get_or_insert(packet.header.sequence);
        let continued = packet.is_continued();

        self.buffer.extend_from_slice(&packet.payload);
        self.packet_count += 1;

        tracing::trace!(
            sequence = packet.header.sequence,
            packet_count = self.packet_count,
            buffer_len = self.buffer.len(),
            continued,
            "assembling message"
        );

        if continued {
            return None;
        }

        self.first_sequence = None;
        self.packet_count = 0;
        Some(Message {
            sequence,
            payload: self.buffer.split().freeze(),
        })
    }

    /// Check if the assembler has partial data buffered.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        self.first_sequence.is_some()
    }

    /// Number of payload bytes buffered for the partial message.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Get the number of frames accumulated so far.
    #[must_use]
    pub fn packet_count(&self) -> usize {
        self.packet_count
    }

    /// Clear any partial message data.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.first_sequence = None;
        self.packet_count = 0;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mysql_protocol::MAX_PAYLOAD_LEN;

    #[test]
    fn test_single_frame_message() {
        let mut assembler = MessageAssembler::new();
        let message = assembler
            .push(Packet::new(1, &b"hello"[..]).unwrap())
            .unwrap();

        assert_eq!(message.sequence, 1);
        assert_eq!(&message.payload[..], b"hello");
        assert!(!assembler.has_partial());
    }

    #[test]
    fn test_multi_frame_message() {
        let mut assembler = MessageAssembler::new();

        let full = Packet::new(4, BytesMut::zeroed(MAX_PAYLOAD_LEN)).unwrap();
        assert!(assembler.push(full).is_none());
        assert!(assembler.has_partial());
        assert_eq!(assembler.packet_count(), 1);
        assert_eq!(assembler.buffered_len(), MAX_PAYLOAD_LEN);

        let message = assembler.push(Packet::new(5, &b"tail"[..]).unwrap()).unwrap();
        assert_eq!(message.sequence, 4);
        assert_eq!(message.len(), MAX_PAYLOAD_LEN + 4);
        assert_eq!(&message.payload[MAX_PAYLOAD_LEN..], b"tail");
        assert_eq!(assembler.packet_count(), 0);
    }

    #[test]
    fn test_empty_terminating_frame() {
        let mut assembler = MessageAssembler::new();
        assert!(
            assembler
                .push(Packet::new(0, BytesMut::zeroed(MAX_PAYLOAD_LEN)).unwrap())
                .is_none()
        );
        let message = assembler.push(Packet::new(1, BytesMut::new()).unwrap()).unwrap();
        assert_eq!(message.len(), MAX_PAYLOAD_LEN);
    }

    #[test]
    fn test_clear() {
        let mut assembler = MessageAssembler::new();
        assembler.push(Packet::new(0, BytesMut::zeroed(MAX_PAYLOAD_LEN)).unwrap());
        assembler.clear();
        assert!(!assembler.has_partial());
        assert_eq!(assembler.packet_count(), 0);
        assert_eq!(assembler.buffered_len(), 0);
    }
}
