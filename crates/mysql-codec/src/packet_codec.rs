//! MySQL packet codec implementation.

use bytes::{Buf, BufMut, BytesMut};
use mysql_protocol::{PACKET_HEADER_SIZE, PacketHeader};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;

/// A single frame with header and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Packet header.
    pub header: PacketHeader,
    /// Packet payload (excluding header).
    pub payload: BytesMut,
}

impl Packet {
    /// Build a packet, deriving the header length from the payload.
    pub fn new(sequence: u8, payload: impl Into<BytesMut>) -> Result<Self, CodecError> {
        let payload = payload.into();
        Ok(Self {
            header: PacketHeader::new(payload.len(), sequence)?,
            payload,
        })
    }

    /// Sequence number of this frame.
    #[must_use]
    pub fn sequence(&self) -> u8 {
        self.header.sequence
    }

    /// Get the total packet size including header.
    #[must_use]
    pub fn total_size(&self) -> usize {
        PACKET_HEADER_SIZE + self.payload.len()
    }

    /// Whether the message continues in the next frame.
    #[must_use]
    pub fn is_continued(&self) -> bool {
        self.header.is_continued()
    }
}

/// Packet codec for tokio-util framing.
///
/// The codec does not track sequence numbers; each [`Packet`] carries its
/// own. Callers that need sequence checking use [`crate::Connection`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCodec;

impl PacketCodec {
    /// Create a new packet codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < PACKET_HEADER_SIZE {
            return Ok(None);
        }

        let header = PacketHeader::from_bytes([src[0], src[1], src[2], src[3]]);
        let total = PACKET_HEADER_SIZE + header.payload_length();
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(PACKET_HEADER_SIZE);
        let payload = src.split_to(header.payload_length());

        tracing::trace!(
            length = header.length,
            sequence = header.sequence,
            "decoded packet"
        );

        Ok(Some(Packet { header, payload }))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let header = PacketHeader::new(item.payload.len(), item.header.sequence)?;

        dst.reserve(item.total_size());
        header.encode(dst);
        dst.put_slice(&item.payload);

        tracing::trace!(
            length = header.length,
            sequence = header.sequence,
            "encoded packet"
        );

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mysql_protocol::MAX_PAYLOAD_LEN;

    #[test]
    fn test_decode_packet() {
        let mut codec = PacketCodec::new();
        let mut data = BytesMut::from(&b"\x04\x00\x00\x02test\x01"[..]);

        let packet = codec.decode(&mut data).unwrap().unwrap();
        assert_eq!(packet.sequence(), 2);
        assert_eq!(&packet.payload[..], b"test");
        assert_eq!(&data[..], b"\x01");
    }

    #[test]
    fn test_decode_incomplete_packet() {
        let mut codec = PacketCodec::new();

        let mut header_only = BytesMut::from(&b"\x04\x00"[..]);
        assert!(codec.decode(&mut header_only).unwrap().is_none());

        let mut partial = BytesMut::from(&b"\x04\x00\x00\x00te"[..]);
        assert!(codec.decode(&mut partial).unwrap().is_none());
        assert_eq!(partial.len(), 6);
    }

    #[test]
    fn test_encode_packet() {
        let mut codec = PacketCodec::new();
        let mut dst = BytesMut::new();

        codec
            .encode(Packet::new(9, &b"abc"[..]).unwrap(), &mut dst)
            .unwrap();
        assert_eq!(&dst[..], b"\x03\x00\x00\x09abc");
    }

    #[test]
    fn test_packet_too_large() {
        let payload = BytesMut::zeroed(MAX_PAYLOAD_LEN + 1);
        assert!(Packet::new(0, payload).is_err());
    }
}
