//! Sequenced packet connection.
//!
//! The sequence counter and the transport are owned together so that only
//! one exchange can be in flight at a time.

use std::sync::Arc;

use mysql_protocol::{PacketHeader, ProtocolError, ServerGreeting};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};

use crate::error::CodecError;
use crate::greeting::decode_greeting;
use crate::io::{read_exact, read_header, write_packet};
use crate::message::{Message, MessageAssembler};
use crate::observer::{ObservedIo, PacketObserver};
use crate::packet_codec::Packet;

/// A MySQL connection at the packet level.
///
/// Reads are buffered, so decoding the greeting one field at a time does not
/// cost one syscall per field. Writes are flushed at the end of every message.
///
/// # Example
///
/// ```rust,ignore
/// use mysql_codec::Connection;
/// use tokio::net::TcpStream;
///
/// let stream = TcpStream::connect("localhost:3306").await?;
/// let mut conn = Connection::new(stream);
///
/// let greeting = conn.read_greeting().await?;
/// conn.write_message(&response).await?;
/// let result = conn.read_message().await?;
/// ```
#[derive(Debug)]
pub struct Connection<T> {
    stream: BufStream<ObservedIo<T>>,
    /// Sequence number expected on the next frame, in either direction.
    sequence: u8,
    assembler: MessageAssembler,
    /// Upper bound on a reassembled message payload.
    max_message_len: usize,
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new connection from a transport.
    pub fn new(transport: T) -> Self {
        Self::from_io(ObservedIo::new(transport))
    }

    /// Create a connection that reports raw traffic to `observer`.
    pub fn with_observer(transport: T, observer: Arc<dyn PacketObserver>) -> Self {
        Self::from_io(ObservedIo::with_observer(transport, observer))
    }

    fn from_io(io: ObservedIo<T>) -> Self {
        Self {
            stream: BufStream::new(io),
            sequence: 0,
            assembler: MessageAssembler::new(),
            max_message_len: usize::MAX,
        }
    }

    /// Limit the size of messages accepted by `read_message`.
    ///
    /// A message whose frames add up to more than `len` bytes fails with
    /// [`ProtocolError::PacketTooLarge`] before the offending frame's
    /// payload is read.
    #[must_use]
    pub fn with_max_message_len(mut self, len: usize) -> Self {
        self.max_message_len = len;
        self
    }

    /// Largest message payload `read_message` accepts.
    #[must_use]
    pub fn max_message_len(&self) -> usize {
        self.max_message_len
    }

    /// Sequence number of the next frame.
    #[must_use]
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Start a new exchange at sequence 0.
    pub fn reset_sequence(&mut self) {
        self.sequence = 0;
    }

    /// Get a reference to the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.stream.get_ref().get_ref()
    }

    /// Read the server greeting, the first packet of the connection.
    pub async fn read_greeting(&mut self) -> Result<ServerGreeting, CodecError> {
        self.reset_sequence();
        let greeting = decode_greeting(&mut self.stream).await?;
        self.sequence = 1;
        Ok(greeting)
    }

    /// Read a single frame, checking its sequence number.
    ///
    /// This is lower-level than `read_message` and doesn't perform reassembly.
    pub async fn read_packet(&mut self) -> Result<Packet, CodecError> {
        let header = self.read_sequenced_header().await?;
        self.read_payload(header).await
    }

    async fn read_sequenced_header(&mut self) -> Result<PacketHeader, CodecError> {
        let header = read_header(&mut self.stream).await?;
        if header.sequence != self.sequence {
            return Err(ProtocolError::UnexpectedSequence {
                expected: self.sequence,
                actual: header.sequence,
            }
            .into());
        }
        Ok(header)
    }

    async fn read_payload(&mut self, header: PacketHeader) -> Result<Packet, CodecError> {
        let payload = read_exact(&mut self.stream, header.payload_length()).await?;
        self.sequence = header.sequence.wrapping_add(1);
        Ok(Packet { header, payload })
    }

    async fn read_bounded_packet(&mut self) -> Result<Packet, CodecError> {
        let header = self.read_sequenced_header().await?;
        let size = self
            .assembler
            .buffered_len()
            .saturating_add(header.payload_length());
        if size > self.max_message_len {
            return Err(ProtocolError::PacketTooLarge {
                size,
                max: self.max_message_len,
            }
            .into());
        }
        self.read_payload(header).await
    }

    /// Read the next complete message from the connection.
    ///
    /// This handles multi-packet message reassembly automatically.
    pub async fn read_message(&mut self) -> Result<Message, CodecError> {
        loop {
            let packet = match self.read_bounded_packet().await {
                Ok(packet) => packet,
                Err(CodecError::ConnectionClosed) if self.assembler.has_partial() => {
                    self.assembler.clear();
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed inside a multi-packet message",
                    )
                    .into());
                }
                Err(e) => {
                    self.assembler.clear();
                    return Err(e);
                }
            };

            if let Some(message) = self.assembler.push(packet) {
                return Ok(message);
            }
        }
    }

    /// Send a complete message, splitting into multiple frames if needed.
    pub async fn write_message(&mut self, payload: &[u8]) -> Result<(), CodecError> {
        self.sequence = write_packet(&mut self.stream, self.sequence, payload).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Flush pending writes and shut down the write side of the transport.
    pub async fn shutdown(&mut self) -> Result<(), CodecError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mysql_protocol::MAX_PAYLOAD_LEN;

    const GREETING: &[u8] = b"\x6d\x00\x00\x00\n5.5.5-10.5.8-MariaDB-1:10.5.8+maria~focal\0)\0\0\04bo+$r4H\0\xfe\xf7-\x02\0\xff\x81\x15\0\0\0\0\0\0\x0f\0\0\0O5X>j}Ur]Y)^\0mysql_native_password\0";

    #[tokio::test]
    async fn test_exchange_sequencing() {
        let mock = tokio_test::io::Builder::new()
            .read(GREETING)
            .write(b"\x03\x00\x00\x01abc")
            .read(b"\x07\x00\x00\x02\x00\x00\x00\x02\x00\x00\x00")
            .build();
        let mut conn = Connection::new(mock);

        let greeting = conn.read_greeting().await.unwrap();
        assert_eq!(greeting.connection_id, 41);
        assert_eq!(conn.sequence(), 1);

        conn.write_message(b"abc").await.unwrap();
        assert_eq!(conn.sequence(), 2);

        let message = conn.read_message().await.unwrap();
        assert_eq!(message.sequence, 2);
        assert_eq!(message.payload[0], 0x00);
        assert_eq!(conn.sequence(), 3);
    }

    #[tokio::test]
    async fn test_out_of_order_packet() {
        let mock = tokio_test::io::Builder::new()
            .read(GREETING)
            .read(b"\x01\x00\x00\x05\x00")
            .build();
        let mut conn = Connection::new(mock);
        conn.read_greeting().await.unwrap();

        let err = conn.read_packet().await.unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolError::UnexpectedSequence {
                expected: 1,
                actual: 5
            })
        ));
    }

    #[tokio::test]
    async fn test_read_multi_packet_message() {
        let mut wire = vec![0xFF, 0xFF, 0xFF, 0x01];
        wire.extend(std::iter::repeat_n(0x11, MAX_PAYLOAD_LEN));
        wire.extend_from_slice(b"\x02\x00\x00\x02ok");
        let mock = tokio_test::io::Builder::new().read(&wire).build();

        let mut conn = Connection::new(mock);
        conn.sequence = 1;

        let message = conn.read_message().await.unwrap();
        assert_eq!(message.sequence, 1);
        assert_eq!(message.len(), MAX_PAYLOAD_LEN + 2);
        assert_eq!(&message.payload[MAX_PAYLOAD_LEN..], b"ok");
        assert_eq!(conn.sequence(), 3);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_before_payload() {
        // Only the header is available; reading the payload would hit EOF
        let mock = tokio_test::io::Builder::new()
            .read(b"\xff\xff\xff\x00")
            .build();

        let mut conn = Connection::new(mock).with_max_message_len(1024);
        let err = conn.read_message().await.unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolError::PacketTooLarge {
                size: MAX_PAYLOAD_LEN,
                max: 1024
            })
        ));
    }

    #[tokio::test]
    async fn test_reassembled_message_limit() {
        let mut wire = vec![0xFF, 0xFF, 0xFF, 0x00];
        wire.extend(std::iter::repeat_n(0, MAX_PAYLOAD_LEN));
        wire.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0x01]);
        let mock = tokio_test::io::Builder::new().read(&wire).build();

        let mut conn = Connection::new(mock).with_max_message_len(MAX_PAYLOAD_LEN + 1024);
        let err = conn.read_message().await.unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolError::PacketTooLarge { size, max })
                if size == 2 * MAX_PAYLOAD_LEN && max == MAX_PAYLOAD_LEN + 1024
        ));
        assert!(!conn.assembler.has_partial());
    }

    #[tokio::test]
    async fn test_message_within_limit() {
        let mock = tokio_test::io::Builder::new()
            .read(b"\x04\x00\x00\x00done")
            .build();

        let mut conn = Connection::new(mock).with_max_message_len(4);
        assert_eq!(conn.max_message_len(), 4);
        let message = conn.read_message().await.unwrap();
        assert_eq!(&message.payload[..], b"done");
    }

    #[tokio::test]
    async fn test_eof_inside_multi_packet_message() {
        let mut wire = vec![0xFF, 0xFF, 0xFF, 0x00];
        wire.extend(std::iter::repeat_n(0, MAX_PAYLOAD_LEN));
        let mock = tokio_test::io::Builder::new().read(&wire).build();

        let mut conn = Connection::new(mock);
        let err = conn.read_message().await.unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
    }

    #[tokio::test]
    async fn test_eof_between_messages() {
        let mock = tokio_test::io::Builder::new().build();
        let mut conn = Connection::new(mock);
        assert!(matches!(
            conn.read_message().await,
            Err(CodecError::ConnectionClosed)
        ));
    }
}
