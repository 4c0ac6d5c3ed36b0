//! Greeting decoding straight off the transport.
//!
//! Fields are read one at a time from the stream, bounded by the length in
//! the packet header. A field that would run past the end of the packet fails
//! before any of its bytes are consumed.

use bytes::{Bytes, BytesMut};
use mysql_protocol::greeting::{CHALLENGE_PART1_LEN, GREETING_RESERVED_LEN};
use mysql_protocol::response::ERR_HEADER;
use mysql_protocol::{
    Capabilities, ErrPacket, PROTOCOL_VERSION, ProtocolError, ServerGreeting, ServerStatus,
};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::CodecError;
use crate::io::{read_exact, read_exact_into, read_header};

/// Field reader bounded by a packet's payload length.
struct PacketBody<'a, R: ?Sized> {
    reader: &'a mut R,
    remaining: usize,
}

impl<'a, R> PacketBody<'a, R>
where
    R: AsyncRead + Unpin + ?Sized,
{
    fn new(reader: &'a mut R, length: usize) -> Self {
        Self {
            reader,
            remaining: length,
        }
    }

    fn reserve(&mut self, n: usize, field: &'static str) -> Result<(), ProtocolError> {
        if self.remaining < n {
            return Err(ProtocolError::Incomplete {
                field,
                expected: n,
                actual: self.remaining,
            });
        }
        self.remaining -= n;
        Ok(())
    }

    async fn read_array<const N: usize>(
        &mut self,
        field: &'static str,
    ) -> Result<[u8; N], CodecError> {
        self.reserve(N, field)?;
        let mut buf = [0u8; N];
        read_exact_into(&mut *self.reader, &mut buf).await?;
        Ok(buf)
    }

    async fn read_u8(&mut self, field: &'static str) -> Result<u8, CodecError> {
        let [b] = self.read_array::<1>(field).await?;
        Ok(b)
    }

    async fn read_u16_le(&mut self, field: &'static str) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.read_array(field).await?))
    }

    async fn read_u32_le(&mut self, field: &'static str) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.read_array(field).await?))
    }

    async fn read_bytes(&mut self, n: usize, field: &'static str) -> Result<BytesMut, CodecError> {
        self.reserve(n, field)?;
        Ok(read_exact(&mut *self.reader, n).await?)
    }

    async fn read_str_nul(&mut self, field: &'static str) -> Result<String, CodecError> {
        let mut bytes = Vec::new();
        loop {
            if self.remaining == 0 {
                return Err(ProtocolError::UnterminatedString { field }.into());
            }
            match self.read_u8(field).await? {
                0 => break,
                b => bytes.push(b),
            }
        }
        String::from_utf8(bytes).map_err(|_| {
            ProtocolError::InvalidField {
                field,
                reason: "not valid UTF-8",
            }
            .into()
        })
    }

    async fn skip(&mut self, n: usize, field: &'static str) -> Result<(), CodecError> {
        self.read_bytes(n, field).await.map(drop)
    }

    /// Discard whatever is left so the stream stays aligned on the next header.
    async fn drain(&mut self) -> Result<usize, CodecError> {
        let left = self.remaining;
        if left > 0 {
            let mut take = (&mut *self.reader).take(left as u64);
            tokio::io::copy(&mut take, &mut tokio::io::sink()).await?;
            if take.limit() > 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
            }
            self.remaining = 0;
        }
        Ok(left)
    }
}

/// Read and decode the server greeting.
///
/// The greeting must be the first packet of the connection, so its sequence
/// number must be 0; anything else fails before any payload byte is read. A
/// server that refuses the connection outright sends an ERR packet instead,
/// which is returned as [`CodecError::Server`].
pub async fn decode_greeting<R>(reader: &mut R) -> Result<ServerGreeting, CodecError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let header = read_header(reader).await?;
    if header.sequence != 0 {
        return Err(ProtocolError::UnexpectedSequence {
            expected: 0,
            actual: header.sequence,
        }
        .into());
    }

    let mut body = PacketBody::new(reader, header.payload_length());

    let protocol_version = body.read_u8("protocol version").await?;
    if protocol_version == ERR_HEADER {
        let left = body.remaining;
        let rest = body.read_bytes(left, "error packet").await?;
        let err = ErrPacket::decode(&mut Bytes::from(rest))?;
        tracing::warn!(code = err.code, message = %err.message, "server refused connection");
        return Err(CodecError::Server(err));
    }
    if protocol_version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedProtocolVersion(protocol_version).into());
    }

    let server_version = body.read_str_nul("server version").await?;
    let connection_id = body.read_u32_le("connection id").await?;
    let challenge_part1 = body
        .read_array::<CHALLENGE_PART1_LEN>("challenge part 1")
        .await?;
    body.skip(1, "filler").await?;
    let capabilities_lower = body.read_u16_le("capability flags (lower)").await?;
    let default_collation = body.read_u8("default collation").await?;
    let status = ServerStatus::from_bits_retain(body.read_u16_le("status flags").await?);
    let capabilities_upper = body.read_u16_le("capability flags (upper)").await?;
    let challenge_len = body.read_u8("challenge length").await?;
    body.skip(GREETING_RESERVED_LEN, "reserved").await?;

    let capabilities = Capabilities::from_halves(capabilities_lower, capabilities_upper);

    let part2_len = ServerGreeting::challenge_part2_len(capabilities, challenge_len);
    let mut challenge_part2 = body.read_bytes(part2_len, "challenge part 2").await?;
    if challenge_part2.last() == Some(&0) {
        challenge_part2.truncate(challenge_part2.len() - 1);
    }

    let auth_plugin_name = if capabilities.contains(Capabilities::PLUGIN_AUTH) {
        Some(body.read_str_nul("auth plugin name").await?)
    } else {
        None
    };

    let trailing = body.drain().await?;

    tracing::debug!(
        server_version = %server_version,
        connection_id,
        capabilities = ?capabilities,
        auth_plugin = ?auth_plugin_name,
        trailing,
        "decoded server greeting"
    );

    Ok(ServerGreeting {
        protocol_version,
        server_version,
        connection_id,
        challenge_part1,
        capabilities_lower,
        default_collation,
        status,
        capabilities_upper,
        challenge_len,
        challenge_part2: challenge_part2.freeze(),
        auth_plugin_name,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use mysql_protocol::CHALLENGE_LEN;

    /// Minimal greeting from a 5.7 server.
    fn greeting_payload() -> Vec<u8> {
        let mut p = Vec::new();
        p.push(10);
        p.extend_from_slice(b"5.7.0\0");
        p.extend_from_slice(&7u32.to_le_bytes());
        p.extend_from_slice(b"abcdefgh");
        p.push(0);
        p.extend_from_slice(&0xF7FFu16.to_le_bytes());
        p.push(33);
        p.extend_from_slice(&0x0002u16.to_le_bytes());
        p.extend_from_slice(&0x81FFu16.to_le_bytes());
        p.push(21);
        p.extend_from_slice(&[0; 10]);
        p.extend_from_slice(b"ijklmnopqrst\0");
        p.extend_from_slice(b"mysql_native_password\0");
        p
    }

    fn frame(sequence: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u32).to_le_bytes()[..3].to_vec();
        out.push(sequence);
        out.extend_from_slice(payload);
        out
    }

    #[tokio::test]
    async fn test_decode_minimal_greeting() {
        let bytes = frame(0, &greeting_payload());
        let mut stream = bytes.as_slice();

        let greeting = decode_greeting(&mut stream).await.unwrap();
        assert_eq!(greeting.protocol_version, 10);
        assert_eq!(greeting.server_version, "5.7.0");
        assert_eq!(greeting.connection_id, 7);
        assert_eq!(&greeting.challenge_part1, b"abcdefgh");
        assert_eq!(greeting.capabilities_lower, 0xF7FF);
        assert_eq!(greeting.default_collation, 33);
        assert_eq!(greeting.status, ServerStatus::AUTOCOMMIT);
        assert_eq!(greeting.capabilities_upper, 0x81FF);
        assert_eq!(greeting.capabilities().bits(), 0x81FF_F7FF);
        assert_eq!(greeting.challenge_len, 21);
        assert_eq!(&greeting.challenge_part2[..], b"ijklmnopqrst");
        assert_eq!(
            greeting.auth_plugin_name.as_deref(),
            Some("mysql_native_password")
        );

        let challenge = greeting.challenge();
        assert_eq!(challenge.len(), CHALLENGE_LEN);
        assert_eq!(challenge, b"abcdefghijklmnopqrst");
        assert!(stream.is_empty());
    }

    #[tokio::test]
    async fn test_decode_one_byte_at_a_time() {
        let bytes = frame(0, &greeting_payload());
        let mut builder = tokio_test::io::Builder::new();
        for b in &bytes {
            builder.read(std::slice::from_ref(b));
        }
        let mut stream = builder.build();

        let greeting = decode_greeting(&mut stream).await.unwrap();
        assert_eq!(greeting.challenge(), b"abcdefghijklmnopqrst");
    }

    #[tokio::test]
    async fn test_decode_mariadb_greeting() {
        let payload = b"\n5.5.5-10.5.8-MariaDB-1:10.5.8+maria~focal\0)\0\0\04bo+$r4H\0\xfe\xf7-\x02\0\xff\x81\x15\0\0\0\0\0\0\x0f\0\0\0O5X>j}Ur]Y)^\0mysql_native_password\0";
        let bytes = frame(0, payload);
        let mut stream = bytes.as_slice();

        let greeting = decode_greeting(&mut stream).await.unwrap();
        assert_eq!(greeting.server_version, "5.5.5-10.5.8-MariaDB-1:10.5.8+maria~focal");
        assert_eq!(greeting.connection_id, 41);
        assert_eq!(greeting.default_collation, 45);
        assert_eq!(greeting.challenge(), b"4bo+$r4HO5X>j}Ur]Y)^");
        assert!(greeting.capabilities().contains(Capabilities::PLUGIN_AUTH));
    }

    #[tokio::test]
    async fn test_wrong_sequence_fails_before_payload() {
        let bytes = frame(1, &greeting_payload());
        let mut stream = bytes.as_slice();

        let err = decode_greeting(&mut stream).await.unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolError::UnexpectedSequence {
                expected: 0,
                actual: 1
            })
        ));
        assert_eq!(stream.len(), greeting_payload().len());
    }

    #[tokio::test]
    async fn test_unterminated_server_version() {
        let bytes = frame(0, b"\x0a5.7.0");
        let mut stream = bytes.as_slice();

        let err = decode_greeting(&mut stream).await.unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolError::UnterminatedString {
                field: "server version"
            })
        ));
    }

    #[tokio::test]
    async fn test_unterminated_plugin_name() {
        let mut payload = greeting_payload();
        payload.pop();
        let bytes = frame(0, &payload);
        let mut stream = bytes.as_slice();

        let err = decode_greeting(&mut stream).await.unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolError::UnterminatedString { .. })
        ));
    }

    #[tokio::test]
    async fn test_truncated_greeting() {
        let payload = &greeting_payload()[..20];
        let bytes = frame(0, payload);
        let mut stream = bytes.as_slice();

        let err = decode_greeting(&mut stream).await.unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolError::Incomplete { .. })
        ));
    }

    #[tokio::test]
    async fn test_trailing_bytes_are_drained() {
        let mut payload = greeting_payload();
        payload.extend_from_slice(b"extra");
        let mut bytes = frame(0, &payload);
        bytes.extend_from_slice(b"NEXT");
        let mut stream = bytes.as_slice();

        decode_greeting(&mut stream).await.unwrap();
        assert_eq!(stream, b"NEXT");
    }

    #[tokio::test]
    async fn test_unsupported_protocol_version() {
        let mut payload = greeting_payload();
        payload[0] = 9;
        let bytes = frame(0, &payload);
        let mut stream = bytes.as_slice();

        assert!(matches!(
            decode_greeting(&mut stream).await.unwrap_err(),
            CodecError::Protocol(ProtocolError::UnsupportedProtocolVersion(9))
        ));
    }

    #[tokio::test]
    async fn test_error_packet_instead_of_greeting() {
        let bytes = frame(0, b"\xff\x6a\x04Host '10.0.0.1' is not allowed to connect");
        let mut stream = bytes.as_slice();

        match decode_greeting(&mut stream).await.unwrap_err() {
            CodecError::Server(err) => {
                assert_eq!(err.code, 1130);
                assert!(err.message.contains("not allowed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
