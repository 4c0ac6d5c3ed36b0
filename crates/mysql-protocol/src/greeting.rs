//! Initial handshake packet (protocol version 10).
//!
//! The greeting is the first packet a server sends on a fresh connection.
//! It advertises the server version, a connection id, capability flags and
//! the challenge material the client salts its password with.
//!
//! Decoding happens field-by-field off the transport in `mysql-codec`; this
//! module holds the layout constants, the decoded structure and the encoder
//! used by test servers.

use bytes::{BufMut, Bytes, BytesMut};

use crate::capabilities::Capabilities;
use crate::codec::put_str_nul;
use crate::error::ProtocolError;
use crate::status::ServerStatus;

/// The only protocol version this crate speaks.
pub const PROTOCOL_VERSION: u8 = 10;

/// Length of the first challenge block.
pub const CHALLENGE_PART1_LEN: usize = 8;

/// Reserved bytes following the challenge length indicator.
pub const GREETING_RESERVED_LEN: usize = 10;

/// Minimum length of the second challenge block, including its terminator.
pub const MIN_CHALLENGE_PART2_LEN: usize = 13;

/// Length of the full challenge for the standard plugins.
pub const CHALLENGE_LEN: usize = 20;

/// Decoded server greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerGreeting {
    /// Protocol version (always 10).
    pub protocol_version: u8,
    /// Human-readable server version.
    pub server_version: String,
    /// Server-side connection (thread) id.
    pub connection_id: u32,
    /// First 8 bytes of the challenge.
    pub challenge_part1: [u8; CHALLENGE_PART1_LEN],
    /// Lower 16 bits of the capability flags.
    pub capabilities_lower: u16,
    /// Server default collation id.
    pub default_collation: u8,
    /// Server status flags.
    pub status: ServerStatus,
    /// Upper 16 bits of the capability flags.
    pub capabilities_upper: u16,
    /// Total challenge length announced by the server (0 without plugin auth).
    pub challenge_len: u8,
    /// Remainder of the challenge, trailing terminator removed.
    pub challenge_part2: Bytes,
    /// Default authentication plugin, present when `PLUGIN_AUTH` is set.
    pub auth_plugin_name: Option<String>,
}

impl ServerGreeting {
    /// Full capability word.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::from_halves(self.capabilities_lower, self.capabilities_upper)
    }

    /// Full challenge (`part1 ++ part2`).
    #[must_use]
    pub fn challenge(&self) -> Vec<u8> {
        let mut challenge = Vec::with_capacity(CHALLENGE_PART1_LEN + self.challenge_part2.len());
        challenge.extend_from_slice(&self.challenge_part1);
        challenge.extend_from_slice(&self.challenge_part2);
        challenge
    }

    /// Number of bytes the second challenge block occupies on the wire.
    ///
    /// Without `SECURE_CONNECTION` the block is absent.
    #[must_use]
    pub fn challenge_part2_len(capabilities: Capabilities, challenge_len: u8) -> usize {
        if !capabilities.contains(Capabilities::SECURE_CONNECTION) {
            return 0;
        }
        (usize::from(challenge_len).saturating_sub(CHALLENGE_PART1_LEN))
            .max(MIN_CHALLENGE_PART2_LEN)
    }

    /// Serialize the greeting payload.
    ///
    /// Used by test servers; a client never sends a greeting.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<(), ProtocolError> {
        dst.put_u8(self.protocol_version);
        put_str_nul(dst, &self.server_version, "server version")?;
        dst.put_u32_le(self.connection_id);
        dst.put_slice(&self.challenge_part1);
        dst.put_u8(0);
        dst.put_u16_le(self.capabilities_lower);
        dst.put_u8(self.default_collation);
        dst.put_u16_le(self.status.bits());
        dst.put_u16_le(self.capabilities_upper);
        dst.put_u8(self.challenge_len);
        dst.put_bytes(0, GREETING_RESERVED_LEN);

        let part2_len = Self::challenge_part2_len(self.capabilities(), self.challenge_len);
        if part2_len > 0 {
            if self.challenge_part2.len() >= part2_len {
                return Err(ProtocolError::FieldTooLong {
                    field: "challenge part 2",
                    len: self.challenge_part2.len(),
                    max: part2_len - 1,
                });
            }
            dst.put_slice(&self.challenge_part2);
            dst.put_bytes(0, part2_len - self.challenge_part2.len());
        }

        if self.capabilities().contains(Capabilities::PLUGIN_AUTH) {
            put_str_nul(
                dst,
                self.auth_plugin_name.as_deref().unwrap_or_default(),
                "auth plugin name",
            )?;
        }
        Ok(())
    }

    /// Serialize the greeting payload into a fresh buffer.
    pub fn encode_to_bytes(&self) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(128);
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn greeting() -> ServerGreeting {
        let caps = Capabilities::CLIENT_SUPPORTED.bits();
        ServerGreeting {
            protocol_version: PROTOCOL_VERSION,
            server_version: "5.7.0".into(),
            connection_id: 7,
            challenge_part1: *b"abcdefgh",
            capabilities_lower: caps as u16,
            default_collation: 33,
            status: ServerStatus::AUTOCOMMIT,
            capabilities_upper: (caps >> 16) as u16,
            challenge_len: 21,
            challenge_part2: Bytes::from_static(b"ijklmnopqrst"),
            auth_plugin_name: Some("mysql_native_password".into()),
        }
    }

    #[test]
    fn test_challenge_concatenation() {
        let greeting = greeting();
        assert_eq!(greeting.challenge(), b"abcdefghijklmnopqrst");
        assert_eq!(greeting.challenge().len(), CHALLENGE_LEN);
    }

    #[test]
    fn test_challenge_part2_len() {
        let secure = Capabilities::SECURE_CONNECTION;
        assert_eq!(ServerGreeting::challenge_part2_len(secure, 21), 13);
        assert_eq!(ServerGreeting::challenge_part2_len(secure, 0), 13);
        assert_eq!(ServerGreeting::challenge_part2_len(secure, 30), 22);
        assert_eq!(
            ServerGreeting::challenge_part2_len(Capabilities::empty(), 21),
            0
        );
    }

    #[test]
    fn test_encode_layout() {
        let bytes = greeting().encode_to_bytes().unwrap();

        assert_eq!(bytes[0], PROTOCOL_VERSION);
        assert_eq!(&bytes[1..7], b"5.7.0\0");
        assert_eq!(&bytes[7..11], &7u32.to_le_bytes());
        assert_eq!(&bytes[11..19], b"abcdefgh");
        assert_eq!(bytes[19], 0);
        // 1 + 6 + 4 + 8 + 1 + 2 + 1 + 2 + 2 + 1 + 10 = 38
        assert_eq!(&bytes[38..51], b"ijklmnopqrst\0");
        assert_eq!(&bytes[51..], b"mysql_native_password\0");
    }

    #[test]
    fn test_encode_rejects_long_challenge() {
        let mut greeting = greeting();
        greeting.challenge_part2 = Bytes::from_static(b"0123456789abc");
        assert!(matches!(
            greeting.encode_to_bytes(),
            Err(ProtocolError::FieldTooLong { .. })
        ));
    }
}
