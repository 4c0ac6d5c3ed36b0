//! Client handshake response (protocol 4.1).

use bytes::{BufMut, Bytes, BytesMut};

use crate::capabilities::Capabilities;
use crate::codec::put_str_nul;
use crate::error::ProtocolError;

/// Zero bytes between the collation id and the username.
pub const RESPONSE_RESERVED_LEN: usize = 23;

/// Longest auth response representable with a one-byte length prefix.
pub const MAX_AUTH_RESPONSE_LEN: usize = u8::MAX as usize;

/// Handshake response sent after the greeting.
///
/// Two capability bits are not taken at face value. `CONNECT_WITH_DB` is
/// derived from whether a non-empty database name is present, and
/// `PLUGIN_AUTH` is kept only when a plugin name is supplied. Every other bit
/// is masked to [`Capabilities::CLIENT_SUPPORTED`].
#[derive(Debug, Clone, Copy)]
pub struct HandshakeResponse<'a> {
    /// Negotiated capability flags.
    pub capabilities: Capabilities,
    /// Largest packet the client is willing to receive.
    pub max_packet_size: u32,
    /// Connection collation id.
    pub collation: u8,
    /// Login user.
    pub username: &'a str,
    /// Scrambled credential (empty for an empty password).
    pub auth_response: &'a [u8],
    /// Initial database.
    pub database: Option<&'a str>,
    /// Plugin that produced `auth_response`.
    pub auth_plugin: Option<&'a str>,
}

impl HandshakeResponse<'_> {
    fn database_name(&self) -> Option<&str> {
        self.database.filter(|db| !db.is_empty())
    }

    /// Capability flags as they will appear on the wire.
    #[must_use]
    pub fn effective_capabilities(&self) -> Capabilities {
        let mut caps = self.capabilities & Capabilities::CLIENT_SUPPORTED;
        caps.set(Capabilities::CONNECT_WITH_DB, self.database_name().is_some());
        if self.auth_plugin.is_none() {
            caps.remove(Capabilities::PLUGIN_AUTH);
        }
        caps
    }

    /// Serialize the response payload.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<(), ProtocolError> {
        if self.auth_response.len() > MAX_AUTH_RESPONSE_LEN {
            return Err(ProtocolError::FieldTooLong {
                field: "auth response",
                len: self.auth_response.len(),
                max: MAX_AUTH_RESPONSE_LEN,
            });
        }

        let caps = self.effective_capabilities();
        dst.put_u32_le(caps.bits());
        dst.put_u32_le(self.max_packet_size);
        dst.put_u8(self.collation);
        dst.put_bytes(0, RESPONSE_RESERVED_LEN);
        put_str_nul(dst, self.username, "username")?;

        dst.put_u8(self.auth_response.len() as u8);
        dst.put_slice(self.auth_response);

        if let Some(database) = self.database_name() {
            put_str_nul(dst, database, "database")?;
        }
        if caps.contains(Capabilities::PLUGIN_AUTH) {
            if let Some(plugin) = self.auth_plugin {
                put_str_nul(dst, plugin, "auth plugin name")?;
            }
        }
        Ok(())
    }

    /// Serialize the response payload into a fresh buffer.
    pub fn encode_to_bytes(&self) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(
            32 + self.username.len() + self.auth_response.len() + 64,
        );
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::packet::DEFAULT_MAX_PACKET_SIZE;

    const SCRAMBLE: &[u8; 20] = b"0123456789abcdefghij";

    fn response<'a>(database: Option<&'a str>) -> HandshakeResponse<'a> {
        HandshakeResponse {
            capabilities: Capabilities::CLIENT_SUPPORTED,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            collation: 33,
            username: "root",
            auth_response: SCRAMBLE,
            database,
            auth_plugin: Some("mysql_native_password"),
        }
    }

    #[test]
    fn test_layout_with_database() {
        let bytes = response(Some("app")).encode_to_bytes().unwrap();

        let caps = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert!(Capabilities::from_bits_retain(caps).contains(Capabilities::CONNECT_WITH_DB));
        assert_eq!(&bytes[4..8], &DEFAULT_MAX_PACKET_SIZE.to_le_bytes());
        assert_eq!(bytes[8], 33);
        assert!(bytes[9..32].iter().all(|&b| b == 0));
        assert_eq!(&bytes[32..37], b"root\0");
        assert_eq!(bytes[37], 20);
        assert_eq!(&bytes[38..58], SCRAMBLE);
        assert_eq!(&bytes[58..62], b"app\0");
        assert_eq!(&bytes[62..], b"mysql_native_password\0");
    }

    #[test]
    fn test_empty_database_clears_connect_with_db() {
        for database in [None, Some("")] {
            let response = response(database);
            assert!(
                !response
                    .effective_capabilities()
                    .contains(Capabilities::CONNECT_WITH_DB)
            );

            let bytes = response.encode_to_bytes().unwrap();
            assert_eq!(&bytes[58..], b"mysql_native_password\0");
        }
    }

    #[test]
    fn test_caller_cannot_force_connect_with_db() {
        let mut response = response(None);
        response.capabilities |= Capabilities::CONNECT_WITH_DB;
        assert!(
            !response
                .effective_capabilities()
                .contains(Capabilities::CONNECT_WITH_DB)
        );
    }

    #[test]
    fn test_unsupported_bits_are_masked() {
        let mut response = response(None);
        response.capabilities |= Capabilities::COMPRESS | Capabilities::SSL;
        let caps = response.effective_capabilities();
        assert!(!caps.contains(Capabilities::COMPRESS));
        assert!(!caps.contains(Capabilities::SSL));
    }

    #[test]
    fn test_empty_password_has_zero_length_prefix() {
        let mut response = response(None);
        response.auth_response = &[];
        response.auth_plugin = None;
        let bytes = response.encode_to_bytes().unwrap();

        assert_eq!(bytes[37], 0);
        assert_eq!(bytes.len(), 38);
        let caps = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        assert!(!Capabilities::from_bits_retain(caps).contains(Capabilities::PLUGIN_AUTH));
    }

    #[test]
    fn test_rejects_nul_in_username() {
        let mut response = response(None);
        response.username = "ro\0ot";
        assert!(matches!(
            response.encode_to_bytes(),
            Err(ProtocolError::InvalidField { field: "username", .. })
        ));
    }
}
