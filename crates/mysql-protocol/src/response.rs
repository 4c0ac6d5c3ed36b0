//! Packets a server sends after the handshake response.
//!
//! The first byte of the payload tags the packet:
//!
//! | Byte   | Packet                |
//! |--------|-----------------------|
//! | `0x00` | OK                    |
//! | `0xFE` | Authentication switch |
//! | `0xFF` | ERR                   |

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{
    ensure_remaining, get_lenenc_int, get_str_eof, get_str_nul, put_lenenc_int, put_str_nul,
};
use crate::error::ProtocolError;
use crate::status::ServerStatus;

/// Header byte of an OK packet.
pub const OK_HEADER: u8 = 0x00;

/// Header byte of an authentication switch request.
pub const AUTH_SWITCH_HEADER: u8 = 0xFE;

/// Header byte of an ERR packet.
pub const ERR_HEADER: u8 = 0xFF;

/// Plugin implied by a bare `0xFE` packet from pre-4.1 servers.
pub const OLD_PASSWORD_PLUGIN: &str = "mysql_old_password";

/// OK packet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OkPacket {
    /// Rows affected by the last statement.
    pub affected_rows: u64,
    /// Last generated auto-increment id.
    pub last_insert_id: u64,
    /// Server status flags.
    pub status: ServerStatus,
    /// Warning count.
    pub warnings: u16,
    /// Human-readable info.
    pub info: String,
}

impl OkPacket {
    /// Decode the body of an OK packet (header byte already consumed).
    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        let affected_rows = get_lenenc_int(src, "affected rows")?;
        let last_insert_id = get_lenenc_int(src, "last insert id")?;
        ensure_remaining(src, 4, "ok status")?;
        let status = ServerStatus::from_bits_retain(src.get_u16_le());
        let warnings = src.get_u16_le();
        let info = get_str_eof(src);

        Ok(Self {
            affected_rows,
            last_insert_id,
            status,
            warnings,
            info,
        })
    }

    /// Serialize the packet including its header byte.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(OK_HEADER);
        put_lenenc_int(dst, self.affected_rows);
        put_lenenc_int(dst, self.last_insert_id);
        dst.put_u16_le(self.status.bits());
        dst.put_u16_le(self.warnings);
        dst.put_slice(self.info.as_bytes());
    }
}

/// ERR packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrPacket {
    /// Server error code (e.g. 1045 for access denied).
    pub code: u16,
    /// Five-character SQLSTATE, when the server sent one.
    pub sql_state: Option<String>,
    /// Error message.
    pub message: String,
}

impl ErrPacket {
    /// Decode the body of an ERR packet (header byte already consumed).
    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        ensure_remaining(src, 2, "error code")?;
        let code = src.get_u16_le();

        let sql_state = if src.chunk().first() == Some(&b'#') {
            ensure_remaining(src, 6, "sql state")?;
            src.advance(1);
            let state = src.copy_to_bytes(5);
            Some(String::from_utf8_lossy(&state).into_owned())
        } else {
            None
        };

        Ok(Self {
            code,
            sql_state,
            message: get_str_eof(src),
        })
    }

    /// Serialize the packet including its header byte.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(ERR_HEADER);
        dst.put_u16_le(self.code);
        if let Some(state) = &self.sql_state {
            dst.put_u8(b'#');
            dst.put_slice(state.as_bytes());
        }
        dst.put_slice(self.message.as_bytes());
    }
}

/// Request from the server to continue with a different plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSwitchRequest {
    /// Plugin the server wants the client to use.
    pub plugin_name: String,
    /// Plugin data, typically a fresh 20-byte challenge.
    pub plugin_data: Bytes,
}

impl AuthSwitchRequest {
    /// Decode the body of a switch request (header byte already consumed).
    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        if !src.has_remaining() {
            return Ok(Self {
                plugin_name: OLD_PASSWORD_PLUGIN.to_owned(),
                plugin_data: Bytes::new(),
            });
        }

        let plugin_name = get_str_nul(src, "auth plugin name")?;
        let mut plugin_data = src.copy_to_bytes(src.remaining());
        if plugin_data.last() == Some(&0) {
            plugin_data.truncate(plugin_data.len() - 1);
        }

        Ok(Self {
            plugin_name,
            plugin_data,
        })
    }

    /// Serialize the packet including its header byte.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<(), ProtocolError> {
        dst.put_u8(AUTH_SWITCH_HEADER);
        put_str_nul(dst, &self.plugin_name, "auth plugin name")?;
        dst.put_slice(&self.plugin_data);
        dst.put_u8(0);
        Ok(())
    }
}

/// Outcome of the authentication exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    /// Authentication succeeded.
    Ok(OkPacket),
    /// The server rejected the credentials.
    AuthError(ErrPacket),
    /// The server asked for another authentication round.
    AuthSwitchRequest(AuthSwitchRequest),
}

impl AuthResult {
    /// Classify and decode a complete result payload.
    pub fn decode(mut payload: Bytes) -> Result<Self, ProtocolError> {
        ensure_remaining(&payload, 1, "packet header byte")?;
        match payload.get_u8() {
            OK_HEADER => OkPacket::decode(&mut payload).map(Self::Ok),
            ERR_HEADER => ErrPacket::decode(&mut payload).map(Self::AuthError),
            AUTH_SWITCH_HEADER => {
                AuthSwitchRequest::decode(&mut payload).map(Self::AuthSwitchRequest)
            }
            other => Err(ProtocolError::UnexpectedPacket(other)),
        }
    }

    /// Serialize the result payload.
    pub fn encode_to_bytes(&self) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(64);
        match self {
            Self::Ok(ok) => ok.encode(&mut buf),
            Self::AuthError(err) => err.encode(&mut buf),
            Self::AuthSwitchRequest(switch) => switch.encode(&mut buf)?,
        }
        Ok(buf.freeze())
    }
}
