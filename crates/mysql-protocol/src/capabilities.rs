//! Client/server capability flags.

use bitflags::bitflags;

use crate::error::ProtocolError;

bitflags! {
    /// Capability flags exchanged in the greeting and handshake response.
    ///
    /// The server advertises its set split into two 16-bit halves; the client
    /// answers with the subset it intends to use as a single 32-bit value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// New, more secure passwords.
        const LONG_PASSWORD = 0x0000_0001;
        /// Return found rows instead of affected rows.
        const FOUND_ROWS = 0x0000_0002;
        /// Get all column flags.
        const LONG_FLAG = 0x0000_0004;
        /// A database name may be sent in the handshake response.
        const CONNECT_WITH_DB = 0x0000_0008;
        /// Don't allow `database.table.column`.
        const NO_SCHEMA = 0x0000_0010;
        /// Compression protocol.
        const COMPRESS = 0x0000_0020;
        /// ODBC client.
        const ODBC = 0x0000_0040;
        /// `LOAD DATA LOCAL` support.
        const LOCAL_FILES = 0x0000_0080;
        /// Ignore spaces before `(`.
        const IGNORE_SPACE = 0x0000_0100;
        /// 4.1 protocol.
        const PROTOCOL_41 = 0x0000_0200;
        /// Interactive client.
        const INTERACTIVE = 0x0000_0400;
        /// Switch to TLS after the greeting.
        const SSL = 0x0000_0800;
        /// Ignore SIGPIPE.
        const IGNORE_SIGPIPE = 0x0000_1000;
        /// Client knows about transactions.
        const TRANSACTIONS = 0x0000_2000;
        /// Old 4.1 protocol flag.
        const RESERVED = 0x0000_4000;
        /// 4.1 authentication (length-prefixed auth response).
        const SECURE_CONNECTION = 0x0000_8000;
        /// Multiple statements per query.
        const MULTI_STATEMENTS = 0x0001_0000;
        /// Multiple result sets.
        const MULTI_RESULTS = 0x0002_0000;
        /// Multiple result sets for prepared statements.
        const PS_MULTI_RESULTS = 0x0004_0000;
        /// Pluggable authentication.
        const PLUGIN_AUTH = 0x0008_0000;
        /// Connection attributes.
        const CONNECT_ATTRS = 0x0010_0000;
        /// Length-encoded auth response.
        const PLUGIN_AUTH_LENENC_DATA = 0x0020_0000;
        /// Expired password sandbox mode.
        const CAN_HANDLE_EXPIRED_PASSWORDS = 0x0040_0000;
        /// Session state change tracking.
        const SESSION_TRACK = 0x0080_0000;
        /// OK packets replace EOF packets.
        const DEPRECATE_EOF = 0x0100_0000;
    }
}

impl Capabilities {
    /// Everything this client knows how to speak during the connection phase.
    pub const CLIENT_SUPPORTED: Self = Self::LONG_PASSWORD
        .union(Self::CONNECT_WITH_DB)
        .union(Self::PROTOCOL_41)
        .union(Self::SECURE_CONNECTION)
        .union(Self::TRANSACTIONS)
        .union(Self::MULTI_STATEMENTS)
        .union(Self::MULTI_RESULTS)
        .union(Self::PLUGIN_AUTH);

    /// Flags the server must advertise for a handshake to proceed.
    pub const REQUIRED: Self = Self::PROTOCOL_41.union(Self::SECURE_CONNECTION);

    /// Rebuild the server's capability set from the two greeting halves.
    ///
    /// Unknown bits are retained so they can be logged.
    #[must_use]
    pub const fn from_halves(lower: u16, upper: u16) -> Self {
        Self::from_bits_retain((upper as u32) << 16 | lower as u32)
    }

    /// Intersect the client's supported set with what the server offers.
    pub fn negotiate(server: Self) -> Result<Self, ProtocolError> {
        let missing = Self::REQUIRED.difference(server);
        if !missing.is_empty() {
            return Err(ProtocolError::MissingCapability(missing));
        }
        Ok(Self::CLIENT_SUPPORTED.intersection(server))
    }
}
