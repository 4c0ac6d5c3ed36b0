//! Protocol error types.

use thiserror::Error;

use crate::capabilities::Capabilities;

/// Errors raised while encoding or decoding protocol structures.
///
/// Every variant indicates either a non-conforming peer or a framing bug.
/// None of them are retryable on the same connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// A packet arrived with a sequence number other than the expected one.
    #[error("unexpected sequence number: expected {expected}, got {actual}")]
    UnexpectedSequence {
        /// Sequence number the receiver was waiting for.
        expected: u8,
        /// Sequence number found in the header.
        actual: u8,
    },

    /// A null-terminated string ran into the end of its packet.
    #[error("unterminated string in field `{field}`")]
    UnterminatedString {
        /// Name of the field being decoded.
        field: &'static str,
    },

    /// A fixed-width field extends past the end of its packet.
    #[error("incomplete field `{field}`: need {expected} bytes, {actual} remaining")]
    Incomplete {
        /// Name of the field being decoded.
        field: &'static str,
        /// Bytes required by the field.
        expected: usize,
        /// Bytes left in the packet.
        actual: usize,
    },

    /// The greeting announced a protocol version this client does not speak.
    #[error("unsupported protocol version {0} (expected 10)")]
    UnsupportedProtocolVersion(u8),

    /// The server lacks a capability the client cannot work without.
    #[error("server does not support required capabilities {0:?}")]
    MissingCapability(Capabilities),

    /// A payload exceeds the 24-bit length field of one frame, or a
    /// reassembled message exceeds the negotiated maximum packet size.
    #[error("packet too large: {size} bytes (max {max})")]
    PacketTooLarge {
        /// Offending payload size.
        size: usize,
        /// The limit that was exceeded.
        max: usize,
    },

    /// A length-prefixed field does not fit its prefix.
    #[error("field `{field}` too long: {len} bytes (max {max})")]
    FieldTooLong {
        /// Name of the field being encoded.
        field: &'static str,
        /// Actual length.
        len: usize,
        /// Maximum representable length.
        max: usize,
    },

    /// A field holds a value that cannot be put on (or taken off) the wire.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        /// Name of the field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A response packet started with an unknown header byte.
    #[error("unexpected packet with header byte 0x{0:02x}")]
    UnexpectedPacket(u8),
}
