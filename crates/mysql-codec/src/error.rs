//! Codec error types.

use std::io;

use mysql_protocol::{ErrPacket, ProtocolError};
use thiserror::Error;

/// Errors that can occur while reading or writing packets.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The transport failed, including a short read in the middle of a packet.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer sent bytes that violate the protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The peer closed the stream at a packet boundary.
    #[error("connection closed")]
    ConnectionClosed,

    /// The server answered the connection with an ERR packet instead of a
    /// greeting.
    #[error("server error {}: {}", .0.code, .0.message)]
    Server(ErrPacket),
}

impl CodecError {
    /// Whether the error came from the transport rather than the peer's bytes.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ConnectionClosed)
    }
}
