//! Client error types.

use mysql_auth::AuthError;
use mysql_codec::CodecError;
use mysql_protocol::{ErrPacket, ProtocolError};
use thiserror::Error;

use crate::state::SessionState;

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport could not be established in time.
    #[error("connection timed out")]
    ConnectTimeout,

    /// The handshake did not finish in time.
    #[error("login timed out")]
    LoginTimeout,

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(CodecError),

    /// The client could not produce an authentication response.
    #[error("authentication plugin error: {0}")]
    Auth(#[from] AuthError),

    /// The server rejected the connection or the credentials.
    #[error("authentication failed ({code}): {message}")]
    Authentication {
        /// Server error code (1045 for bad credentials).
        code: u16,
        /// SQLSTATE, when the server sent one.
        sql_state: Option<String>,
        /// Server message.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The operation is not valid in the session's current state.
    #[error("operation not valid while session is {0}")]
    InvalidState(SessionState),

    /// `close()` was called on a session that is already closed.
    #[error("session already closed")]
    AlreadyClosed,

    /// A handshake step failed.
    #[error("handshake failed while {state}: {source}")]
    Handshake {
        /// State the session was in when the failure happened.
        state: SessionState,
        /// The originating error.
        #[source]
        source: Box<Error>,
    },
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connect, read or write failure. Fatal to the session.
    Transport,
    /// The peer violated the protocol. Fatal to the session.
    Protocol,
    /// The server rejected the credentials, or requires an authentication
    /// method this client lacks. A caller may retry with other credentials.
    Authentication,
    /// Invalid configuration.
    Configuration,
    /// The API was used out of order.
    Usage,
}

impl Error {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::ConnectTimeout | Self::LoginTimeout => ErrorKind::Transport,
            Self::Codec(e) if e.is_transport() => ErrorKind::Transport,
            Self::Codec(CodecError::Server(_)) => ErrorKind::Authentication,
            Self::Protocol(_) | Self::Codec(_) => ErrorKind::Protocol,
            Self::Auth(AuthError::InvalidChallenge { .. }) => ErrorKind::Protocol,
            Self::Auth(_) | Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Config(_) => ErrorKind::Configuration,
            Self::InvalidState(_) | Self::AlreadyClosed => ErrorKind::Usage,
            Self::Handshake { source, .. } => source.kind(),
        }
    }

    /// The state a handshake failure happened in.
    #[must_use]
    pub fn failed_state(&self) -> Option<SessionState> {
        match self {
            Self::Handshake { state, .. } => Some(*state),
            _ => None,
        }
    }

    /// The error underneath any handshake wrapping.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Handshake { source, .. } => source.root(),
            other => other,
        }
    }

    /// Server error code, if the server reported one.
    #[must_use]
    pub fn server_code(&self) -> Option<u16> {
        match self.root() {
            Self::Authentication { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if this error indicates a protocol/driver bug.
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        self.kind() == ErrorKind::Protocol
    }

    /// Check if the server rejected the credentials.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }
}

impl From<ErrPacket> for Error {
    fn from(err: ErrPacket) -> Self {
        Self::Authentication {
            code: err.code,
            sql_state: err.sql_state,
            message: err.message,
        }
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Server(packet) => packet.into(),
            CodecError::Protocol(e) => Self::Protocol(e),
            other => Self::Codec(other),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
