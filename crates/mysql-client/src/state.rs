//! Session states.
//!
//! ## State Transitions
//!
//! ```text
//! Closed -> Connecting (via open())
//! Connecting -> AwaitingGreeting (transport established)
//! AwaitingGreeting -> SendingAuth (greeting decoded, capabilities negotiated)
//! SendingAuth -> AwaitingResult (handshake response written)
//! AwaitingResult -> SendingAuth (authentication switch requested)
//! AwaitingResult -> Ready (OK packet)
//! any open state -> Failed (first error)
//! any state -> Closed (via close())
//! ```

use std::fmt;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No transport.
    #[default]
    Closed,
    /// Establishing the transport.
    Connecting,
    /// Waiting for the server greeting.
    AwaitingGreeting,
    /// Computing and writing the authentication response.
    SendingAuth,
    /// Waiting for the authentication result.
    AwaitingResult,
    /// Authenticated; the connection can carry commands.
    Ready,
    /// The handshake failed; only `close()` remains valid.
    Failed,
}

impl SessionState {
    /// Whether the handshake is in progress.
    #[must_use]
    pub fn is_handshaking(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::AwaitingGreeting | Self::SendingAuth | Self::AwaitingResult
        )
    }

    /// Whether the session will make no further progress without `close()`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    /// Lowercase name used in logs and error messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::AwaitingGreeting => "awaiting greeting",
            Self::SendingAuth => "sending auth",
            Self::AwaitingResult => "awaiting result",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_properties() {
        assert_eq!(SessionState::default(), SessionState::Closed);
        assert!(SessionState::AwaitingGreeting.is_handshaking());
        assert!(!SessionState::Ready.is_handshaking());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Closed.is_terminal());
        assert_eq!(SessionState::AwaitingResult.to_string(), "awaiting result");
    }
}
