//! Authentication error types.

use thiserror::Error;

/// Errors that can occur while producing an authentication response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The server asked for a plugin this client does not implement.
    #[error("unsupported authentication plugin: {0}")]
    UnsupportedPlugin(String),

    /// The challenge has the wrong length for the plugin.
    #[error("invalid challenge length {len} (expected {expected})")]
    InvalidChallenge {
        /// Length received.
        len: usize,
        /// Length the plugin requires.
        expected: usize,
    },
}
