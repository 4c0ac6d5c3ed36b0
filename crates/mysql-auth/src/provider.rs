//! Authentication provider traits.
//!
//! A provider turns credentials and the server's challenge into the
//! auth-response bytes of the handshake response (or of a reply to an
//! authentication switch request).

use crate::credentials::Credentials;
use crate::error::AuthError;
use crate::native::{SCRAMBLE_LEN, scramble};
use crate::plugin::AuthPlugin;

/// Trait for authentication providers.
///
/// # Example
///
/// ```rust
/// use mysql_auth::{AuthProvider, Credentials, NativePasswordAuth};
///
/// let creds = Credentials::new("root", "password");
/// let response = NativePasswordAuth
///     .auth_response(&creds, b"4bo+$r4HO5X>j}Ur]Y)^")
///     .unwrap();
/// assert_eq!(response.len(), 20);
/// ```
pub trait AuthProvider: Send + Sync {
    /// Plugin this provider implements.
    fn plugin(&self) -> AuthPlugin;

    /// Compute the auth response for `challenge`.
    fn auth_response(
        &self,
        credentials: &Credentials,
        challenge: &[u8],
    ) -> Result<Vec<u8>, AuthError>;
}

/// `mysql_native_password` provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePasswordAuth;

impl AuthProvider for NativePasswordAuth {
    fn plugin(&self) -> AuthPlugin {
        AuthPlugin::MysqlNativePassword
    }

    fn auth_response(
        &self,
        credentials: &Credentials,
        challenge: &[u8],
    ) -> Result<Vec<u8>, AuthError> {
        if challenge.len() != SCRAMBLE_LEN {
            return Err(AuthError::InvalidChallenge {
                len: challenge.len(),
                expected: SCRAMBLE_LEN,
            });
        }

        tracing::trace!(
            username = credentials.username(),
            empty_password = !credentials.has_password(),
            "computing native password scramble"
        );

        Ok(scramble(challenge, credentials.password().as_bytes()))
    }
}
