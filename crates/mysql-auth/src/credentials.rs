//! Credential types for authentication.

use std::borrow::Cow;

/// Username and password for a MySQL account.
///
/// Credentials are designed to minimize copying of sensitive data; static
/// strings are borrowed rather than cloned.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    username: Cow<'static, str>,
    password: Cow<'static, str>,
}

impl Credentials {
    /// Create credentials from a username and password.
    pub fn new(
        username: impl Into<Cow<'static, str>>,
        password: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Account name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Plaintext password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Whether the account has no password.
    #[must_use]
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    /// Replace the username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<Cow<'static, str>>) -> Self {
        self.username = username.into();
        self
    }

    /// Replace the password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<Cow<'static, str>>) -> Self {
        self.password = password.into();
        self
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose sensitive data in debug output
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
