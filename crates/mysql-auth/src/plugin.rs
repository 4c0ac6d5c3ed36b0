//! Authentication plugin names.

use std::fmt;
use std::str::FromStr;

use crate::error::AuthError;
use crate::provider::{AuthProvider, NativePasswordAuth};

/// Authentication plugins this client can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum AuthPlugin {
    /// SHA1 challenge-response.
    #[default]
    MysqlNativePassword,
}

impl AuthPlugin {
    /// Wire name of the plugin.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MysqlNativePassword => "mysql_native_password",
        }
    }

    /// Look up a plugin by the name a server announced.
    pub fn parse(name: &str) -> Result<Self, AuthError> {
        match name {
            "mysql_native_password" => Ok(Self::MysqlNativePassword),
            other => Err(AuthError::UnsupportedPlugin(other.to_owned())),
        }
    }

    /// Provider that computes responses for this plugin.
    #[must_use]
    pub fn provider(&self) -> &'static dyn AuthProvider {
        match self {
            Self::MysqlNativePassword => &NativePasswordAuth,
        }
    }
}

impl FromStr for AuthPlugin {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AuthPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
