//! # mysql-auth
//!
//! Authentication plugins for MySQL connections.
//!
//! This crate turns credentials and a server challenge into the bytes sent
//! in the handshake response, isolated from connection logic for better
//! modularity and testing.
//!
//! ## Supported Plugins
//!
//! | Plugin | Description |
//! |--------|-------------|
//! | `mysql_native_password` | SHA1 challenge-response |

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod credentials;
pub mod error;
pub mod native;
pub mod plugin;
pub mod provider;

pub use credentials::Credentials;
pub use error::AuthError;
pub use native::{SCRAMBLE_LEN, password_hash, scramble, verify_scramble};
pub use plugin::AuthPlugin;
pub use provider::{AuthProvider, NativePasswordAuth};
