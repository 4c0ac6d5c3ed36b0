//! # mysql-client
//!
//! Async MySQL client session covering the connection phase: dialing the
//! server, reading its greeting, negotiating capabilities and authenticating.
//!
//! ## Session Lifecycle
//!
//! ```text
//! Closed -> Connecting -> AwaitingGreeting -> SendingAuth -> AwaitingResult -> Ready
//!                    \_____________ any failure _____________/
//!                                      |
//!                                    Failed
//! ```
//!
//! `close()` is valid from every state and releases the transport.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mysql_client::{Config, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_connection_string(
//!         "Server=localhost;Database=app;User Id=app;Password=secret;"
//!     )?;
//!
//!     let mut session = Session::new(config);
//!     session.open().await?;
//!     println!("connected to {:?}", session.server_version());
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod session;
pub mod state;

pub use config::{Config, Network, TimeoutConfig};
pub use error::{Error, ErrorKind, Result};
pub use session::{Session, Transport};
pub use state::SessionState;

// Re-export commonly used types from dependencies
pub use mysql_auth::Credentials;
pub use mysql_codec::PacketObserver;
pub use mysql_protocol::{Capabilities, ServerGreeting};
