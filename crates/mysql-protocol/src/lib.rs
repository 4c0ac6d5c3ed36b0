//! # mysql-protocol
//!
//! Pure implementation of the connection phase of the MySQL client/server
//! protocol (protocol version 10, as spoken by MySQL 4.1+ and MariaDB).
//!
//! This crate provides the packet envelope, capability flags, the server
//! greeting, the client handshake response, and the packets a server sends
//! back after authentication.
//!
//! ## Design Philosophy
//!
//! This crate is intentionally IO-agnostic. It contains no networking logic and
//! makes no assumptions about the async runtime. `mysql-codec` reads and writes
//! these structures over a transport, and `mysql-client` drives the handshake.
//!
//! ## Example
//!
//! ```rust
//! use mysql_protocol::{Capabilities, HandshakeResponse};
//!
//! let response = HandshakeResponse {
//!     capabilities: Capabilities::CLIENT_SUPPORTED,
//!     max_packet_size: mysql_protocol::DEFAULT_MAX_PACKET_SIZE,
//!     collation: 33,
//!     username: "root",
//!     auth_response: &[],
//!     database: Some("app"),
//!     auth_plugin: Some("mysql_native_password"),
//! };
//!
//! assert!(response
//!     .effective_capabilities()
//!     .contains(Capabilities::CONNECT_WITH_DB));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod capabilities;
pub mod codec;
pub mod error;
pub mod greeting;
pub mod handshake_response;
pub mod packet;
pub mod response;
pub mod status;

pub use capabilities::Capabilities;
pub use codec::unpack_le;
pub use error::ProtocolError;
pub use greeting::{CHALLENGE_LEN, PROTOCOL_VERSION, ServerGreeting};
pub use handshake_response::HandshakeResponse;
pub use packet::{DEFAULT_MAX_PACKET_SIZE, MAX_PAYLOAD_LEN, PACKET_HEADER_SIZE, PacketHeader};
pub use response::{AuthResult, AuthSwitchRequest, ErrPacket, OkPacket};
pub use status::ServerStatus;
