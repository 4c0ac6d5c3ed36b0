//! # mysql-codec
//!
//! Async framing layer for MySQL packet handling.
//!
//! This crate moves the structures of `mysql-protocol` across an async byte
//! stream. It reads packet headers and payloads with exact-read semantics,
//! splits outgoing messages into frames, reassembles continued messages and
//! decodes the server greeting field by field straight off the transport.
//!
//! ## Architecture
//!
//! ```text
//! Transport → ObservedIo (optional tee) → BufStream → Connection → Session
//! ```
//!
//! `PacketCodec` implements tokio-util's `Decoder`/`Encoder` for callers that
//! prefer `Framed` (the test server does).
//!
//! ## Sequencing
//!
//! `Connection` owns the packet sequence counter. Every frame read is checked
//! against it and every frame written advances it, so a single exchange is a
//! strict total order over both directions.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod connection;
pub mod error;
pub mod greeting;
pub mod io;
pub mod message;
pub mod observer;
pub mod packet_codec;

pub use connection::Connection;
pub use error::CodecError;
pub use greeting::decode_greeting;
pub use io::{read_exact, read_exact_into, read_header, write_frame, write_packet};
pub use message::{Message, MessageAssembler};
pub use observer::{ObservedIo, PacketObserver};
pub use packet_codec::{Packet, PacketCodec};
