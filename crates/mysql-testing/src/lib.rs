//! # mysql-testing
//!
//! Test infrastructure for MySQL client development.
//!
//! ## Features
//!
//! - In-process mock MySQL server (no Docker required) that speaks the
//!   connection phase: greeting, credential verification, OK/ERR replies,
//!   authentication switch and a few deliberate protocol violations
//! - Raw traffic recording through [`PacketRecorder`]
//! - MySQL container image for testcontainers
//!
//! ## Mock Server Example
//!
//! ```rust,ignore
//! use mysql_testing::MockMySqlServer;
//!
//! #[tokio::test]
//! async fn test_login() {
//!     let server = MockMySqlServer::builder()
//!         .with_user("app", "secret")
//!         .with_database("app")
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     // Connect your client to server.addr()
//!     let addr = server.addr();
//!     // ...
//! }
//! ```
//!
//! ## Container Example
//!
//! ```rust,ignore
//! use mysql_testing::MySqlContainer;
//! use testcontainers::runners::AsyncRunner;
//!
//! let container = MySqlContainer::default().start().await?;
//! let port = container.get_host_port_ipv4(3306).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod container;
pub mod mock_server;
pub mod recorder;

pub use container::MySqlContainer;
pub use mock_server::{
    MockBehavior, MockMySqlServer, MockServerBuilder, MockServerConfig, MockServerError,
    ReceivedHandshake,
};
pub use recorder::{Direction, PacketRecorder, RecordedChunk};
