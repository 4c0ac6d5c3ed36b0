//! Mock MySQL server for unit testing.
//!
//! The server speaks the connection phase only: it sends a protocol 10
//! greeting, reads the client's handshake response, checks the native
//! password scramble against its configured account and answers with an OK
//! or ERR packet. [`MockBehavior`] switches it into authentication switch
//! flows or deliberate protocol violations.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mysql_testing::mock_server::{MockBehavior, MockMySqlServer};
//!
//! #[tokio::test]
//! async fn test_switch() {
//!     let server = MockMySqlServer::builder()
//!         .with_user("root", "password")
//!         .with_behavior(MockBehavior::AuthSwitch)
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     let addr = server.addr();
//!     // Connect your client to addr...
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::{Buf, Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use mysql_auth::{AuthPlugin, password_hash, verify_scramble};
use mysql_codec::{CodecError, Packet, PacketCodec};
use mysql_protocol::codec::{ensure_remaining, get_bytes, get_str_nul};
use mysql_protocol::{
    AuthResult, AuthSwitchRequest, CHALLENGE_LEN, Capabilities, ErrPacket, OkPacket,
    PROTOCOL_VERSION, ServerGreeting, ServerStatus,
};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, broadcast};
use tokio_util::codec::Framed;

/// Error code for bad credentials.
pub const ER_ACCESS_DENIED_ERROR: u16 = 1045;

/// Error code for an unknown initial database.
pub const ER_BAD_DB_ERROR: u16 = 1049;

/// Error type for mock server operations.
#[derive(Debug, Error)]
pub enum MockServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The client went away mid-handshake.
    #[error("client disconnected")]
    Disconnected,
}

/// Result type for mock server operations.
pub type Result<T> = std::result::Result<T, MockServerError>;

/// How the server conducts the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MockBehavior {
    /// Verify credentials and answer OK or ERR.
    #[default]
    Normal,
    /// Answer every login with ERR 1045.
    RejectAll,
    /// Ask the client to switch to `mysql_native_password` with a fresh
    /// challenge, then verify the second response.
    AuthSwitch,
    /// Ask for an authentication switch after the switch.
    RepeatedAuthSwitch,
    /// Ask the client to switch to the named plugin.
    SwitchTo(String),
    /// Send the greeting with sequence number 1.
    WrongGreetingSequence,
    /// Send an ERR packet in place of the greeting.
    ErrorGreeting {
        /// Error code.
        code: u16,
        /// Error message.
        message: String,
    },
    /// Accept the connection and never send anything.
    Silent,
    /// Send the greeting, then hang up without reading the response.
    CloseAfterGreeting,
}

/// Mock server configuration.
#[derive(Debug, Clone)]
pub struct MockServerConfig {
    /// Version string in the greeting.
    pub server_version: String,
    /// Account name accepted by the server.
    pub username: String,
    /// Account password accepted by the server.
    pub password: String,
    /// Databases a client may select; empty accepts any.
    pub databases: Vec<String>,
    /// Challenge sent in the greeting.
    pub challenge: [u8; CHALLENGE_LEN],
    /// Default plugin announced in the greeting.
    pub auth_plugin: String,
    /// Capabilities announced in the greeting.
    pub capabilities: Capabilities,
    /// Default collation id.
    pub collation: u8,
    /// Handshake behaviour.
    pub behavior: MockBehavior,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            server_version: "8.0.36-mock".to_string(),
            username: "root".to_string(),
            password: "password".to_string(),
            databases: Vec::new(),
            challenge: *b"4bo+$r4HO5X>j}Ur]Y)^",
            auth_plugin: AuthPlugin::MysqlNativePassword.name().to_string(),
            capabilities: Capabilities::CLIENT_SUPPORTED
                | Capabilities::FOUND_ROWS
                | Capabilities::LONG_FLAG
                | Capabilities::CONNECT_ATTRS,
            collation: 255,
            behavior: MockBehavior::Normal,
        }
    }
}

/// Builder for the mock server.
#[derive(Debug, Default)]
pub struct MockServerBuilder {
    config: MockServerConfig,
}

impl MockServerBuilder {
    /// Create a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the accepted account.
    #[must_use]
    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = username.into();
        self.config.password = password.into();
        self
    }

    /// Add a database the client may select.
    #[must_use]
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.config.databases.push(db.into());
        self
    }

    /// Set the server version string.
    #[must_use]
    pub fn with_server_version(mut self, version: impl Into<String>) -> Self {
        self.config.server_version = version.into();
        self
    }

    /// Set the greeting challenge.
    #[must_use]
    pub fn with_challenge(mut self, challenge: [u8; CHALLENGE_LEN]) -> Self {
        self.config.challenge = challenge;
        self
    }

    /// Set the default plugin announced in the greeting.
    #[must_use]
    pub fn with_auth_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.config.auth_plugin = plugin.into();
        self
    }

    /// Set the announced capabilities.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    /// Set the default collation id.
    #[must_use]
    pub fn with_collation(mut self, collation: u8) -> Self {
        self.config.collation = collation;
        self
    }

    /// Set the handshake behaviour.
    #[must_use]
    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.config.behavior = behavior;
        self
    }

    /// Build and start the mock server.
    pub async fn build(self) -> Result<MockMySqlServer> {
        MockMySqlServer::start(self.config).await
    }
}

/// A handshake response as the server decoded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedHandshake {
    /// Capability flags sent by the client.
    pub capabilities: Capabilities,
    /// Client max packet size.
    pub max_packet_size: u32,
    /// Requested collation.
    pub collation: u8,
    /// Login user.
    pub username: String,
    /// Scrambled credential.
    pub auth_response: Bytes,
    /// Requested database.
    pub database: Option<String>,
    /// Plugin named by the client.
    pub auth_plugin: Option<String>,
}

impl ReceivedHandshake {
    /// Decode a 4.1 handshake response payload.
    pub fn decode(mut src: Bytes) -> std::result::Result<Self, mysql_protocol::ProtocolError> {
        ensure_remaining(&src, 32, "handshake response header")?;
        let capabilities = Capabilities::from_bits_retain(src.get_u32_le());
        let max_packet_size = src.get_u32_le();
        let collation = src.get_u8();
        src.advance(23);

        let username = get_str_nul(&mut src, "username")?;
        ensure_remaining(&src, 1, "auth response length")?;
        let len = usize::from(src.get_u8());
        let auth_response = get_bytes(&mut src, len, "auth response")?;

        let database = if capabilities.contains(Capabilities::CONNECT_WITH_DB) {
            Some(get_str_nul(&mut src, "database")?)
        } else {
            None
        };
        let auth_plugin = if capabilities.contains(Capabilities::PLUGIN_AUTH) {
            Some(get_str_nul(&mut src, "auth plugin name")?)
        } else {
            None
        };

        Ok(Self {
            capabilities,
            max_packet_size,
            collation,
            username,
            auth_response,
            database,
            auth_plugin,
        })
    }
}

/// Mock MySQL server.
///
/// Listens on an ephemeral loopback port and handles each connection on its
/// own task until stopped or dropped.
pub struct MockMySqlServer {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    handshakes: Arc<Mutex<Vec<ReceivedHandshake>>>,
}

impl MockMySqlServer {
    /// Create a new builder for the mock server.
    #[must_use]
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::new()
    }

    /// Start the mock server on an available port.
    pub async fn start(config: MockServerConfig) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, _) = broadcast::channel(1);
        let config = Arc::new(config);
        let handshakes = Arc::new(Mutex::new(Vec::new()));
        let next_id = Arc::new(AtomicU32::new(1));

        let server = Self {
            addr,
            shutdown_tx: shutdown_tx.clone(),
            handshakes: Arc::clone(&handshakes),
        };

        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer)) => {
                                let config = Arc::clone(&config);
                                let handshakes = Arc::clone(&handshakes);
                                let connection_id = next_id.fetch_add(1, Ordering::Relaxed);
                                tokio::spawn(async move {
                                    tracing::debug!(%peer, connection_id, "mock server accepted connection");
                                    let conn = MockConnection { config, handshakes, connection_id };
                                    if let Err(e) = conn.run(stream).await {
                                        tracing::debug!(error = %e, "mock connection ended");
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "mock server accept failed");
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Ok(server)
    }

    /// Get the server's listening address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the host string for connection configuration.
    #[must_use]
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Handshake responses received so far, in arrival order.
    pub async fn handshakes(&self) -> Vec<ReceivedHandshake> {
        self.handshakes.lock().await.clone()
    }

    /// Stop accepting connections.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl Drop for MockMySqlServer {
    fn drop(&mut self) {
        self.stop();
    }
}

struct MockConnection {
    config: Arc<MockServerConfig>,
    handshakes: Arc<Mutex<Vec<ReceivedHandshake>>>,
    connection_id: u32,
}

impl MockConnection {
    async fn run(self, stream: TcpStream) -> Result<()> {
        let mut framed = Framed::new(stream, PacketCodec::new());
        let config = &self.config;

        match &config.behavior {
            MockBehavior::Silent => {
                // Hold the socket open until the client gives up
                while framed.next().await.is_some() {}
                return Ok(());
            }
            MockBehavior::ErrorGreeting { code, message } => {
                let err = ErrPacket {
                    code: *code,
                    sql_state: None,
                    message: message.clone(),
                };
                let payload = AuthResult::AuthError(err).encode_to_bytes().map_err(protocol)?;
                return send(&mut framed, 0, payload).await;
            }
            _ => {}
        }

        let greeting_seq = match config.behavior {
            MockBehavior::WrongGreetingSequence => 1,
            _ => 0,
        };
        let greeting = self.greeting().encode_to_bytes().map_err(protocol)?;
        send(&mut framed, greeting_seq, greeting).await?;

        if config.behavior == MockBehavior::CloseAfterGreeting {
            return Ok(());
        }

        let packet = recv(&mut framed).await?;
        let mut seq = packet.sequence().wrapping_add(1);
        let handshake = ReceivedHandshake::decode(packet.payload.freeze()).map_err(protocol)?;
        tracing::debug!(
            username = %handshake.username,
            database = ?handshake.database,
            plugin = ?handshake.auth_plugin,
            "mock server received handshake response"
        );
        self.handshakes.lock().await.push(handshake.clone());

        let mut challenge = config.challenge;
        let mut auth_response = handshake.auth_response.clone();

        let native = AuthPlugin::MysqlNativePassword.name();
        let switches: Vec<&str> = match &config.behavior {
            MockBehavior::AuthSwitch => vec![native],
            MockBehavior::RepeatedAuthSwitch => vec![native, native],
            MockBehavior::SwitchTo(plugin) => vec![plugin.as_str()],
            _ => Vec::new(),
        };

        for plugin in switches {
            // A new challenge so a stale response cannot verify
            challenge.reverse();
            let switch = AuthResult::AuthSwitchRequest(AuthSwitchRequest {
                plugin_name: plugin.to_string(),
                plugin_data: Bytes::copy_from_slice(&challenge),
            });
            send(&mut framed, seq, switch.encode_to_bytes().map_err(protocol)?).await?;

            let packet = recv(&mut framed).await?;
            seq = packet.sequence().wrapping_add(1);
            auth_response = packet.payload.freeze();
        }

        let result = self.authenticate(&handshake, &challenge, &auth_response);
        send(&mut framed, seq, result.encode_to_bytes().map_err(protocol)?).await?;

        // Keep the connection until the client closes it
        while framed.next().await.is_some() {}
        Ok(())
    }

    fn greeting(&self) -> ServerGreeting {
        let config = &self.config;
        let caps = config.capabilities.bits();
        let (part1, part2) = config.challenge.split_at(8);
        let mut challenge_part1 = [0u8; 8];
        challenge_part1.copy_from_slice(part1);

        ServerGreeting {
            protocol_version: PROTOCOL_VERSION,
            server_version: config.server_version.clone(),
            connection_id: self.connection_id,
            challenge_part1,
            capabilities_lower: caps as u16,
            default_collation: config.collation,
            status: ServerStatus::AUTOCOMMIT,
            capabilities_upper: (caps >> 16) as u16,
            challenge_len: (CHALLENGE_LEN + 1) as u8,
            challenge_part2: Bytes::copy_from_slice(part2),
            auth_plugin_name: config
                .capabilities
                .contains(Capabilities::PLUGIN_AUTH)
                .then(|| config.auth_plugin.clone()),
        }
    }

    fn authenticate(
        &self,
        handshake: &ReceivedHandshake,
        challenge: &[u8],
        auth_response: &[u8],
    ) -> AuthResult {
        let config = &self.config;

        let password_ok = if config.password.is_empty() {
            auth_response.is_empty()
        } else {
            verify_scramble(
                challenge,
                auth_response,
                &password_hash(config.password.as_bytes()),
            )
        };

        if config.behavior == MockBehavior::RejectAll
            || handshake.username != config.username
            || !password_ok
        {
            return AuthResult::AuthError(ErrPacket {
                code: ER_ACCESS_DENIED_ERROR,
                sql_state: Some("28000".into()),
                message: format!(
                    "Access denied for user '{}'@'localhost' (using password: {})",
                    handshake.username,
                    if auth_response.is_empty() { "NO" } else { "YES" }
                ),
            });
        }

        if let Some(db) = &handshake.database {
            if !config.databases.is_empty() && !config.databases.contains(db) {
                return AuthResult::AuthError(ErrPacket {
                    code: ER_BAD_DB_ERROR,
                    sql_state: Some("42000".into()),
                    message: format!("Unknown database '{db}'"),
                });
            }
        }

        AuthResult::Ok(OkPacket {
            status: ServerStatus::AUTOCOMMIT,
            ..OkPacket::default()
        })
    }
}

fn protocol(e: mysql_protocol::ProtocolError) -> MockServerError {
    MockServerError::Protocol(e.to_string())
}

async fn send(framed: &mut Framed<TcpStream, PacketCodec>, seq: u8, payload: Bytes) -> Result<()> {
    framed
        .send(Packet::new(seq, BytesMut::from(&payload[..]))?)
        .await?;
    Ok(())
}

async fn recv(framed: &mut Framed<TcpStream, PacketCodec>) -> Result<Packet> {
    match framed.next().await {
        Some(packet) => Ok(packet?),
        None => Err(MockServerError::Disconnected),
    }
}
