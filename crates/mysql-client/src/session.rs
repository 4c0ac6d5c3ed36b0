//! Session state machine for the connection phase.
//!
//! A [`Session`] owns one transport and the packet sequence counter that goes
//! with it. `open()` drives the handshake to completion or to the first
//! failure; every step is one ordered round trip and nothing runs in
//! parallel.

use std::fmt;
use std::sync::Arc;

use mysql_auth::AuthPlugin;
use mysql_codec::{Connection, PacketObserver};
use mysql_protocol::response::AUTH_SWITCH_HEADER;
use mysql_protocol::{AuthResult, Capabilities, HandshakeResponse, ProtocolError, ServerGreeting};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};

use crate::config::{Config, Network};
use crate::error::{Error, Result};
use crate::state::SessionState;

/// A byte stream a session can run over.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

type BoxedConnection = Connection<Box<dyn Transport>>;

/// A client session with a MySQL server.
///
/// # Example
///
/// ```rust,ignore
/// use mysql_client::{Config, Session};
///
/// let config = Config::new()
///     .host("db.internal")
///     .database("app")
///     .credentials(Credentials::new("app", "secret"));
///
/// let mut session = Session::new(config);
/// session.open().await?;
/// assert!(session.is_ready());
/// session.close().await?;
/// ```
pub struct Session {
    config: Config,
    state: SessionState,
    conn: Option<BoxedConnection>,
    greeting: Option<ServerGreeting>,
    capabilities: Capabilities,
    failed_in: Option<SessionState>,
    closed: bool,
    observer: Option<Arc<dyn PacketObserver>>,
}

impl Session {
    /// Create a closed session for `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: SessionState::Closed,
            conn: None,
            greeting: None,
            capabilities: Capabilities::empty(),
            failed_in: None,
            closed: false,
            observer: None,
        }
    }

    /// Report every raw byte read from or written to the transport.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PacketObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Dial the configured server and authenticate.
    ///
    /// The dial is bounded by the connect timeout and the rest of the
    /// handshake by the login timeout. Any failure leaves the session in
    /// [`SessionState::Failed`] and is returned as [`Error::Handshake`].
    pub async fn open(&mut self) -> Result<()> {
        self.ensure_openable()?;
        self.config.validate()?;

        self.transition(SessionState::Connecting);
        tracing::info!(
            network = %self.config.network,
            address = %self.config.address(),
            database = ?self.config.database_name(),
            "connecting to MySQL server"
        );

        let transport = match dial(&self.config).await {
            Ok(transport) => transport,
            Err(e) => return Err(self.fail(e)),
        };
        self.login(transport).await
    }

    /// Authenticate over an already established transport.
    pub async fn open_with_transport<T>(&mut self, transport: T) -> Result<()>
    where
        T: Transport + 'static,
    {
        self.ensure_openable()?;
        self.transition(SessionState::Connecting);
        self.login(Box::new(transport)).await
    }

    /// Release the transport.
    ///
    /// Valid in every state. A closed session cannot be reopened, and a
    /// second call returns [`Error::AlreadyClosed`].
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::AlreadyClosed);
        }
        self.closed = true;
        self.transition(SessionState::Closed);

        if let Some(mut conn) = self.conn.take() {
            // The transport is dropped either way
            if let Err(e) = conn.shutdown().await {
                tracing::debug!(error = %e, "transport shutdown failed");
            }
        }
        Ok(())
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether authentication succeeded and the session has not been closed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// The server greeting, once received.
    #[must_use]
    pub fn greeting(&self) -> Option<&ServerGreeting> {
        self.greeting.as_ref()
    }

    /// Capabilities sent to the server, empty before authentication.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Server version string from the greeting.
    #[must_use]
    pub fn server_version(&self) -> Option<&str> {
        self.greeting.as_ref().map(|g| g.server_version.as_str())
    }

    /// Server-assigned connection id.
    #[must_use]
    pub fn connection_id(&self) -> Option<u32> {
        self.greeting.as_ref().map(|g| g.connection_id)
    }

    /// State in which the handshake failed, if it did.
    #[must_use]
    pub fn failed_in(&self) -> Option<SessionState> {
        self.failed_in
    }

    /// Configuration the session was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn ensure_openable(&self) -> Result<()> {
        if self.closed || self.state != SessionState::Closed {
            return Err(Error::InvalidState(self.state));
        }
        Ok(())
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = %self.state, to = %next, "session state transition");
        self.state = next;
    }

    fn fail(&mut self, error: Error) -> Error {
        let state = self.state;
        self.failed_in = Some(state);
        self.transition(SessionState::Failed);
        tracing::warn!(state = %state, error = %error, "handshake failed");
        Error::Handshake {
            state,
            source: Box::new(error),
        }
    }

    fn conn(&mut self) -> Result<&mut BoxedConnection> {
        let state = self.state;
        self.conn.as_mut().ok_or(Error::InvalidState(state))
    }

    async fn login(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        let conn = match &self.observer {
            Some(observer) => Connection::with_observer(transport, Arc::clone(observer)),
            None => Connection::new(transport),
        };
        // Replies are bounded by the size we announce
        self.conn = Some(conn.with_max_message_len(self.config.max_packet_size as usize));

        let login_timeout = self.config.timeouts.login_timeout;
        match timeout(login_timeout, self.handshake()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(self.fail(e)),
            Err(_) => Err(self.fail(Error::LoginTimeout)),
        }
    }

    async fn handshake(&mut self) -> Result<()> {
        self.transition(SessionState::AwaitingGreeting);
        let greeting = self.conn()?.read_greeting().await?;
        tracing::debug!(
            server_version = %greeting.server_version,
            connection_id = greeting.connection_id,
            capabilities = ?greeting.capabilities(),
            plugin = ?greeting.auth_plugin_name,
            "received server greeting"
        );
        self.greeting = Some(greeting.clone());

        let negotiated = Capabilities::negotiate(greeting.capabilities())?;
        let database = self.config.database_name().map(str::to_owned);
        if database.is_some() && !negotiated.contains(Capabilities::CONNECT_WITH_DB) {
            return Err(ProtocolError::MissingCapability(Capabilities::CONNECT_WITH_DB).into());
        }

        let plugin = match greeting.auth_plugin_name.as_deref() {
            Some(name) => AuthPlugin::parse(name).unwrap_or_else(|_| {
                // The server will ask for a switch if it cannot accept this
                tracing::debug!(plugin = name, "unsupported default plugin, answering natively");
                AuthPlugin::default()
            }),
            None => AuthPlugin::default(),
        };

        self.transition(SessionState::SendingAuth);
        let credentials = self.config.credentials.clone();
        let auth_response = plugin
            .provider()
            .auth_response(&credentials, &greeting.challenge())?;

        let response = HandshakeResponse {
            capabilities: negotiated,
            max_packet_size: self.config.max_packet_size,
            collation: self.config.collation.unwrap_or(greeting.default_collation),
            username: credentials.username(),
            auth_response: &auth_response,
            database: database.as_deref(),
            auth_plugin: Some(plugin.name()),
        };
        let capabilities = response.effective_capabilities();
        let payload = response.encode_to_bytes()?;
        tracing::debug!(
            capabilities = ?capabilities,
            plugin = %plugin,
            "sending handshake response"
        );
        self.conn()?.write_message(&payload).await?;

        let mut switched = false;
        loop {
            self.transition(SessionState::AwaitingResult);
            let message = self.conn()?.read_message().await?;

            match AuthResult::decode(message.payload)? {
                AuthResult::Ok(ok) => {
                    self.capabilities = capabilities;
                    self.transition(SessionState::Ready);
                    tracing::info!(
                        server_version = %greeting.server_version,
                        connection_id = greeting.connection_id,
                        status = ?ok.status,
                        "authenticated"
                    );
                    return Ok(());
                }
                AuthResult::AuthError(err) => {
                    return Err(err.into());
                }
                AuthResult::AuthSwitchRequest(_) if switched => {
                    return Err(ProtocolError::UnexpectedPacket(AUTH_SWITCH_HEADER).into());
                }
                AuthResult::AuthSwitchRequest(switch) => {
                    switched = true;
                    self.transition(SessionState::SendingAuth);
                    let plugin = AuthPlugin::parse(&switch.plugin_name)?;
                    tracing::debug!(plugin = %plugin, "server requested authentication switch");

                    let auth_response = plugin
                        .provider()
                        .auth_response(&credentials, &switch.plugin_data)?;
                    self.conn()?.write_message(&auth_response).await?;
                }
            }
        }
    }
}

async fn dial(config: &Config) -> Result<Box<dyn Transport>> {
    let connect_timeout = config.timeouts.connect_timeout;
    match config.network {
        Network::Tcp => {
            let addr = config.address();
            tracing::debug!(address = %addr, "establishing TCP connection");
            let stream = timeout(connect_timeout, TcpStream::connect(&addr))
                .await
                .map_err(|_| Error::ConnectTimeout)??;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
        Network::Unix => dial_unix(config, connect_timeout).await,
    }
}

#[cfg(unix)]
async fn dial_unix(config: &Config, connect_timeout: Duration) -> Result<Box<dyn Transport>> {
    let path = config
        .socket
        .as_ref()
        .ok_or_else(|| Error::Config("unix network requires a socket path".into()))?;
    tracing::debug!(path = %path.display(), "establishing unix socket connection");
    let stream = timeout(connect_timeout, tokio::net::UnixStream::connect(path))
        .await
        .map_err(|_| Error::ConnectTimeout)??;
    Ok(Box::new(stream))
}

#[cfg(not(unix))]
async fn dial_unix(_config: &Config, _connect_timeout: Duration) -> Result<Box<dyn Transport>> {
    Err(Error::Config(
        "unix sockets are not supported on this platform".into(),
    ))
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.config.address())
            .field("state", &self.state)
            .field("connection_id", &self.connection_id())
            .field("failed_in", &self.failed_in)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mysql_auth::Credentials;

    // MariaDB 10.5 greeting, connection id 41, collation 45
    const GREETING: &[u8] = b"\x6d\x00\x00\x00\n5.5.5-10.5.8-MariaDB-1:10.5.8+maria~focal\0)\0\0\04bo+$r4H\0\xfe\xf7-\x02\0\xff\x81\x15\0\0\0\0\0\0\x0f\0\0\0O5X>j}Ur]Y)^\0mysql_native_password\0";

    const OK: &[u8] = b"\x07\x00\x00\x02\x00\x00\x00\x02\x00\x00\x00";

    // The server lacks LONG_PASSWORD, so the client drops it too
    fn expected_response() -> Vec<u8> {
        expected_response_with_max_packet(0x00ff_ffff)
    }

    fn expected_response_with_max_packet(max_packet_size: u32) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x000b_a208_u32.to_le_bytes());
        payload.extend_from_slice(&max_packet_size.to_le_bytes());
        payload.push(45);
        payload.extend_from_slice(&[0; 23]);
        payload.extend_from_slice(b"root\0");
        payload.push(20);
        payload.extend_from_slice(&[
            0x50, 0xaf, 0xf1, 0x12, 0x2c, 0xe9, 0xad, 0xea, 0x7f, 0xa0, 0x0a, 0xcd, 0xa2, 0xb5,
            0x3c, 0x17, 0xa5, 0xc9, 0x4a, 0xd0,
        ]);
        payload.extend_from_slice(b"test\0");
        payload.extend_from_slice(b"mysql_native_password\0");

        let mut wire = vec![payload.len() as u8, 0, 0, 1];
        wire.extend_from_slice(&payload);
        wire
    }

    fn config() -> Config {
        Config::new()
            .database("test")
            .credentials(Credentials::new("root", "password"))
    }

    #[tokio::test]
    async fn test_handshake_byte_exact() {
        let mock = tokio_test::io::Builder::new()
            .read(GREETING)
            .write(&expected_response())
            .read(OK)
            .build();

        let mut session = Session::new(config());
        session.open_with_transport(mock).await.unwrap();

        assert!(session.is_ready());
        assert_eq!(session.connection_id(), Some(41));
        assert_eq!(session.capabilities().bits(), 0x000b_a208);
        assert_eq!(
            session.server_version(),
            Some("5.5.5-10.5.8-MariaDB-1:10.5.8+maria~focal")
        );
    }

    #[tokio::test]
    async fn test_unexpected_result_header_fails() {
        let mock = tokio_test::io::Builder::new()
            .read(GREETING)
            .write(&expected_response())
            .read(b"\x01\x00\x00\x02\x42")
            .build();

        let mut session = Session::new(config());
        let err = session.open_with_transport(mock).await.unwrap_err();

        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.failed_in(), Some(SessionState::AwaitingResult));
        assert!(matches!(
            err.root(),
            Error::Protocol(ProtocolError::UnexpectedPacket(0x42))
        ));
    }

    #[tokio::test]
    async fn test_oversized_result_is_rejected() {
        // A full continued frame, far beyond the announced limit
        let mock = tokio_test::io::Builder::new()
            .read(GREETING)
            .write(&expected_response_with_max_packet(1024))
            .read(b"\xff\xff\xff\x02")
            .build();

        let mut session = Session::new(config().max_packet_size(1024));
        let err = session.open_with_transport(mock).await.unwrap_err();

        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.failed_in(), Some(SessionState::AwaitingResult));
        assert!(err.is_protocol_error());
        assert!(matches!(
            err.root(),
            Error::Protocol(ProtocolError::PacketTooLarge {
                size: 0x00FF_FFFF,
                max: 1024
            })
        ));
    }

    #[tokio::test]
    async fn test_open_twice_is_rejected() {
        let mock = tokio_test::io::Builder::new()
            .read(GREETING)
            .write(&expected_response())
            .read(OK)
            .build();

        let mut session = Session::new(config());
        session.open_with_transport(mock).await.unwrap();

        let again = tokio_test::io::Builder::new().build();
        let err = session.open_with_transport(again).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(SessionState::Ready)));
    }

    #[tokio::test]
    async fn test_close_before_open() {
        let mut session = Session::new(Config::new());
        session.close().await.unwrap();
        assert!(matches!(session.close().await, Err(Error::AlreadyClosed)));

        let mock = tokio_test::io::Builder::new().build();
        let err = session.open_with_transport(mock).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(SessionState::Closed)));
    }

    #[test]
    fn test_debug_hides_credentials() {
        let session = Session::new(config());
        let debug = format!("{session:?}");
        assert!(debug.contains("localhost:3306"));
        assert!(!debug.contains("password"));
    }
}
