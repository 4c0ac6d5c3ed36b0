//! Client configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use mysql_auth::Credentials;
use mysql_protocol::DEFAULT_MAX_PACKET_SIZE;

use crate::error::Error;

/// Default MySQL TCP port.
pub const DEFAULT_PORT: u16 = 3306;

/// Transport family used to reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    /// TCP to `host:port`.
    #[default]
    Tcp,
    /// Unix domain socket at [`Config::socket`].
    Unix,
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("tcp") {
            Ok(Self::Tcp)
        } else if s.eq_ignore_ascii_case("unix") || s.eq_ignore_ascii_case("socket") {
            Ok(Self::Unix)
        } else {
            Err(Error::Config(format!("invalid network: {s}")))
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("tcp"),
            Self::Unix => f.write_str("unix"),
        }
    }
}

/// Timeout configuration for the connection phases.
///
/// Timeouts are enforced around whole transport operations. A handshake that
/// times out fails the session; a partially read field is never resumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Time to establish the transport (default: 15s).
    pub connect_timeout: Duration,
    /// Time to complete greeting and authentication (default: 30s).
    pub login_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            login_timeout: Duration::from_secs(30),
        }
    }
}

impl TimeoutConfig {
    /// Create a new timeout configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the login timeout.
    #[must_use]
    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }
}

/// Connection parameters, fixed when the session is created.
#[derive(Debug, Clone)]
pub struct Config {
    /// Transport family.
    pub network: Network,
    /// Server host for TCP.
    pub host: String,
    /// Server port for TCP.
    pub port: u16,
    /// Socket path for [`Network::Unix`].
    pub socket: Option<PathBuf>,
    /// Initial schema. An empty name is treated as no database.
    pub database: Option<String>,
    /// Account credentials.
    pub credentials: Credentials,
    /// Largest packet the client is willing to receive.
    pub max_packet_size: u32,
    /// Collation id to request; `None` keeps the server default.
    pub collation: Option<u8>,
    /// Timeouts.
    pub timeouts: TimeoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::Tcp,
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            socket: None,
            database: None,
            credentials: Credentials::default(),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            collation: None,
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a connection string into configuration.
    ///
    /// Keys are case-insensitive:
    /// ```text
    /// Server=localhost;Port=3306;Database=app;User Id=app;Password=secret;
    /// ```
    pub fn from_connection_string(conn_str: &str) -> Result<Self, Error> {
        let mut config = Self::default();

        for part in conn_str.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("invalid key-value: {part}")))?;

            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "server" | "host" | "data source" | "address" => {
                    let (host, port) = parse_server(value)?;
                    config.host = host.to_string();
                    if let Some(port) = port {
                        config.port = port;
                    }
                }
                "port" => {
                    config.port = parse_port(value)?;
                }
                "database" | "initial catalog" | "db" => {
                    config.database = (!value.is_empty()).then(|| value.to_string());
                }
                "user id" | "uid" | "user" | "username" => {
                    config.credentials = config.credentials.with_username(value.to_string());
                }
                "password" | "pwd" => {
                    config.credentials = config.credentials.with_password(value.to_string());
                }
                "network" | "protocol" => {
                    config.network = value.parse()?;
                }
                "socket" => {
                    config.socket = Some(PathBuf::from(value));
                    config.network = Network::Unix;
                }
                "max packet size" | "maxpacketsize" => {
                    config.max_packet_size = value.parse().map_err(|_| {
                        Error::Config(format!("invalid max packet size: {value}"))
                    })?;
                }
                "connect timeout" | "connection timeout" => {
                    config.timeouts.connect_timeout = parse_timeout(value)?;
                }
                "login timeout" => {
                    config.timeouts.login_timeout = parse_timeout(value)?;
                }
                "collation" => {
                    let id: u8 = value
                        .parse()
                        .map_err(|_| Error::Config(format!("invalid collation: {value}")))?;
                    config.collation = Some(id);
                }
                _ => {
                    // Values may hold secrets, only the key is logged
                    tracing::debug!(key = key, "ignoring unknown connection string option");
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the parameters for combinations that cannot connect.
    pub fn validate(&self) -> Result<(), Error> {
        match self.network {
            Network::Tcp if self.host.is_empty() => {
                Err(Error::Config("host must not be empty".into()))
            }
            Network::Unix if self.socket.is_none() => {
                Err(Error::Config("unix network requires a socket path".into()))
            }
            _ if self.max_packet_size == 0 => {
                Err(Error::Config("max packet size must be non-zero".into()))
            }
            _ => Ok(()),
        }
    }

    /// The database to send, if a non-empty one is configured.
    #[must_use]
    pub fn database_name(&self) -> Option<&str> {
        self.database.as_deref().filter(|db| !db.is_empty())
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Connect over a Unix domain socket at `path`.
    #[must_use]
    pub fn socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket = Some(path.into());
        self.network = Network::Unix;
        self
    }

    /// Set the transport family.
    #[must_use]
    pub fn network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Set the initial database.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the maximum packet size advertised to the server.
    #[must_use]
    pub fn max_packet_size(mut self, size: u32) -> Self {
        self.max_packet_size = size;
        self
    }

    /// Request a specific collation id.
    #[must_use]
    pub fn collation(mut self, collation: u8) -> Self {
        self.collation = Some(collation);
        self
    }

    /// Set the timeouts.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect_timeout = timeout;
        self
    }

    /// Set the login timeout.
    #[must_use]
    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.login_timeout = timeout;
        self
    }

    /// Address string used for logging and TCP dialing.
    #[must_use]
    pub fn address(&self) -> String {
        match self.network {
            Network::Tcp if self.host.contains(':') => format!("[{}]:{}", self.host, self.port),
            Network::Tcp => format!("{}:{}", self.host, self.port),
            Network::Unix => self
                .socket
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Split `host`, `host:port`, `[ipv6]` or `[ipv6]:port`.
///
/// A bare IPv6 literal such as `::1` is taken as a host without a port.
fn parse_server(value: &str) -> Result<(&str, Option<u16>), Error> {
    if let Some(rest) = value.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| Error::Config(format!("invalid server: {value}")))?;
        return match tail {
            "" => Ok((host, None)),
            _ => match tail.strip_prefix(':') {
                Some(port) => Ok((host, Some(parse_port(port)?))),
                None => Err(Error::Config(format!("invalid server: {value}"))),
            },
        };
    }

    match value.split_once(':') {
        Some((host, port)) if !port.contains(':') => Ok((host, Some(parse_port(port)?))),
        _ => Ok((value, None)),
    }
}

fn parse_port(value: &str) -> Result<u16, Error> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("invalid port: {value}")))
}

fn parse_timeout(value: &str) -> Result<Duration, Error> {
    let secs: u64 = value
        .parse()
        .map_err(|_| Error::Config(format!("invalid timeout: {value}")))?;
    Ok(Duration::from_secs(secs))
}
