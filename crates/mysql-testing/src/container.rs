//! MySQL container support via testcontainers.

use testcontainers::Image;
use testcontainers::core::{ContainerPort, WaitFor};

/// Port MySQL listens on inside the container.
pub const MYSQL_PORT: u16 = 3306;

/// MySQL container image.
///
/// The server is started with `mysql_native_password` as the default
/// authentication plugin so the root account can be used directly.
#[derive(Debug, Clone)]
pub struct MySqlContainer {
    /// Root password.
    pub root_password: String,
    /// Database created at startup.
    pub database: String,
    /// Container tag (version).
    pub tag: String,
}

impl Default for MySqlContainer {
    fn default() -> Self {
        Self {
            root_password: "Password123!".to_string(),
            database: "test".to_string(),
            tag: "8.0".to_string(),
        }
    }
}

impl MySqlContainer {
    /// Create a new MySQL container configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root password.
    #[must_use]
    pub fn with_root_password(mut self, password: impl Into<String>) -> Self {
        self.root_password = password.into();
        self
    }

    /// Set the database created at startup.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the container tag (MySQL version).
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }
}

impl Image for MySqlContainer {
    fn name(&self) -> &str {
        "mysql"
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn ready_conditions(&self) -> Vec<WaitFor> {
        // The entrypoint starts a temporary server first; the port line only
        // appears for the real one.
        vec![WaitFor::message_on_stderr("port: 3306  MySQL Community Server")]
    }

    fn env_vars(
        &self,
    ) -> impl IntoIterator<
        Item = (
            impl Into<std::borrow::Cow<'_, str>>,
            impl Into<std::borrow::Cow<'_, str>>,
        ),
    > {
        vec![
            ("MYSQL_ROOT_PASSWORD", self.root_password.as_str()),
            ("MYSQL_DATABASE", self.database.as_str()),
        ]
    }

    fn cmd(&self) -> impl IntoIterator<Item = impl Into<std::borrow::Cow<'_, str>>> {
        vec!["--default-authentication-plugin=mysql_native_password"]
    }

    fn expose_ports(&self) -> &[ContainerPort] {
        &[ContainerPort::Tcp(MYSQL_PORT)]
    }
}
