use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_postgres::config::SslMode;

use crate::error::SqlRepositoryError;

/// Connection settings consumed by [`SessionManager::connect`](crate::SessionManager::connect).
///
/// When `connection_string` is present it is parsed first; the individual fields only fill
/// what the string left unset.
///
/// ```rust
/// use sql_repository::prelude::*;
///
/// let cfg = ConnectionConfig::from_connection_string("postgres://app@db.internal/app")
///     .with_password("secret")
///     .with_pool_size(8);
/// # let _ = cfg;
/// ```
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    #[serde(alias = "connectionString")]
    pub connection_string: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    /// Preferred over `user` when both are set.
    pub username: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub ssl: Option<bool>,
    /// Sets the session `search_path`.
    pub schema: Option<String>,
    #[serde(alias = "poolSize")]
    pub pool_size: Option<usize>,
    #[serde(alias = "idleTimeoutMillis")]
    pub idle_timeout_millis: Option<u64>,
    #[serde(alias = "connectionTimeoutMillis")]
    pub connection_timeout_millis: Option<u64>,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "<redacted>"),
            )
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ssl", &self.ssl)
            .field("schema", &self.schema)
            .field("pool_size", &self.pool_size)
            .field("idle_timeout_millis", &self.idle_timeout_millis)
            .field("connection_timeout_millis", &self.connection_timeout_millis)
            .finish()
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_connection_string(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: Some(connection_string.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = Some(ssl);
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_millis = Some(duration_millis(timeout));
        self
    }

    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_millis = Some(duration_millis(timeout));
        self
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_millis.map(Duration::from_millis)
    }

    #[must_use]
    pub fn connection_timeout(&self) -> Option<Duration> {
        self.connection_timeout_millis.map(Duration::from_millis)
    }

    /// Whether the resolved settings ask for an encrypted link.
    pub(crate) fn requires_tls(pg_config: &tokio_postgres::Config) -> bool {
        pg_config.get_ssl_mode() == SslMode::Require
    }

    /// Resolve into a driver config: connection string first, fields fill the gaps.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError::ConnectionError` if the connection string cannot be parsed
    /// or required settings are missing.
    pub fn to_pg_config(&self) -> Result<tokio_postgres::Config, SqlRepositoryError> {
        let mut pg_config = match &self.connection_string {
            Some(conn_str) => tokio_postgres::Config::from_str(conn_str).map_err(|e| {
                SqlRepositoryError::connection_with(
                    format!("Invalid PostgreSQL connection string: {e}"),
                    e,
                )
            })?,
            None => tokio_postgres::Config::new(),
        };

        if pg_config.get_hosts().is_empty() {
            if let Some(host) = &self.host {
                pg_config.host(host.as_str());
            }
        }
        if pg_config.get_ports().is_empty() {
            if let Some(port) = self.port {
                pg_config.port(port);
            }
        }
        if pg_config.get_dbname().is_none() {
            if let Some(database) = &self.database {
                pg_config.dbname(database.as_str());
            }
        }
        if pg_config.get_user().is_none() {
            if let Some(user) = self.username.as_ref().or(self.user.as_ref()) {
                pg_config.user(user.as_str());
            }
        }
        if pg_config.get_password().is_none() {
            if let Some(password) = &self.password {
                pg_config.password(password.as_str());
            }
        }
        // `Prefer` is the driver default, so only then does the flag get a say.
        if pg_config.get_ssl_mode() == SslMode::Prefer {
            match self.ssl {
                Some(true) => {
                    pg_config.ssl_mode(SslMode::Require);
                }
                Some(false) => {
                    pg_config.ssl_mode(SslMode::Disable);
                }
                None => {}
            }
        }
        if pg_config.get_connect_timeout().is_none() {
            if let Some(timeout) = self.connection_timeout() {
                pg_config.connect_timeout(timeout);
            }
        }
        if let Some(schema) = &self.schema {
            let search_path = format!("-c search_path={schema}");
            let options = match pg_config.get_options() {
                Some(existing) if !existing.is_empty() => format!("{existing} {search_path}"),
                _ => search_path,
            };
            pg_config.options(options.as_str());
        }

        if pg_config.get_hosts().is_empty() {
            return Err(SqlRepositoryError::connection("host is required"));
        }
        if pg_config.get_user().is_none() {
            return Err(SqlRepositoryError::connection("user is required"));
        }
        if self.pool_size == Some(0) {
            return Err(SqlRepositoryError::connection(
                "pool_size must be at least 1",
            ));
        }

        Ok(pg_config)
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
