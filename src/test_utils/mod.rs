//! Throwaway PostgreSQL servers for integration tests.
//!
//! Enabled with the `test-utils` feature. When `SQL_REPOSITORY_TEST_URL` is set, tests run
//! against that server instead of booting an embedded one.

use postgresql_embedded::PostgreSQL;

use crate::config::ConnectionConfig;
use crate::error::SqlRepositoryError;

/// Environment variable naming an existing server to test against.
pub const TEST_URL_ENV: &str = "SQL_REPOSITORY_TEST_URL";

/// A database the tests may freely create tables in.
pub struct TestDatabase {
    /// Settings that reach the database
    pub config: ConnectionConfig,
    /// The embedded server, if one was started
    server: Option<PostgreSQL>,
}

impl TestDatabase {
    /// Start an embedded server holding `database`, or use [`TEST_URL_ENV`] when it is set.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError::ConnectionError` if the embedded server cannot be set up,
    /// started, or given the database.
    pub async fn start(database: &str) -> Result<Self, SqlRepositoryError> {
        if let Some(config) = config_from_env() {
            tracing::info!("using external test database from {TEST_URL_ENV}");
            return Ok(Self {
                config,
                server: None,
            });
        }

        let mut postgresql = PostgreSQL::default();
        postgresql
            .setup()
            .await
            .map_err(|e| embedded_error("set up", &e))?;
        postgresql
            .start()
            .await
            .map_err(|e| embedded_error("start", &e))?;
        postgresql
            .create_database(database)
            .await
            .map_err(|e| embedded_error("create a database on", &e))?;

        let settings = postgresql.settings();
        let config = ConnectionConfig::new()
            .with_host(settings.host.clone())
            .with_port(settings.port)
            .with_username(settings.username.clone())
            .with_password(settings.password.clone())
            .with_database(database);
        tracing::info!(port = settings.port, database, "embedded PostgreSQL started");

        Ok(Self {
            config,
            server: Some(postgresql),
        })
    }

    /// Stop the embedded server, if this helper started one.
    pub async fn stop(self) {
        if let Some(server) = self.server {
            if let Err(e) = server.stop().await {
                tracing::warn!(error = %e, "failed to stop embedded PostgreSQL");
            }
        }
    }
}

/// Connection settings from [`TEST_URL_ENV`], if it is set and non-empty.
#[must_use]
pub fn config_from_env() -> Option<ConnectionConfig> {
    std::env::var(TEST_URL_ENV)
        .ok()
        .filter(|url| !url.trim().is_empty())
        .map(ConnectionConfig::from_connection_string)
}

fn embedded_error(action: &str, err: &postgresql_embedded::Error) -> SqlRepositoryError {
    SqlRepositoryError::connection(format!("failed to {action} embedded PostgreSQL: {err}"))
}
