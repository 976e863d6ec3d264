// Session manager - owns the pool and its lifecycle
//
// - dedicated: a single pooled connection reserved by one caller
// - transaction: BEGIN/COMMIT/ROLLBACK scoping over a dedicated connection
// - pool: pool construction and the idle reaper

mod dedicated;
mod pool;
mod transaction;

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio::task::JoinHandle;

use crate::config::ConnectionConfig;
use crate::error::SqlRepositoryError;
use crate::executor::StatementExecutor;
use crate::postgres::run_statement;
use crate::results::ResultSet;
use crate::types::RowValues;

pub use dedicated::DedicatedConnection;
pub use pool::PoolStatus;
pub use transaction::TransactionConnection;

/// Owns the connection pool and tracks whether the session is connected.
///
/// Cloning is cheap and every clone shares the same pool, so one manager can be handed to
/// any number of repositories and tasks. `connect`/`disconnect` themselves are not
/// serialized internally; callers that may race them must coordinate.
///
/// ```rust,no_run
/// use sql_repository::prelude::*;
///
/// # async fn demo() -> Result<(), SqlRepositoryError> {
/// let session = SessionManager::new();
/// session
///     .connect(&ConnectionConfig::from_connection_string("postgres://app:pw@localhost/app"))
///     .await?;
/// let rows = session.execute("SELECT 1 AS number", &[]).await?;
/// assert_eq!(rows.results[0].get("number"), Some(&RowValues::Int(1)));
/// session.disconnect().await;
/// # Ok(()) }
/// ```
#[derive(Clone, Default)]
pub struct SessionManager {
    state: Arc<RwLock<Option<ActivePool>>>,
}

struct ActivePool {
    pool: Pool,
    reaper: Option<JoinHandle<()>>,
}

// Runs on disconnect and when the last manager clone goes away without one.
impl Drop for ActivePool {
    fn drop(&mut self) {
        if let Some(reaper) = self.reaper.take() {
            reaper.abort();
        }
        self.pool.close();
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the pool and check it by checking out (and returning) one connection.
    ///
    /// The session only becomes connected once that checkout succeeds. Calling `connect` on an
    /// already connected session is a no-op; call [`disconnect`](Self::disconnect) first to
    /// reconnect with different settings.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError::ConnectionError` for invalid settings, unreachable hosts,
    /// or rejected credentials. The session stays disconnected.
    pub async fn connect(&self, config: &ConnectionConfig) -> Result<(), SqlRepositoryError> {
        if self.is_connected() {
            tracing::warn!("connect called on an already connected session; ignoring");
            return Ok(());
        }

        let pool = pool::build_pool(config)?;
        match pool.get().await {
            Ok(conn) => drop(conn),
            Err(e) => {
                pool.close();
                return Err(SqlRepositoryError::connection_with(
                    format!("Failed to connect to PostgreSQL: {e}"),
                    e,
                ));
            }
        }

        let reaper = config
            .idle_timeout()
            .map(|idle| pool::spawn_idle_reaper(pool.clone(), idle));

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let candidate = ActivePool { pool, reaper };
        if state.as_ref().is_some_and(|active| !active.pool.is_closed()) {
            // Another caller connected while we were probing; keep theirs.
            drop(state);
            drop(candidate);
            return Ok(());
        }
        *state = Some(candidate);
        tracing::info!(max_size = ?config.pool_size, "connected to PostgreSQL");
        Ok(())
    }

    /// Close the pool if there is one. Safe to call when already disconnected.
    #[allow(clippy::unused_async)]
    pub async fn disconnect(&self) {
        let active = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // dropping the pool handle aborts the reaper and closes the pool
        if active.is_some() {
            drop(active);
            tracing::info!("disconnected from PostgreSQL");
        }
    }

    /// True iff a pool exists and has not been closed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|active| !active.pool.is_closed())
    }

    /// Pool occupancy, or `None` while disconnected.
    #[must_use]
    pub fn status(&self) -> Option<PoolStatus> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|active| PoolStatus::of(&active.pool))
    }

    fn pool(&self) -> Result<Pool, SqlRepositoryError> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|active| !active.pool.is_closed())
            .map(|active| active.pool.clone())
            .ok_or_else(|| SqlRepositoryError::connection("Not connected to PostgreSQL"))
    }

    /// Run one parameterized statement on whichever pooled connection is free.
    ///
    /// Consecutive calls may land on different connections; use
    /// [`run_in_transaction`](Self::run_in_transaction) when statements must share one.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError::ConnectionError` when not connected or no connection can
    /// be acquired, and `SqlRepositoryError::QueryError` when the statement fails.
    pub async fn execute(
        &self,
        statement: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlRepositoryError> {
        let pool = self.pool()?;
        let client = pool.get().await?;
        tracing::debug!(statement, params = params.len(), "executing statement");
        run_statement(&client, statement, params).await
    }

    /// Run a parameterless, possibly multi-statement script (DDL, fixtures) on one pooled
    /// connection.
    ///
    /// # Errors
    /// Same classification as [`execute`](Self::execute).
    pub async fn execute_batch(&self, script: &str) -> Result<(), SqlRepositoryError> {
        let pool = self.pool()?;
        let client = pool.get().await?;
        tracing::debug!(script, "executing batch");
        client.batch_execute(script).await?;
        Ok(())
    }

    /// Reserve one pooled connection for the caller until the returned handle is dropped.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError::ConnectionError` when not connected or the pool cannot
    /// supply a connection.
    pub async fn acquire_dedicated_connection(
        &self,
    ) -> Result<DedicatedConnection, SqlRepositoryError> {
        let pool = self.pool()?;
        let client = pool.get().await?;
        Ok(DedicatedConnection::new(client))
    }
}

#[async_trait]
impl StatementExecutor for SessionManager {
    async fn execute(
        &self,
        statement: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlRepositoryError> {
        SessionManager::execute(self, statement, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_before_connect_is_a_connection_error() {
        let session = SessionManager::new();
        let err = session.execute("SELECT 1", &[]).await.unwrap_err();
        assert!(err.is_connection());
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn dedicated_connection_requires_connect() {
        let session = SessionManager::new();
        let err = session.acquire_dedicated_connection().await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn transaction_requires_connect_and_skips_callback() {
        let session = SessionManager::new();
        let mut ran = false;
        let result: Result<(), SqlRepositoryError> = session
            .run_in_transaction(|_tx| {
                ran = true;
                async { Ok(()) }
            })
            .await;
        assert!(result.unwrap_err().is_connection());
        assert!(!ran);
    }

    #[tokio::test]
    async fn disconnect_when_disconnected_is_a_no_op() {
        let session = SessionManager::new();
        session.disconnect().await;
        session.disconnect().await;
        assert!(!session.is_connected());
        assert!(session.status().is_none());
    }

    #[tokio::test]
    async fn invalid_config_leaves_session_disconnected() {
        let session = SessionManager::new();
        let err = session
            .connect(&ConnectionConfig::new().with_username("nobody"))
            .await
            .unwrap_err();
        assert!(err.is_connection());
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn dropping_the_last_handle_stops_reaper_and_pool() {
        let cfg = ConnectionConfig::new()
            .with_host("localhost")
            .with_username("postgres");
        let pool = pool::build_pool(&cfg).unwrap();
        let reaper = pool::spawn_idle_reaper(pool.clone(), std::time::Duration::from_millis(100));
        let watch = reaper.abort_handle();
        let session = SessionManager {
            state: Arc::new(RwLock::new(Some(ActivePool {
                pool: pool.clone(),
                reaper: Some(reaper),
            }))),
        };
        assert!(session.is_connected());

        let clone = session.clone();
        drop(session);
        assert!(!pool.is_closed());
        assert!(!watch.is_finished());

        drop(clone);
        assert!(pool.is_closed());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(watch.is_finished());
    }

    #[tokio::test]
    async fn unreachable_host_fails_fast() {
        let session = SessionManager::new();
        let cfg = ConnectionConfig::new()
            .with_host("127.0.0.1")
            .with_port(1)
            .with_username("nobody")
            .with_password("wrong")
            .with_database("nothing")
            .with_connection_timeout(std::time::Duration::from_millis(500));
        let err = session.connect(&cfg).await.unwrap_err();
        assert!(err.is_connection());
        assert!(!session.is_connected());
    }
}
