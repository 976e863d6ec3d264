use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::SqlRepositoryError;
use crate::executor::StatementExecutor;
use crate::results::ResultSet;
use crate::types::RowValues;

use super::{DedicatedConnection, SessionManager};

/// Executor handed to a transaction callback.
///
/// Every statement runs on the transaction's dedicated connection, one at a time. Clones
/// share the same scope; once the transaction commits or rolls back the scope is closed and
/// any further use fails with `SqlRepositoryError::ConnectionError`.
#[derive(Clone)]
pub struct TransactionConnection {
    scope: Arc<Mutex<Option<DedicatedConnection>>>,
}

impl std::fmt::Debug for TransactionConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionConnection").finish_non_exhaustive()
    }
}

impl TransactionConnection {
    fn new(conn: DedicatedConnection) -> Self {
        Self {
            scope: Arc::new(Mutex::new(Some(conn))),
        }
    }

    /// Whether the owning transaction is still open.
    pub async fn is_active(&self) -> bool {
        self.scope.lock().await.is_some()
    }

    /// Take the connection back, invalidating every clone of this handle.
    async fn close(&self) -> Result<DedicatedConnection, SqlRepositoryError> {
        self.scope.lock().await.take().ok_or_else(closed_scope)
    }
}

fn closed_scope() -> SqlRepositoryError {
    SqlRepositoryError::connection("transaction scope has already been closed")
}

#[async_trait]
impl StatementExecutor for TransactionConnection {
    async fn execute(
        &self,
        statement: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlRepositoryError> {
        let guard = self.scope.lock().await;
        let conn = guard.as_ref().ok_or_else(closed_scope)?;
        conn.execute(statement, params).await
    }
}

impl SessionManager {
    /// Run `callback` inside `BEGIN` / `COMMIT` on one dedicated connection.
    ///
    /// The transaction commits when the callback returns `Ok` and rolls back when it returns
    /// `Err`. The callback's error is always the one returned; a rollback that fails after it
    /// is logged rather than replacing it. The connection returns to the pool on every path,
    /// including cancellation (an abandoned transaction is rolled back in the background).
    ///
    /// # Errors
    /// Returns `SqlRepositoryError::ConnectionError` if no connection can be acquired,
    /// `SqlRepositoryError::QueryError` if `BEGIN`/`COMMIT` fail, or the callback's own error.
    pub async fn run_in_transaction<F, Fut, R, E>(&self, callback: F) -> Result<R, E>
    where
        F: FnOnce(TransactionConnection) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<SqlRepositoryError>,
    {
        let mut conn = self.acquire_dedicated_connection().await?;
        conn.begin().await?;
        tracing::debug!("transaction started");

        let scope = TransactionConnection::new(conn);
        let outcome = callback(scope.clone()).await;
        let mut conn = scope.close().await?;

        match outcome {
            Ok(value) => {
                conn.commit().await?;
                tracing::debug!("transaction committed");
                Ok(value)
            }
            Err(err) => {
                match conn.rollback().await {
                    Ok(()) => tracing::debug!("transaction rolled back"),
                    Err(rollback_err) => tracing::error!(
                        error = %rollback_err,
                        "rollback failed after transaction callback error"
                    ),
                }
                Err(err)
            }
        }
    }
}
