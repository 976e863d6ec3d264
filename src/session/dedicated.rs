use async_trait::async_trait;
use deadpool_postgres::Object;
use tokio::runtime::Handle;

use crate::error::SqlRepositoryError;
use crate::executor::StatementExecutor;
use crate::postgres::run_statement;
use crate::results::ResultSet;
use crate::types::RowValues;

/// One pooled connection reserved for a single caller.
///
/// Statements issued through it run in submission order on the same server session, so
/// they observe each other's uncommitted effects. The connection goes back to the pool
/// when this handle is dropped.
pub struct DedicatedConnection {
    client: Option<Object>,
    /// True while a transaction is open and must be rolled back if dropped.
    in_transaction: bool,
}

impl std::fmt::Debug for DedicatedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedicatedConnection")
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

impl DedicatedConnection {
    pub(crate) fn new(client: Object) -> Self {
        Self {
            client: Some(client),
            in_transaction: false,
        }
    }

    fn client(&self) -> Result<&Object, SqlRepositoryError> {
        self.client
            .as_ref()
            .ok_or_else(|| SqlRepositoryError::connection("dedicated connection already released"))
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Open a transaction on this connection.
    ///
    /// # Errors
    /// Returns an error if a transaction is already open or `BEGIN` fails.
    pub async fn begin(&mut self) -> Result<(), SqlRepositoryError> {
        if self.in_transaction {
            return Err(SqlRepositoryError::query(
                "a transaction is already open on this connection",
            ));
        }
        self.client()?.batch_execute("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    /// Commit the open transaction.
    ///
    /// # Errors
    /// Returns an error if `COMMIT` fails; the connection is then rolled back on drop.
    pub async fn commit(&mut self) -> Result<(), SqlRepositoryError> {
        self.finish_tx("COMMIT").await
    }

    /// Roll back the open transaction.
    ///
    /// # Errors
    /// Returns an error if `ROLLBACK` fails; another attempt is made on drop.
    pub async fn rollback(&mut self) -> Result<(), SqlRepositoryError> {
        self.finish_tx("ROLLBACK").await
    }

    async fn finish_tx(&mut self, sql: &str) -> Result<(), SqlRepositoryError> {
        if !self.in_transaction {
            return Err(SqlRepositoryError::query(format!(
                "{sql} issued with no open transaction"
            )));
        }
        self.client()?.batch_execute(sql).await?;
        self.in_transaction = false;
        Ok(())
    }
}

#[async_trait]
impl StatementExecutor for DedicatedConnection {
    async fn execute(
        &self,
        statement: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlRepositoryError> {
        tracing::debug!(
            statement,
            params = params.len(),
            in_transaction = self.in_transaction,
            "executing statement on dedicated connection"
        );
        run_statement(self.client()?, statement, params).await
    }
}

impl Drop for DedicatedConnection {
    fn drop(&mut self) {
        if !self.in_transaction {
            return;
        }
        let Some(client) = self.client.take() else {
            return;
        };
        // Never hand a connection back to the pool with a transaction still open.
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = client.batch_execute("ROLLBACK").await {
                        tracing::warn!(
                            error = %e,
                            "rollback of abandoned transaction failed; discarding connection"
                        );
                        let _ = Object::take(client);
                    }
                });
            }
            Err(_) => {
                let _ = Object::take(client);
            }
        }
    }
}
