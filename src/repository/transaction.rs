use std::future::Future;

use crate::error::SqlRepositoryError;
use crate::session::{SessionManager, TransactionConnection};

use super::Repository;

impl<T> Repository<T, SessionManager> {
    /// Run `callback` in one database transaction.
    ///
    /// The callback receives a repository for the same table whose statements all run on the
    /// transaction's connection. Returning `Ok` commits; returning `Err` rolls back and hands
    /// the error back unchanged. The scoped repository stops working once the transaction
    /// resolves, so keeping a clone of it past the callback only yields `ConnectionError`s.
    ///
    /// ```rust,no_run
    /// # use serde::Deserialize;
    /// # use serde_json::json;
    /// # use sql_repository::prelude::*;
    /// # #[derive(Deserialize)] struct Account { id: i32, balance: i64 }
    /// # async fn demo(accounts: Repository<Account>) -> Result<(), SqlRepositoryError> {
    /// accounts
    ///     .with_transaction(|tx| async move {
    ///         tx.update(1, &json!({ "balance": 50 })).await?;
    ///         tx.update(2, &json!({ "balance": 150 })).await?;
    ///         Ok::<_, SqlRepositoryError>(())
    ///     })
    ///     .await
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns `SqlRepositoryError::ConnectionError` when no connection can be reserved, a
    /// `BEGIN`/`COMMIT` failure, or the callback's own error.
    pub async fn with_transaction<F, Fut, R, E>(&self, callback: F) -> Result<R, E>
    where
        F: FnOnce(Repository<T, TransactionConnection>) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<SqlRepositoryError>,
    {
        self.executor
            .run_in_transaction(|tx| callback(self.with_executor(tx)))
            .await
    }
}
