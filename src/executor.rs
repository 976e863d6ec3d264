use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SqlRepositoryError;
use crate::results::ResultSet;
use crate::types::{QueryAndParams, RowValues};

/// Anything that can run one parameterized statement and hand back its rows.
///
/// The session manager implements this by checking out a pooled connection per call; a
/// dedicated or transaction-scoped connection implements it by running every statement on
/// the one connection it holds. The repository is written against this trait only, so the
/// same CRUD code serves both.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Run `statement` with `params` bound to `$1, $2, ...` in order.
    async fn execute(
        &self,
        statement: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlRepositoryError>;

    /// Run a prebuilt statement.
    async fn execute_query(&self, query: &QueryAndParams) -> Result<ResultSet, SqlRepositoryError> {
        self.execute(&query.query, &query.params).await
    }
}

#[async_trait]
impl<X: StatementExecutor + ?Sized> StatementExecutor for &X {
    async fn execute(
        &self,
        statement: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlRepositoryError> {
        (**self).execute(statement, params).await
    }
}

#[async_trait]
impl<X: StatementExecutor + ?Sized> StatementExecutor for Arc<X> {
    async fn execute(
        &self,
        statement: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlRepositoryError> {
        (**self).execute(statement, params).await
    }
}
