// Repository - typed CRUD over one table, routed through any StatementExecutor
//
// - transaction: with_transaction and the transaction-scoped repository

mod transaction;

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::SqlRepositoryError;
use crate::executor::StatementExecutor;
use crate::query_builder::{
    QueryDescriptor, build_count, build_delete, build_find_by_id, build_find_many, build_insert,
    build_update,
};
use crate::results::ResultSet;
use crate::session::SessionManager;
use crate::types::RowValues;

/// Identity column used unless [`Repository::with_id_column`] says otherwise.
pub const DEFAULT_ID_COLUMN: &str = "id";

/// Typed CRUD access to one table.
///
/// Rows decode into `T` by column name through `serde`, and write payloads are any
/// `Serialize` value whose fields name columns (a struct, a map, or `serde_json::json!`).
/// For partial updates, mark optional fields `#[serde(skip_serializing_if = "Option::is_none")]`
/// so omitted fields keep their stored values.
///
/// `X` is whatever runs the statements: the pooled [`SessionManager`] by default, or the
/// connection of an open transaction inside [`with_transaction`](Repository::with_transaction).
///
/// Table and column names are written into the SQL verbatim. Only values are bound as
/// parameters, so names must never come from untrusted input.
///
/// ```rust,no_run
/// use serde::{Deserialize, Serialize};
/// use sql_repository::prelude::*;
///
/// #[derive(Debug, Deserialize)]
/// struct User {
///     id: i32,
///     name: String,
/// }
///
/// #[derive(Serialize)]
/// struct NewUser<'a> {
///     name: &'a str,
/// }
///
/// # async fn demo(session: SessionManager) -> Result<(), SqlRepositoryError> {
/// let users: Repository<User> = Repository::new(session, "users");
/// let created = users.create(&NewUser { name: "User 1" }).await?;
/// let found = users.find_by_id(created.id).await?;
/// assert_eq!(found.map(|u| u.name), Some("User 1".to_string()));
/// # Ok(()) }
/// ```
pub struct Repository<T, X = SessionManager> {
    executor: X,
    table: String,
    id_column: String,
    _record: PhantomData<fn() -> T>,
}

impl<T, X: Clone> Clone for Repository<T, X> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            table: self.table.clone(),
            id_column: self.id_column.clone(),
            _record: PhantomData,
        }
    }
}

impl<T, X: fmt::Debug> fmt::Debug for Repository<T, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("table", &self.table)
            .field("id_column", &self.id_column)
            .field("executor", &self.executor)
            .finish()
    }
}

impl<T, X> Repository<T, X> {
    pub fn new(executor: X, table: impl Into<String>) -> Self {
        Self {
            executor,
            table: table.into(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            _record: PhantomData,
        }
    }

    /// Use `column` instead of `id` as the identity column.
    #[must_use]
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// The same table and identity column, routed through a different executor.
    pub fn with_executor<Y>(&self, executor: Y) -> Repository<T, Y> {
        Repository {
            executor,
            table: self.table.clone(),
            id_column: self.id_column.clone(),
            _record: PhantomData,
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    #[must_use]
    pub fn executor(&self) -> &X {
        &self.executor
    }
}

impl<T, X> Repository<T, X>
where
    T: DeserializeOwned,
    X: StatementExecutor,
{
    /// Look one record up by identity; `Ok(None)` when no row matches.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError` if the statement fails or the row does not decode into `T`.
    pub async fn find_by_id(
        &self,
        id: impl Into<RowValues>,
    ) -> Result<Option<T>, SqlRepositoryError> {
        let query = build_find_by_id(&self.table, &self.id_column, id.into());
        self.executor.execute_query(&query).await?.deserialize_first()
    }

    /// Every record matching the descriptor's filters, sorted and paged as it asks.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError::QueryError` for a malformed descriptor or a failed
    /// statement, and `SqlRepositoryError::ConnectionError` when nothing can run it.
    pub async fn find_many(
        &self,
        descriptor: &QueryDescriptor,
    ) -> Result<Vec<T>, SqlRepositoryError> {
        let query = build_find_many(&self.table, descriptor)?;
        self.executor.execute_query(&query).await?.deserialize_all()
    }

    /// Number of rows matching the descriptor's filters.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError` if the statement fails.
    pub async fn count(&self, descriptor: &QueryDescriptor) -> Result<i64, SqlRepositoryError> {
        let query = build_count(&self.table, descriptor);
        let result = self.executor.execute_query(&query).await?;
        result
            .results
            .first()
            .and_then(|row| row.get("count"))
            .and_then(RowValues::as_int)
            .copied()
            .ok_or_else(|| {
                SqlRepositoryError::query(format!("count of {} returned no value", self.table))
            })
    }

    /// Insert one row and return it as stored, server-generated columns included.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError::QueryError` when `data` is not a map of fields, the
    /// insert violates a constraint, or no row comes back.
    pub async fn create<D>(&self, data: &D) -> Result<T, SqlRepositoryError>
    where
        D: Serialize + ?Sized,
    {
        let fields = record_fields(data)?;
        let query = build_insert(&self.table, &fields);
        self.executor
            .execute_query(&query)
            .await?
            .deserialize_first()?
            .ok_or_else(|| {
                SqlRepositoryError::query(format!("insert into {} returned no row", self.table))
            })
    }

    /// Set only the fields present in `data` and return the updated record.
    ///
    /// Returns `Ok(None)` when no row has that identity.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError::QueryError` when `data` has no fields or the update fails.
    pub async fn update<D>(
        &self,
        id: impl Into<RowValues>,
        data: &D,
    ) -> Result<Option<T>, SqlRepositoryError>
    where
        D: Serialize + ?Sized,
    {
        let fields = record_fields(data)?;
        let query = build_update(&self.table, &self.id_column, id.into(), &fields)?;
        self.executor.execute_query(&query).await?.deserialize_first()
    }

    /// Delete by identity; `true` only if a row was actually removed.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError` if the statement fails.
    pub async fn delete(&self, id: impl Into<RowValues>) -> Result<bool, SqlRepositoryError> {
        let query = build_delete(&self.table, &self.id_column, id.into());
        Ok(!self.executor.execute_query(&query).await?.is_empty())
    }

    /// Run a hand-written statement and decode its rows into `R`.
    ///
    /// The statement is sent as given; keep every value in `params`.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError` if the statement fails or a row does not decode into `R`.
    pub async fn query<R: DeserializeOwned>(
        &self,
        statement: &str,
        params: &[RowValues],
    ) -> Result<Vec<R>, SqlRepositoryError> {
        self.query_rows(statement, params).await?.deserialize_all()
    }

    /// Like [`query`](Self::query) but returns the rows undecoded.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError` if the statement fails.
    pub async fn query_rows(
        &self,
        statement: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlRepositoryError> {
        self.executor.execute(statement, params).await
    }
}

/// Flatten a write payload into `(column, value)` pairs.
fn record_fields<D>(data: &D) -> Result<Vec<(String, RowValues)>, SqlRepositoryError>
where
    D: Serialize + ?Sized,
{
    let value = serde_json::to_value(data).map_err(|e| {
        SqlRepositoryError::query_with(format!("failed to serialize record: {e}"), e)
    })?;
    let map = match value {
        JsonValue::Object(map) => map,
        other => {
            return Err(SqlRepositoryError::query(format!(
                "record must serialize to a map of fields, got {other}"
            )));
        }
    };
    map.into_iter()
        .map(|(column, value)| Ok((column, RowValues::from_json(value)?)))
        .collect()
}
