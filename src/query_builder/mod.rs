//! Pure SQL builders behind every repository operation.
//!
//! Each builder produces a [`QueryAndParams`]: statement text with ordinal `$n` placeholders
//! and the one combined parameter list they refer to. Values are always bound, never
//! interpolated. Table and column names are emitted verbatim and must come from a trusted,
//! closed set of identifiers.

use std::fmt;
use std::str::FromStr;

use crate::error::SqlRepositoryError;
use crate::types::{QueryAndParams, RowValues};

mod dml;
mod select;

pub use dml::{build_delete, build_insert, build_update};
pub use select::{build_count, build_find_by_id, build_find_many};

/// Direction of one `ORDER BY` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for SortOrder {
    type Err = SqlRepositoryError;

    /// Accepts `asc`/`ascending` and `desc`/`descending`, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(SqlRepositoryError::query(format!(
                "invalid sort direction '{other}', expected asc or desc"
            ))),
        }
    }
}

/// Structured filter, sort and paging input for `find_many` / `count`.
///
/// Filters are equality-only and joined with `AND`. Sort terms are emitted in the order
/// they were added.
///
/// ```rust
/// use sql_repository::prelude::*;
///
/// let descriptor = QueryDescriptor::new()
///     .filter("active", true)
///     .order_by("name", SortOrder::Descending)
///     .limit(2)
///     .offset(1);
/// assert_eq!(descriptor.filters.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDescriptor {
    pub filters: Vec<(String, RowValues)>,
    pub order: Vec<(String, SortOrder)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl QueryDescriptor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `column = value`.
    #[must_use]
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, direction: SortOrder) -> Self {
        self.order.push((column.into(), direction));
        self
    }

    /// Like [`order_by`](Self::order_by) with the direction given as text.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError::QueryError` when `direction` is not a known sort direction.
    pub fn order_by_str(
        self,
        column: impl Into<String>,
        direction: &str,
    ) -> Result<Self, SqlRepositoryError> {
        Ok(self.order_by(column, direction.parse()?))
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Accumulates bound values and hands out their placeholders in order.
#[derive(Debug, Default)]
struct Binder {
    params: Vec<RowValues>,
}

impl Binder {
    fn bind(&mut self, value: RowValues) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    fn finish(self, query: String) -> QueryAndParams {
        QueryAndParams::new(query, self.params)
    }
}

/// Appends ` WHERE a = $1 AND b = $2` for the descriptor's filters, if any.
fn push_where(sql: &mut String, binder: &mut Binder, filters: &[(String, RowValues)]) {
    if filters.is_empty() {
        return;
    }
    let clauses: Vec<String> = filters
        .iter()
        .map(|(column, value)| format!("{column} = {}", binder.bind(value.clone())))
        .collect();
    sql.push_str(" WHERE ");
    sql.push_str(&clauses.join(" AND "));
}

fn paging_value(what: &str, value: u64) -> Result<RowValues, SqlRepositoryError> {
    i64::try_from(value)
        .map(RowValues::Int)
        .map_err(|_| SqlRepositoryError::query(format!("{what} {value} is out of range")))
}
