use crate::error::SqlRepositoryError;
use crate::types::{QueryAndParams, RowValues};

use super::{Binder, QueryDescriptor, paging_value, push_where};

/// `SELECT * FROM {table} WHERE {id_column} = $1`
#[must_use]
pub fn build_find_by_id(table: &str, id_column: &str, id: RowValues) -> QueryAndParams {
    QueryAndParams::new(
        format!("SELECT * FROM {table} WHERE {id_column} = $1"),
        vec![id],
    )
}

/// One `SELECT` over the descriptor's filters, ordering and paging.
///
/// Placeholders are numbered across the whole statement, so with two filters the limit is
/// `$3` and the offset `$4`.
///
/// # Errors
/// Returns `SqlRepositoryError::QueryError` for a zero limit or paging values past `i64::MAX`.
pub fn build_find_many(
    table: &str,
    descriptor: &QueryDescriptor,
) -> Result<QueryAndParams, SqlRepositoryError> {
    let mut sql = format!("SELECT * FROM {table}");
    let mut binder = Binder::default();
    push_where(&mut sql, &mut binder, &descriptor.filters);

    if !descriptor.order.is_empty() {
        let terms: Vec<String> = descriptor
            .order
            .iter()
            .map(|(column, direction)| format!("{column} {direction}"))
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
    }

    if let Some(limit) = descriptor.limit {
        if limit == 0 {
            return Err(SqlRepositoryError::query("limit must be a positive integer"));
        }
        let placeholder = binder.bind(paging_value("limit", limit)?);
        sql.push_str(" LIMIT ");
        sql.push_str(&placeholder);
    }
    if let Some(offset) = descriptor.offset {
        let placeholder = binder.bind(paging_value("offset", offset)?);
        sql.push_str(" OFFSET ");
        sql.push_str(&placeholder);
    }

    Ok(binder.finish(sql))
}

/// `SELECT COUNT(*) AS count FROM {table}` over the descriptor's filters.
///
/// Ordering and paging do not change a count and are ignored.
#[must_use]
pub fn build_count(table: &str, descriptor: &QueryDescriptor) -> QueryAndParams {
    let mut sql = format!("SELECT COUNT(*) AS count FROM {table}");
    let mut binder = Binder::default();
    push_where(&mut sql, &mut binder, &descriptor.filters);
    binder.finish(sql)
}
