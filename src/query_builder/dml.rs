use crate::error::SqlRepositoryError;
use crate::types::{QueryAndParams, RowValues};

use super::Binder;

/// `INSERT ... RETURNING *` for the given columns, in order.
///
/// An empty column list inserts a row of defaults.
#[must_use]
pub fn build_insert(table: &str, fields: &[(String, RowValues)]) -> QueryAndParams {
    if fields.is_empty() {
        return QueryAndParams::new_without_params(format!(
            "INSERT INTO {table} DEFAULT VALUES RETURNING *"
        ));
    }
    let mut binder = Binder::default();
    let mut columns = Vec::with_capacity(fields.len());
    let mut placeholders = Vec::with_capacity(fields.len());
    for (column, value) in fields {
        columns.push(column.as_str());
        placeholders.push(binder.bind(value.clone()));
    }
    binder.finish(format!(
        "INSERT INTO {table} ({}) VALUES ({}) RETURNING *",
        columns.join(", "),
        placeholders.join(", ")
    ))
}

/// Partial `UPDATE ... RETURNING *`; the id is `$1` and the new values follow.
///
/// # Errors
/// Returns `SqlRepositoryError::QueryError` when there is nothing to set.
pub fn build_update(
    table: &str,
    id_column: &str,
    id: RowValues,
    fields: &[(String, RowValues)],
) -> Result<QueryAndParams, SqlRepositoryError> {
    if fields.is_empty() {
        return Err(SqlRepositoryError::query(format!(
            "update of {table} has no fields to set"
        )));
    }
    let mut binder = Binder::default();
    let id_placeholder = binder.bind(id);
    let assignments: Vec<String> = fields
        .iter()
        .map(|(column, value)| format!("{column} = {}", binder.bind(value.clone())))
        .collect();
    Ok(binder.finish(format!(
        "UPDATE {table} SET {} WHERE {id_column} = {id_placeholder} RETURNING *",
        assignments.join(", ")
    )))
}

/// `DELETE ... RETURNING {id_column}`, so a removed row shows up in the result.
#[must_use]
pub fn build_delete(table: &str, id_column: &str, id: RowValues) -> QueryAndParams {
    QueryAndParams::new(
        format!("DELETE FROM {table} WHERE {id_column} = $1 RETURNING {id_column}"),
        vec![id],
    )
}
