use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::types::Type;
use tokio_postgres::{Client, Statement};
use uuid::Uuid;

use crate::error::SqlRepositoryError;
use crate::results::ResultSet;
use crate::types::RowValues;

use super::params::Params;

/// Prepare and run one parameterized statement on a client, collecting every returned row.
///
/// Statements that return no rows (plain DML, DDL) yield an empty result set.
///
/// # Errors
/// Returns `SqlRepositoryError::QueryError` if the server rejects the statement or a value
/// cannot be encoded/decoded, and `SqlRepositoryError::ConnectionError` if the client is
/// closed.
pub async fn run_statement(
    client: &Client,
    query: &str,
    params: &[RowValues],
) -> Result<ResultSet, SqlRepositoryError> {
    let stmt = client.prepare(query).await?;
    let converted = Params::convert(params);
    let rows = client.query(&stmt, converted.as_refs()).await?;
    build_result_set_from_statement(&stmt, &rows)
}

/// Build a result set using statement metadata for column names.
///
/// # Errors
/// Returns errors from row value extraction.
pub fn build_result_set_from_statement(
    stmt: &Statement,
    rows: &[tokio_postgres::Row],
) -> Result<ResultSet, SqlRepositoryError> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let column_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(rows.len());
    result_set.set_column_names(Arc::new(column_names));

    for row in rows {
        let mut row_values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            row_values.push(postgres_extract_value(row, idx)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// # Errors
/// Returns `SqlRepositoryError::QueryError` if the column cannot be decoded.
pub fn postgres_extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<RowValues, SqlRepositoryError> {
    let type_info = row.columns()[idx].type_().clone();

    let value = match type_info {
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)?
            .map_or(RowValues::Null, RowValues::Int),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Float(f64::from(v))),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)?
            .map_or(RowValues::Null, RowValues::Float),
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)?
            .map_or(RowValues::Null, RowValues::Bool),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map_or(RowValues::Null, RowValues::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Timestamp(v.naive_utc())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map_or(RowValues::Null, RowValues::Date),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<Value>>(idx)?
            .map_or(RowValues::Null, RowValues::JSON),
        Type::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(idx)?
            .map_or(RowValues::Null, RowValues::Blob),
        // both surface as text so no precision or formatting is lost
        Type::UUID => row
            .try_get::<_, Option<Uuid>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Text(v.to_string())),
        Type::NUMERIC => row
            .try_get::<_, Option<Decimal>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Text(v.to_string())),
        _ => {
            // text-like types decode as String; anything else has no mapping
            let val: Option<String> = row.try_get(idx).map_err(|e| {
                SqlRepositoryError::query_with(
                    format!(
                        "unsupported column type {} for column {}",
                        type_info.name(),
                        row.columns()[idx].name()
                    ),
                    e,
                )
            })?;
            val.map_or(RowValues::Null, RowValues::Text)
        }
    };
    Ok(value)
}
