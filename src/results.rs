use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::error::SqlRepositoryError;
use crate::types::RowValues;

/// A row from a database query result
///
/// Column names are shared across all rows of a result set.
#[derive(Debug, Clone)]
pub struct CustomDbRow {
    /// The column names for this row (shared across all rows in a result set)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub rows: Vec<RowValues>,
    column_index_cache: Arc<HashMap<String, usize>>,
}

impl CustomDbRow {
    /// Create a new database row, building its own column index.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, rows: Vec<RowValues>) -> Self {
        let cache = Arc::new(column_index(&column_names));
        Self {
            column_names,
            rows,
            column_index_cache: cache,
        }
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_index_cache.get(column_name).copied()
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.rows.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.rows.get(index)
    }

    /// Column name → JSON value view of this row.
    #[must_use]
    pub fn to_json_map(&self) -> Map<String, JsonValue> {
        self.column_names
            .iter()
            .zip(&self.rows)
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }

    /// Decode this row into a record, matching columns to fields by name.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError::QueryError` when the row shape does not fit `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, SqlRepositoryError> {
        serde_json::from_value(JsonValue::Object(self.to_json_map())).map_err(|e| {
            SqlRepositoryError::query_with(format!("failed to decode row into record: {e}"), e)
        })
    }
}

fn column_index(column_names: &[String]) -> HashMap<String, usize> {
    column_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}

/// A result set from a database query
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// The number of rows returned
    pub rows_affected: usize,
    column_names: Option<Arc<Vec<String>>>,
    column_index_cache: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index_cache = Some(Arc::new(column_index(&column_names)));
        self.column_names = Some(column_names);
    }

    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set; ignored until column names are set.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(column_names), Some(cache)) = (&self.column_names, &self.column_index_cache)
        {
            self.results.push(CustomDbRow {
                column_names: Arc::clone(column_names),
                rows: row_values,
                column_index_cache: Arc::clone(cache),
            });
            self.rows_affected += 1;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Decode every row into `T`.
    ///
    /// # Errors
    /// Returns the first row decoding error.
    pub fn deserialize_all<T: DeserializeOwned>(&self) -> Result<Vec<T>, SqlRepositoryError> {
        self.results.iter().map(CustomDbRow::deserialize::<T>).collect()
    }

    /// Decode the first row, if any.
    ///
    /// # Errors
    /// Returns the row decoding error.
    pub fn deserialize_first<T: DeserializeOwned>(
        &self,
    ) -> Result<Option<T>, SqlRepositoryError> {
        self.results.first().map(CustomDbRow::deserialize::<T>).transpose()
    }
}
