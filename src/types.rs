use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;

use crate::error::SqlRepositoryError;

/// Wire-level textual form used when a timestamp crosses into JSON.
pub(crate) const TIMESTAMP_JSON_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Values that can be stored in a database row or used as query parameters.
///
/// ```rust
/// use sql_repository::prelude::*;
///
/// let params: Vec<RowValues> = vec![1_i64.into(), "alice".into(), true.into()];
/// assert_eq!(params[1].as_text(), Some("alice"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value (timestamptz columns surface in UTC)
    Timestamp(NaiveDateTime),
    /// Calendar date
    Date(NaiveDate),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(value) => Some(*value),
            RowValues::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            RowValues::Date(value) => Some(*value),
            RowValues::Text(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Convert into the JSON shape used to decode rows into records.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            RowValues::Int(i) => JsonValue::from(*i),
            // NaN and infinities have no JSON form
            RowValues::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(JsonValue::Null, JsonValue::Number),
            RowValues::Text(s) => JsonValue::String(s.clone()),
            RowValues::Bool(b) => JsonValue::Bool(*b),
            RowValues::Timestamp(dt) => {
                JsonValue::String(dt.format(TIMESTAMP_JSON_FORMAT).to_string())
            }
            RowValues::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            RowValues::Null => JsonValue::Null,
            RowValues::JSON(value) => value.clone(),
            RowValues::Blob(bytes) => JsonValue::from(bytes.clone()),
        }
    }

    /// Convert a JSON field value from a serialized record into a bind parameter.
    ///
    /// # Errors
    /// Returns `SqlRepositoryError::QueryError` for numbers that fit neither `i64` nor `f64`.
    pub fn from_json(value: JsonValue) -> Result<Self, SqlRepositoryError> {
        Ok(match value {
            JsonValue::Null => RowValues::Null,
            JsonValue::Bool(b) => RowValues::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    RowValues::Int(i)
                } else if let Some(f) = n.as_f64() {
                    RowValues::Float(f)
                } else {
                    return Err(SqlRepositoryError::query(format!(
                        "numeric value {n} cannot be bound as a parameter"
                    )));
                }
            }
            JsonValue::String(s) => RowValues::Text(s),
            other @ (JsonValue::Array(_) | JsonValue::Object(_)) => RowValues::JSON(other),
        })
    }
}

pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

macro_rules! row_value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for RowValues {
            fn from(value: $t) -> Self {
                RowValues::Int(i64::from(value))
            }
        })*
    };
}

row_value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for RowValues {
    fn from(value: f32) -> Self {
        RowValues::Float(f64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl From<NaiveDate> for RowValues {
    fn from(value: NaiveDate) -> Self {
        RowValues::Date(value)
    }
}

impl From<JsonValue> for RowValues {
    fn from(value: JsonValue) -> Self {
        RowValues::JSON(value)
    }
}

impl From<Vec<u8>> for RowValues {
    fn from(value: Vec<u8>) -> Self {
        RowValues::Blob(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// A statement and its positional parameters bundled together.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAndParams {
    /// The SQL statement, with `$1, $2, ...` placeholders
    pub query: String,
    /// The parameters bound to the placeholders, in ordinal order
    pub params: Vec<RowValues>,
}

impl QueryAndParams {
    pub fn new(query: impl Into<String>, params: Vec<RowValues>) -> Self {
        Self {
            query: query.into(),
            params,
        }
    }

    pub fn new_without_params(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_fields_become_parameters() {
        assert_eq!(RowValues::from_json(json!(7)).unwrap(), RowValues::Int(7));
        assert_eq!(RowValues::from_json(json!(1.5)).unwrap(), RowValues::Float(1.5));
        assert_eq!(
            RowValues::from_json(json!("x")).unwrap(),
            RowValues::Text("x".into())
        );
        assert_eq!(RowValues::from_json(json!(null)).unwrap(), RowValues::Null);
        assert_eq!(
            RowValues::from_json(json!({"a": 1})).unwrap(),
            RowValues::JSON(json!({"a": 1}))
        );
    }

    #[test]
    fn timestamps_survive_json_text() {
        let ts = NaiveDateTime::parse_from_str("2021-08-06 16:00:00.250", "%Y-%m-%d %H:%M:%S%.f")
            .unwrap();
        let as_json = RowValues::Timestamp(ts).to_json();
        let text = as_json.as_str().unwrap();
        assert_eq!(text, "2021-08-06T16:00:00.250");
        assert_eq!(RowValues::Text(text.to_string()).as_timestamp(), Some(ts));
        let decoded: NaiveDateTime = serde_json::from_value(as_json).unwrap();
        assert_eq!(decoded, ts);
    }

    #[test]
    fn options_map_to_null() {
        let none: Option<i32> = None;
        assert!(RowValues::from(none).is_null());
        assert_eq!(RowValues::from(Some(3_i32)), RowValues::Int(3));
    }

    #[test]
    fn non_finite_floats_encode_as_null() {
        assert_eq!(RowValues::Float(f64::NAN).to_json(), JsonValue::Null);
    }
}
