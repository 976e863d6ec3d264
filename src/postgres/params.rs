use std::error::Error;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes;
use uuid::Uuid;

use crate::types::{RowValues, parse_timestamp};

type BoxError = Box<dyn Error + Sync + Send>;

/// Container for Postgres parameters with lifetime tracking
pub struct Params<'a> {
    references: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> Params<'a> {
    /// Borrow a slice of `RowValues` as driver parameters.
    #[must_use]
    pub fn convert(params: &'a [RowValues]) -> Params<'a> {
        let references = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        Params { references }
    }

    /// Get a reference to the underlying parameter array
    #[must_use]
    pub fn as_refs(&self) -> &[&(dyn ToSql + Sync)] {
        &self.references
    }
}

// The server infers each placeholder's type from the statement; encode to that type
// rather than to the Rust value's natural width.
impl ToSql for RowValues {
    fn to_sql(&self, ty: &Type, out: &mut bytes::BytesMut) -> Result<IsNull, BoxError> {
        match self {
            RowValues::Int(i) => int_to_sql(*i, ty, out),
            RowValues::Float(f) => match *ty {
                Type::FLOAT4 => {
                    #[allow(clippy::cast_possible_truncation)]
                    let narrowed = *f as f32;
                    narrowed.to_sql(ty, out)
                }
                Type::NUMERIC => Decimal::try_from(*f)?.to_sql(ty, out),
                _ => (*f).to_sql(ty, out),
            },
            RowValues::Text(s) => text_to_sql(s, ty, out),
            RowValues::Bool(b) => (*b).to_sql(ty, out),
            RowValues::Timestamp(dt) => match *ty {
                Type::TIMESTAMPTZ => DateTime::<Utc>::from_naive_utc_and_offset(*dt, Utc)
                    .to_sql(ty, out),
                Type::DATE => dt.date().to_sql(ty, out),
                _ => dt.to_sql(ty, out),
            },
            RowValues::Date(d) => match *ty {
                Type::TIMESTAMP => d.and_time(chrono::NaiveTime::MIN).to_sql(ty, out),
                _ => d.to_sql(ty, out),
            },
            RowValues::Null => Ok(IsNull::Yes),
            RowValues::JSON(jsval) => jsval.to_sql(ty, out),
            RowValues::Blob(bytes) => bytes.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::UNKNOWN
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
                | Type::UUID
                | Type::NUMERIC
        )
    }

    to_sql_checked!();
}

fn int_to_sql(i: i64, ty: &Type, out: &mut bytes::BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(i)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(i)?.to_sql(ty, out),
        #[allow(clippy::cast_precision_loss)]
        Type::FLOAT8 => (i as f64).to_sql(ty, out),
        #[allow(clippy::cast_precision_loss)]
        Type::FLOAT4 => (i as f32).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            i.to_string().to_sql(ty, out)
        }
        Type::JSON | Type::JSONB => JsonValue::from(i).to_sql(ty, out),
        Type::NUMERIC => Decimal::from(i).to_sql(ty, out),
        _ => i.to_sql(ty, out),
    }
}

fn text_to_sql(s: &str, ty: &Type, out: &mut bytes::BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::TIMESTAMP => parse_timestamp(s)
            .ok_or_else(|| format!("invalid timestamp text: {s}"))?
            .to_sql(ty, out),
        Type::TIMESTAMPTZ => {
            let value = match DateTime::parse_from_rfc3339(s) {
                Ok(dt) => dt.with_timezone(&Utc),
                Err(_) => parse_timestamp(s)
                    .map(|naive: NaiveDateTime| naive.and_utc())
                    .ok_or_else(|| format!("invalid timestamp text: {s}"))?,
            };
            value.to_sql(ty, out)
        }
        Type::DATE => NaiveDate::parse_from_str(s, "%Y-%m-%d")?.to_sql(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 => {
            let parsed: i64 = s
                .trim()
                .parse()
                .map_err(|_| format!("invalid integer text: {s}"))?;
            int_to_sql(parsed, ty, out)
        }
        Type::UUID => Uuid::parse_str(s.trim())?.to_sql(ty, out),
        Type::NUMERIC => {
            let value = Decimal::from_str(s.trim())
                .or_else(|_| Decimal::from_scientific(s.trim()))?;
            value.to_sql(ty, out)
        }
        // Text bound to a json column is taken as a JSON string value.
        Type::JSON | Type::JSONB => JsonValue::String(s.to_string()).to_sql(ty, out),
        _ => s.to_sql(ty, out),
    }
}
