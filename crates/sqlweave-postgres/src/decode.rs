//! Row to JSON decoding.

use crate::error::{PgError, PgResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Type};
use uuid::Uuid;

/// Decode a row into a JSON object keyed by column name.
///
/// Numeric columns become strings so no precision is lost; temporal columns
/// use ISO 8601 text.
pub fn row_to_json(row: &Row) -> PgResult<Value> {
    let mut record = Map::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_value(row, idx, column.name(), column.type_())?;
        record.insert(column.name().to_string(), value);
    }
    Ok(Value::Object(record))
}

fn column_value(row: &Row, idx: usize, name: &str, ty: &Type) -> PgResult<Value> {
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx, name)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx, name)?.map(Value::from),
        Type::INT4 => get::<i32>(row, idx, name)?.map(Value::from),
        Type::INT8 => get::<i64>(row, idx, name)?.map(Value::from),
        Type::OID => get::<u32>(row, idx, name)?.map(Value::from),
        Type::FLOAT4 => get::<f32>(row, idx, name)?.map(|f| Value::from(f64::from(f))),
        Type::FLOAT8 => get::<f64>(row, idx, name)?.map(Value::from),
        Type::NUMERIC => get::<Decimal>(row, idx, name)?.map(|d| Value::String(d.to_string())),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            get::<String>(row, idx, name)?.map(Value::String)
        }
        Type::JSON | Type::JSONB => get::<Value>(row, idx, name)?,
        Type::UUID => get::<Uuid>(row, idx, name)?.map(|u| Value::String(u.to_string())),
        Type::TIMESTAMPTZ => {
            get::<DateTime<Utc>>(row, idx, name)?.map(|t| Value::String(t.to_rfc3339()))
        }
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx, name)?
            .map(|t| Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        Type::DATE => get::<NaiveDate>(row, idx, name)?
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        Type::TIME => get::<NaiveTime>(row, idx, name)?
            .map(|t| Value::String(t.format("%H:%M:%S%.f").to_string())),
        Type::BYTEA => get::<Vec<u8>>(row, idx, name)?
            .map(|bytes| Value::Array(bytes.into_iter().map(Value::from).collect())),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => array::<String>(row, idx, name, Value::String)?,
        Type::INT4_ARRAY => array::<i32>(row, idx, name, Value::from)?,
        Type::INT8_ARRAY => array::<i64>(row, idx, name, Value::from)?,
        Type::BOOL_ARRAY => array::<bool>(row, idx, name, Value::Bool)?,
        Type::UUID_ARRAY => array::<Uuid>(row, idx, name, |u| Value::String(u.to_string()))?,
        Type::JSONB_ARRAY | Type::JSON_ARRAY => array::<Value>(row, idx, name, |v| v)?,
        _ => {
            return Err(PgError::decode(
                name,
                format!("unsupported column type {ty}"),
            ));
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize, name: &str) -> PgResult<Option<T>> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| PgError::decode(name, e.to_string()))
}

fn array<'a, T: FromSql<'a>>(
    row: &'a Row,
    idx: usize,
    name: &str,
    convert: impl Fn(T) -> Value,
) -> PgResult<Option<Value>> {
    Ok(get::<Vec<Option<T>>>(row, idx, name)?.map(|items| {
        Value::Array(
            items
                .into_iter()
                .map(|item| item.map_or(Value::Null, &convert))
                .collect(),
        )
    }))
}
