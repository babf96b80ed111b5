//! JSON parameter binding.
//!
//! Each value is converted according to the type Postgres inferred for its
//! placeholder at prepare time. `null` binds SQL `NULL` of that type.

use crate::error::{PgError, PgResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlweave::Params;
use std::str::FromStr;
use tokio_postgres::types::{ToSql, Type};
use uuid::Uuid;

pub type BoxedParam = Box<dyn ToSql + Sync + Send>;

/// Bind `params` to the placeholders named in `names`, in order.
///
/// Every name must have a value; unreferenced keys are ignored.
pub fn bind_params(
    names: &[String],
    types: &[Type],
    params: Option<&Params>,
) -> PgResult<Vec<BoxedParam>> {
    names
        .iter()
        .zip(types)
        .map(|(name, ty)| {
            let value = params
                .and_then(|p| p.get(name))
                .ok_or_else(|| PgError::bind(name, "no value supplied"))?;
            bind_value(name, value, ty)
        })
        .collect()
}

/// Convert one JSON value to the declared SQL type.
pub fn bind_value(name: &str, value: &Value, ty: &Type) -> PgResult<BoxedParam> {
    let mismatch = || PgError::bind(name, format!("cannot bind {} as {ty}", kind_of(value)));

    let boxed: BoxedParam = match *ty {
        Type::BOOL => Box::new(nullable(value, |v| v.as_bool()).ok_or_else(mismatch)?),
        Type::INT2 => Box::new(
            nullable(value, |v| as_i64(v).and_then(|n| i16::try_from(n).ok()))
                .ok_or_else(mismatch)?,
        ),
        Type::INT4 => Box::new(
            nullable(value, |v| as_i64(v).and_then(|n| i32::try_from(n).ok()))
                .ok_or_else(mismatch)?,
        ),
        Type::INT8 => Box::new(nullable(value, as_i64).ok_or_else(mismatch)?),
        Type::FLOAT4 => Box::new(nullable(value, |v| as_f64(v).map(|n| n as f32)).ok_or_else(mismatch)?),
        Type::FLOAT8 => Box::new(nullable(value, as_f64).ok_or_else(mismatch)?),
        Type::NUMERIC => Box::new(nullable(value, as_decimal).ok_or_else(mismatch)?),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            Box::new(nullable(value, as_text).ok_or_else(mismatch)?)
        }
        Type::JSON | Type::JSONB => Box::new(as_json(value)),
        Type::UUID => Box::new(
            nullable(value, |v| v.as_str().and_then(|s| Uuid::parse_str(s).ok()))
                .ok_or_else(mismatch)?,
        ),
        Type::TIMESTAMPTZ => Box::new(nullable(value, as_timestamptz).ok_or_else(mismatch)?),
        Type::TIMESTAMP => Box::new(
            nullable(value, |v| as_timestamptz(v).map(|t| t.naive_utc()).or_else(|| as_naive(v)))
                .ok_or_else(mismatch)?,
        ),
        Type::DATE => Box::new(
            nullable(value, |v| {
                v.as_str()
                    .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            })
            .ok_or_else(mismatch)?,
        ),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => {
            Box::new(nullable(value, |v| array_of(v, as_text)).ok_or_else(mismatch)?)
        }
        Type::INT4_ARRAY => Box::new(
            nullable(value, |v| array_of(v, |e| as_i64(e).and_then(|n| i32::try_from(n).ok())))
                .ok_or_else(mismatch)?,
        ),
        Type::INT8_ARRAY => Box::new(nullable(value, |v| array_of(v, as_i64)).ok_or_else(mismatch)?),
        Type::UUID_ARRAY => Box::new(
            nullable(value, |v| {
                array_of(v, |e| e.as_str().and_then(|s| Uuid::parse_str(s).ok()))
            })
            .ok_or_else(mismatch)?,
        ),
        _ => {
            return Err(PgError::bind(
                name,
                format!("unsupported parameter type {ty}"),
            ));
        }
    };
    Ok(boxed)
}

/// `Some(None)` for JSON null, `Some(Some(v))` on success, `None` on mismatch.
fn nullable<T>(value: &Value, convert: impl FnOnce(&Value) -> Option<T>) -> Option<Option<T>> {
    match value {
        Value::Null => Some(None),
        v => convert(v).map(Some),
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(_) | Value::Array(_) => Some(value.to_string()),
        Value::Null => None,
    }
}

/// Strings holding JSON text (stringified object parameters) are parsed;
/// other strings bind as JSON strings.
fn as_json(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(match serde_json::from_str::<Value>(s) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => parsed,
            _ => value.clone(),
        }),
        v => Some(v.clone()),
    }
}

fn as_timestamptz(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

fn as_naive(value: &Value) -> Option<NaiveDateTime> {
    let s = value.as_str()?;
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

fn array_of<T>(value: &Value, convert: impl Fn(&Value) -> Option<T>) -> Option<Vec<Option<T>>> {
    value
        .as_array()?
        .iter()
        .map(|e| nullable(e, &convert))
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
