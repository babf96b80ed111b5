//! Named parameters and their normalization.

use crate::error::{Issue, WeaveError, WeaveResult};
use crate::validate::{Validator, validate_params};
use futures_core::Stream;
use futures_core::stream::BoxStream;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// A named parameter set.
pub type Params = serde_json::Map<String, Value>;

/// The shape of parameters handed to an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    None,
    Single,
    Batch,
    Iter,
    Stream,
}

impl Shape {
    pub fn as_str(self) -> &'static str {
        match self {
            Shape::None => "none",
            Shape::Single => "single",
            Shape::Batch => "batch",
            Shape::Iter => "iter",
            Shape::Stream => "stream",
        }
    }

    /// Whether this shape yields a sequence of results.
    pub fn is_sequence(self) -> bool {
        matches!(self, Shape::Batch | Shape::Iter | Shape::Stream)
    }
}

/// Parameters for one entry-point call.
#[derive(Default)]
pub enum ParamsSource {
    #[default]
    None,
    Single(Params),
    /// Validated as a whole before anything runs, then executed element by
    /// element. One invalid element rejects the whole batch and nothing is
    /// executed.
    Batch(Vec<Params>),
    /// Pulled lazily; each element is validated when it is pulled.
    Iter(Box<dyn Iterator<Item = Params> + Send>),
    /// Async variant of `Iter`.
    Stream(BoxStream<'static, Params>),
}

impl ParamsSource {
    pub fn iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Params>,
        I::IntoIter: Send + 'static,
    {
        ParamsSource::Iter(Box::new(iter.into_iter()))
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Params> + Send + 'static,
    {
        ParamsSource::Stream(Box::pin(stream))
    }

    /// Serialize `value` into a single parameter set or a batch.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> WeaveResult<Self> {
        let value = serde_json::to_value(value)
            .map_err(|e| WeaveError::configuration(format!("cannot serialize params: {e}")))?;
        Self::try_from(value)
    }

    pub fn shape(&self) -> Shape {
        match self {
            ParamsSource::None => Shape::None,
            ParamsSource::Single(_) => Shape::Single,
            ParamsSource::Batch(_) => Shape::Batch,
            ParamsSource::Iter(_) => Shape::Iter,
            ParamsSource::Stream(_) => Shape::Stream,
        }
    }
}

impl fmt::Debug for ParamsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamsSource::None => f.write_str("None"),
            ParamsSource::Single(p) => f.debug_tuple("Single").field(p).finish(),
            ParamsSource::Batch(b) => f.debug_tuple("Batch").field(b).finish(),
            ParamsSource::Iter(_) => f.write_str("Iter(..)"),
            ParamsSource::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Params> for ParamsSource {
    fn from(params: Params) -> Self {
        ParamsSource::Single(params)
    }
}

impl From<Vec<Params>> for ParamsSource {
    fn from(batch: Vec<Params>) -> Self {
        ParamsSource::Batch(batch)
    }
}

impl From<Option<Params>> for ParamsSource {
    fn from(params: Option<Params>) -> Self {
        params.map_or(ParamsSource::None, ParamsSource::Single)
    }
}

impl TryFrom<Value> for ParamsSource {
    type Error = WeaveError;

    /// `null` is no params, an object is a single set, an array of objects is a batch.
    fn try_from(value: Value) -> WeaveResult<Self> {
        match value {
            Value::Null => Ok(ParamsSource::None),
            Value::Object(map) => Ok(ParamsSource::Single(map)),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(map) => Ok(map),
                    other => Err(WeaveError::configuration(format!(
                        "params[{i}] must be an object, got {}",
                        kind_of(&other)
                    ))),
                })
                .collect::<WeaveResult<Vec<_>>>()
                .map(ParamsSource::Batch),
            other => Err(WeaveError::configuration(format!(
                "params must be an object or an array of objects, got {}",
                kind_of(&other)
            ))),
        }
    }
}

/// A normalized parameter value: one set or a whole batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSet {
    Single(Params),
    Batch(Vec<Params>),
}

/// Validate (when a validator is given) and optionally stringify parameters.
///
/// The validator's output replaces the input. A batch is validated as one
/// array value.
pub async fn normalize(
    params: Option<ParamSet>,
    validator: Option<&dyn Validator>,
    stringify_objects: bool,
) -> WeaveResult<Option<ParamSet>> {
    match params {
        None => Ok(None),
        Some(ParamSet::Single(params)) => normalize_single(params, validator, stringify_objects)
            .await
            .map(|p| Some(ParamSet::Single(p))),
        Some(ParamSet::Batch(batch)) => normalize_batch(batch, validator, stringify_objects)
            .await
            .map(|b| Some(ParamSet::Batch(b))),
    }
}

pub(crate) async fn normalize_single(
    params: Params,
    validator: Option<&dyn Validator>,
    stringify_objects: bool,
) -> WeaveResult<Params> {
    let params = match validator {
        Some(validator) => match validate_params(validator, Value::Object(params)).await? {
            Value::Object(map) => map,
            other => {
                return Err(WeaveError::param_validation(vec![Issue::new(format!(
                    "expected an object, got {}",
                    kind_of(&other)
                ))]));
            }
        },
        None => params,
    };

    Ok(if stringify_objects {
        stringify_object_params(params)
    } else {
        params
    })
}

pub(crate) async fn normalize_batch(
    batch: Vec<Params>,
    validator: Option<&dyn Validator>,
    stringify_objects: bool,
) -> WeaveResult<Vec<Params>> {
    let batch = match validator {
        Some(validator) => {
            let input = Value::Array(batch.into_iter().map(Value::Object).collect());
            match validate_params(validator, input).await? {
                Value::Array(items) => expect_objects(items)?,
                other => {
                    return Err(WeaveError::param_validation(vec![Issue::new(format!(
                        "expected an array, got {}",
                        kind_of(&other)
                    ))]));
                }
            }
        }
        None => batch,
    };

    Ok(if stringify_objects {
        batch.into_iter().map(stringify_object_params).collect()
    } else {
        batch
    })
}

fn expect_objects(items: Vec<Value>) -> WeaveResult<Vec<Params>> {
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(map) => out.push(map),
            other => {
                return Err(WeaveError::param_validation(vec![
                    Issue::new(format!("expected an object, got {}", kind_of(&other)))
                        .at(i.to_string()),
                ]));
            }
        }
    }
    Ok(out)
}

/// Replace object and array fields with their JSON text.
///
/// `null` and scalar fields are left alone.
pub fn stringify_object_params(params: Params) -> Params {
    params
        .into_iter()
        .map(|(key, value)| match value {
            Value::Object(_) | Value::Array(_) => (key, Value::String(value.to_string())),
            other => (key, other),
        })
        .collect()
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
