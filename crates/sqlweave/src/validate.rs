//! Parameter and result validators.
//!
//! A [`Validator`] checks a JSON value and returns the value to use from
//! then on, which may differ from its input (defaults filled, fields
//! dropped, strings parsed). Failures are reported as a list of [`Issue`]s.

use crate::error::{Issue, WeaveError, WeaveResult};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;

/// Validation result: the transformed value or the problems found.
pub type ValidationOutcome = Result<Value, Vec<Issue>>;

#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, input: Value) -> ValidationOutcome;
}

/// Validator that round-trips the value through `T` with serde.
///
/// Deserialization errors become issues; the re-serialized `T` is the output,
/// so unknown fields are dropped and `#[serde(default)]` fills gaps.
pub struct Schema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Schema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Schema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Schema<{}>", std::any::type_name::<T>())
    }
}

/// Shorthand for [`Schema::new`].
pub fn schema<T>() -> Schema<T> {
    Schema::new()
}

#[async_trait]
impl<T> Validator for Schema<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    async fn validate(&self, input: Value) -> ValidationOutcome {
        let typed = T::deserialize(&input).map_err(|e| vec![issue_from_serde(&e)])?;
        serde_json::to_value(typed).map_err(|e| vec![Issue::new(e.to_string())])
    }
}

fn issue_from_serde(err: &serde_json::Error) -> Issue {
    Issue::new(err.to_string())
}

/// Validator backed by a synchronous closure.
pub struct FnValidator<F>(F);

pub fn validator_fn<F>(f: F) -> FnValidator<F>
where
    F: Fn(Value) -> ValidationOutcome + Send + Sync,
{
    FnValidator(f)
}

#[async_trait]
impl<F> Validator for FnValidator<F>
where
    F: Fn(Value) -> ValidationOutcome + Send + Sync,
{
    async fn validate(&self, input: Value) -> ValidationOutcome {
        (self.0)(input)
    }
}

pub(crate) async fn validate_params(validator: &dyn Validator, input: Value) -> WeaveResult<Value> {
    validator
        .validate(input)
        .await
        .map_err(WeaveError::param_validation)
}

/// Validate one raw record.
///
/// Without a validator the record passes through. On failure the raw record
/// is attached to the error.
pub async fn validate_result(validator: Option<&dyn Validator>, raw: Value) -> WeaveResult<Value> {
    let Some(validator) = validator else {
        return Ok(raw);
    };
    let original = raw.clone();
    validator
        .validate(raw)
        .await
        .map_err(|issues| WeaveError::result_validation(issues, original))
}

/// Serde helper for columns that arrive as JSON text.
///
/// Strings are parsed as JSON before deserializing into the field type;
/// anything else deserializes directly.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct User {
///     #[serde(deserialize_with = "sqlweave::json_text::deserialize")]
///     metadata: Metadata,
/// }
/// ```
pub mod json_text {
    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Value::deserialize(deserializer)? {
            Value::String(text) => serde_json::from_str(&text).map_err(D::Error::custom),
            other => serde_json::from_value(other).map_err(D::Error::custom),
        }
    }
}
