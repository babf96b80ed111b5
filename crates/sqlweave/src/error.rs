//! Error types for sqlweave

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Boxed error produced by a query executor.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for sqlweave operations
pub type WeaveResult<T> = Result<T, WeaveError>;

/// A single validation problem reported by a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Human-readable description.
    pub message: String,
    /// Location of the problem inside the validated value (object keys / array indexes).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
}

impl Issue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
        }
    }

    /// Prefix the issue path with `segment`.
    pub fn at(mut self, segment: impl Into<String>) -> Self {
        self.path.insert(0, segment.into());
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path.join("."), self.message)
        }
    }
}

fn join_issues(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(Issue::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error types for query preparation and execution
#[derive(Debug, Error)]
pub enum WeaveError {
    /// The executor does not provide the capability an entry point needs,
    /// or the call itself is malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The parameter validator rejected the supplied parameters.
    #[error("Parameter validation failed: {}", join_issues(.issues))]
    ParamValidation { issues: Vec<Issue> },

    /// The result validator rejected a raw record.
    #[error("Result validation failed: {}", join_issues(.issues))]
    ResultValidation { issues: Vec<Issue>, raw: Value },

    /// A first-or-throw query matched no row.
    #[error("No result: {0}")]
    NoResult(String),

    /// Error raised by the query executor, passed through untouched.
    #[error("{0}")]
    Executor(#[source] BoxError),
}

impl WeaveError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a no-result error
    pub fn no_result(message: impl Into<String>) -> Self {
        Self::NoResult(message.into())
    }

    pub fn param_validation(issues: Vec<Issue>) -> Self {
        Self::ParamValidation { issues }
    }

    pub fn result_validation(issues: Vec<Issue>, raw: Value) -> Self {
        Self::ResultValidation { issues, raw }
    }

    /// Wrap an executor-specific error.
    pub fn executor(err: impl Into<BoxError>) -> Self {
        Self::Executor(err.into())
    }

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Check if this is a parameter validation error
    pub fn is_param_validation(&self) -> bool {
        matches!(self, Self::ParamValidation { .. })
    }

    /// Check if this is a result validation error
    pub fn is_result_validation(&self) -> bool {
        matches!(self, Self::ResultValidation { .. })
    }

    /// Check if this is a no-result error
    pub fn is_no_result(&self) -> bool {
        matches!(self, Self::NoResult(_))
    }

    /// Check if this error came from the executor
    pub fn is_executor(&self) -> bool {
        matches!(self, Self::Executor(_))
    }

    /// Validation issues, for either validation kind.
    pub fn issues(&self) -> Option<&[Issue]> {
        match self {
            Self::ParamValidation { issues } | Self::ResultValidation { issues, .. } => {
                Some(issues)
            }
            _ => None,
        }
    }

    /// The raw record a result validator rejected.
    pub fn raw_record(&self) -> Option<&Value> {
        match self {
            Self::ResultValidation { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// Downcast an executor error to its concrete type.
    pub fn executor_error<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Executor(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}
