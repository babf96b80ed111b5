//! Error types for the Postgres executor

use sqlweave::WeaveError;
use thiserror::Error;

/// Result type alias for Postgres executor operations
pub type PgResult<T> = Result<T, PgError>;

/// Coarse classification of a driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PgErrorKind {
    UniqueConstraint,
    ForeignKeyConstraint,
    NotNullConstraint,
    CheckConstraint,
    PrimaryKeyConstraint,
    /// A JSON parameter could not be converted to the declared SQL type.
    Bind,
    /// A column value could not be represented as JSON.
    Decode,
    Connection,
    Generic,
}

impl PgErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PgErrorKind::UniqueConstraint => "UNIQUE_CONSTRAINT",
            PgErrorKind::ForeignKeyConstraint => "FOREIGNKEY_CONSTRAINT",
            PgErrorKind::NotNullConstraint => "NOTNULL_CONSTRAINT",
            PgErrorKind::CheckConstraint => "CHECK_CONSTRAINT",
            PgErrorKind::PrimaryKeyConstraint => "PRIMARYKEY_CONSTRAINT",
            PgErrorKind::Bind => "BIND",
            PgErrorKind::Decode => "DECODE",
            PgErrorKind::Connection => "CONNECTION",
            PgErrorKind::Generic => "GENERIC",
        }
    }

    pub fn is_constraint(self) -> bool {
        matches!(
            self,
            PgErrorKind::UniqueConstraint
                | PgErrorKind::ForeignKeyConstraint
                | PgErrorKind::NotNullConstraint
                | PgErrorKind::CheckConstraint
                | PgErrorKind::PrimaryKeyConstraint
        )
    }
}

/// Error raised by the Postgres executor.
///
/// Reaches callers wrapped in [`WeaveError::Executor`]; recover it with
/// `err.executor_error::<PgError>()`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PgError {
    kind: PgErrorKind,
    message: String,
    constraint: Option<String>,
    #[source]
    source: Option<tokio_postgres::Error>,
}

impl PgError {
    pub fn new(kind: PgErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            constraint: None,
            source: None,
        }
    }

    /// Create a bind error for a named parameter
    pub fn bind(param: &str, message: impl Into<String>) -> Self {
        Self::new(PgErrorKind::Bind, format!(":{param}: {}", message.into()))
    }

    /// Create a decode error for a specific column
    pub fn decode(column: &str, message: impl Into<String>) -> Self {
        Self::new(
            PgErrorKind::Decode,
            format!("column '{column}': {}", message.into()),
        )
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(PgErrorKind::Connection, message)
    }

    /// Classify a tokio_postgres error by SQLSTATE.
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        let Some(db_err) = err.as_db_error() else {
            let kind = if err.is_closed() {
                PgErrorKind::Connection
            } else {
                PgErrorKind::Generic
            };
            return Self {
                kind,
                message: err.to_string(),
                constraint: None,
                source: Some(err),
            };
        };

        let constraint = db_err.constraint().map(str::to_string);
        let kind = classify(db_err.code().code(), constraint.as_deref());
        let message = match &constraint {
            Some(c) => format!("{c}: {}", db_err.message()),
            None => db_err.message().to_string(),
        };
        Self {
            kind,
            message,
            constraint,
            source: Some(err),
        }
    }

    pub fn kind(&self) -> PgErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Name of the violated constraint, when the server reported one.
    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }

    /// The underlying driver error, if any.
    pub fn db_error(&self) -> Option<&tokio_postgres::Error> {
        self.source.as_ref()
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self.kind,
            PgErrorKind::UniqueConstraint | PgErrorKind::PrimaryKeyConstraint
        )
    }
}

/// Postgres reports primary key conflicts as plain unique violations; the
/// default `<table>_pkey` constraint name tells them apart.
pub(crate) fn classify(sqlstate: &str, constraint: Option<&str>) -> PgErrorKind {
    match sqlstate {
        "23505" if constraint.is_some_and(|c| c.ends_with("_pkey")) => {
            PgErrorKind::PrimaryKeyConstraint
        }
        "23505" => PgErrorKind::UniqueConstraint,
        "23503" => PgErrorKind::ForeignKeyConstraint,
        "23502" => PgErrorKind::NotNullConstraint,
        "23514" => PgErrorKind::CheckConstraint,
        code if code.starts_with("08") => PgErrorKind::Connection,
        _ => PgErrorKind::Generic,
    }
}

impl From<tokio_postgres::Error> for PgError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self::from_db_error(err)
    }
}

impl From<PgError> for WeaveError {
    fn from(err: PgError) -> Self {
        WeaveError::executor(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for PgError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::connection(err.to_string())
    }
}
