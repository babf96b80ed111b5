//! # sqlweave
//!
//! Typed SQL templating over pluggable query executors.
//!
//! ## Features
//!
//! - **Schema-aware placeholders**: `@table.column`, JSON paths
//!   (`@t.c ->a->>b`, `@t.c $.a.b`), aliases (`@t.c-`), result keys (`$key`),
//!   raw fragments (`§sql`) and named parameters (`:name`)
//! - **Validated boundaries**: parameters and result records pass through
//!   [`Validator`]s whose output replaces their input
//! - **One call, many shapes**: a single parameter set gives one result; a
//!   batch, iterator or stream gives a lazy, strictly sequential
//!   [`QueryStream`]
//! - **Executor agnostic**: anything implementing [`QueryExecutor`] can run the
//!   SQL (see `sqlweave-postgres`)
//!
//! ## Example
//!
//! ```ignore
//! use sqlweave::{Client, QueryOptions, build, schema, sql};
//!
//! let client = Client::new(executor);
//!
//! let users = client
//!     .all(
//!         QueryOptions::new().result_schema(schema::<Vec<User>>()),
//!         build(|s| sql!(s => "SELECT {} FROM {} ORDER BY {}", "@users.*", "@users", "@users.id")),
//!     )
//!     .await?
//!     .into_single()?;
//!
//! // One statement, executed once per element as the stream is pulled.
//! let mut inserted = client
//!     .first_or_throw(
//!         QueryOptions::new().params(batch),
//!         sql!("INSERT INTO {} VALUES (:id, :email) RETURNING *", User::columns_of(&[User::COL_ID, User::COL_EMAIL])),
//!     )
//!     .await?
//!     .into_stream();
//! while let Some(row) = inserted.try_next().await? {
//!     println!("{row}");
//! }
//! ```

pub mod client;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod params;
pub mod placeholder;
pub mod stream;
pub mod table;
pub mod template;
pub mod trace;
pub mod validate;

pub use client::{Client, Config, QueryOptions};
pub use dispatch::{Fetch, execute, execute_iterate};
pub use error::{BoxError, Issue, WeaveError, WeaveResult};
pub use executor::{
    BoxStatement, Capability, QueryExecutor, Row, RowSource, Statement, require_row,
    statement_fn, sync_statement_fn,
};
pub use params::{ParamSet, Params, ParamsSource, Shape, normalize, stringify_object_params};
pub use placeholder::{
    IntoPlaceholder, JsonPath, LowerOptions, Placeholder, TableColumns, TableRef, resolve,
};
pub use stream::{DecodeStream, Execution, QueryStream, decode_value};
pub use table::{Column, Table};
pub use template::{
    SqlHelper, SqlSource, Template, build, cond, cond_else, lower, lower_template, lower_with,
    raw,
};
pub use trace::QueryKind;
pub use validate::{
    FnValidator, Schema, ValidationOutcome, Validator, json_text, schema, validate_result,
    validator_fn,
};

// Re-export derive macros
#[cfg(feature = "derive")]
pub use sqlweave_derive::Table;

// Re-export for derive macros and executor implementations
pub use async_trait::async_trait;
pub use serde_json;

pub mod prelude;
