//! # sqlweave-postgres
//!
//! A [`sqlweave::QueryExecutor`] for PostgreSQL built on `tokio-postgres`.
//!
//! - `:name` parameters are rewritten to positional `$N` markers
//! - JSON parameter values bind according to the server-inferred types
//! - rows decode to JSON objects
//! - driver failures map to a [`PgErrorKind`] constraint taxonomy
//!
//! ```ignore
//! use sqlweave::{Client, QueryOptions, sql};
//! use sqlweave_postgres::{PgExecutor, create_pool, executor_from_pool};
//!
//! let pool = create_pool(&std::env::var("DATABASE_URL")?)?;
//! let db = Client::new(executor_from_pool(&pool).await?);
//!
//! let mut rows = db
//!     .iterate(QueryOptions::new(), sql!("SELECT {} FROM {}", "@users.email", "@users"))
//!     .await?;
//! while let Some(row) = rows.try_next().await? {
//!     println!("{row}");
//! }
//! ```

pub mod bind;
pub mod connection;
pub mod decode;
pub mod error;
pub mod executor;
pub mod named;

#[cfg(feature = "pool")]
pub mod pool;

pub use bind::{bind_params, bind_value};
pub use connection::PgConnection;
pub use decode::row_to_json;
pub use error::{PgError, PgErrorKind, PgResult};
pub use executor::PgExecutor;
pub use named::NamedSql;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, create_pool_with_manager_config, executor_from_pool};

// Re-export tokio_postgres for convenience
pub use tokio_postgres;

#[cfg(feature = "pool")]
pub use deadpool_postgres;
