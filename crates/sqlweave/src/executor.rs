//! Query executor contract.
//!
//! An executor turns SQL into reusable [`Statement`]s, one per capability.
//! The core prepares a statement once per entry-point call and then invokes
//! it once per parameter set, strictly one at a time.

use crate::error::{WeaveError, WeaveResult};
use crate::params::Params;
use async_trait::async_trait;
use futures_core::Stream;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A raw record as produced by an executor.
pub type Row = Value;

/// Shared handle to a prepared statement.
pub type BoxStatement<T> = Arc<dyn Statement<T>>;

/// The entry point a statement serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Zero or one record.
    First,
    /// Exactly one record, or [`WeaveError::NoResult`].
    FirstOrThrow,
    /// Every record, collected.
    All,
    /// Every record, pulled lazily.
    Iterate,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::First => "first",
            Capability::FirstOrThrow => "first_or_throw",
            Capability::All => "all",
            Capability::Iterate => "iterate",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prepared query, callable with a normalized parameter set.
#[async_trait]
pub trait Statement<T>: Send + Sync {
    async fn call(&self, params: Option<Params>) -> WeaveResult<T>;
}

/// Statement backed by an async closure.
pub struct FnStatement<F>(F);

/// Wrap an async closure as a statement.
pub fn statement_fn<T, F, Fut>(f: F) -> BoxStatement<T>
where
    T: Send + 'static,
    F: Fn(Option<Params>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WeaveResult<T>> + Send + 'static,
{
    Arc::new(FnStatement(f))
}

#[async_trait]
impl<T, F, Fut> Statement<T> for FnStatement<F>
where
    T: Send + 'static,
    F: Fn(Option<Params>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WeaveResult<T>> + Send + 'static,
{
    async fn call(&self, params: Option<Params>) -> WeaveResult<T> {
        (self.0)(params).await
    }
}

/// Statement backed by a synchronous closure.
pub struct SyncFnStatement<F>(F);

/// Wrap a synchronous closure as a statement.
pub fn sync_statement_fn<T, F>(f: F) -> BoxStatement<T>
where
    T: Send + 'static,
    F: Fn(Option<Params>) -> WeaveResult<T> + Send + Sync + 'static,
{
    Arc::new(SyncFnStatement(f))
}

#[async_trait]
impl<T, F> Statement<T> for SyncFnStatement<F>
where
    T: Send + 'static,
    F: Fn(Option<Params>) -> WeaveResult<T> + Send + Sync + 'static,
{
    async fn call(&self, params: Option<Params>) -> WeaveResult<T> {
        (self.0)(params)
    }
}

/// Rows produced by an iterate statement.
pub enum RowSource {
    /// Rows available synchronously.
    Iter(Box<dyn Iterator<Item = WeaveResult<Row>> + Send>),
    /// Rows arriving asynchronously.
    Stream(BoxStream<'static, WeaveResult<Row>>),
}

impl RowSource {
    pub fn empty() -> Self {
        RowSource::Iter(Box::new(std::iter::empty()))
    }

    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Row>,
        I::IntoIter: Send + 'static,
    {
        RowSource::Iter(Box::new(rows.into_iter().map(Ok)))
    }

    pub fn from_results<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = WeaveResult<Row>>,
        I::IntoIter: Send + 'static,
    {
        RowSource::Iter(Box::new(rows.into_iter()))
    }

    pub fn from_stream<S>(rows: S) -> Self
    where
        S: Stream<Item = WeaveResult<Row>> + Send + 'static,
    {
        RowSource::Stream(Box::pin(rows))
    }

    /// Pull the next row.
    pub async fn next_row(&mut self) -> Option<WeaveResult<Row>> {
        match self {
            RowSource::Iter(rows) => rows.next(),
            RowSource::Stream(rows) => rows.next().await,
        }
    }
}

impl fmt::Debug for RowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowSource::Iter(_) => f.write_str("RowSource::Iter(..)"),
            RowSource::Stream(_) => f.write_str("RowSource::Stream(..)"),
        }
    }
}

/// Wraps a first statement and turns an absent row into [`WeaveError::NoResult`].
struct RequireRow(BoxStatement<Option<Row>>);

#[async_trait]
impl Statement<Row> for RequireRow {
    async fn call(&self, params: Option<Params>) -> WeaveResult<Row> {
        self.0
            .call(params)
            .await?
            .ok_or_else(|| WeaveError::no_result("query returned no rows"))
    }
}

/// Build a first-or-throw statement from a first statement.
pub fn require_row(first: BoxStatement<Option<Row>>) -> BoxStatement<Row> {
    Arc::new(RequireRow(first))
}

/// A database (or anything else) able to run SQL with named parameters.
///
/// Named parameters appear in the SQL as `:name`; translating them to the
/// backend's own placeholder syntax is the executor's job.
///
/// `first`/`all` are required. `first_or_throw` defaults to the first
/// statement plus a no-result check. `iterate` is optional: an executor that
/// provides it must also report it from [`QueryExecutor::supports`].
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Whether this executor can serve `capability`.
    fn supports(&self, capability: Capability) -> bool {
        capability != Capability::Iterate
    }

    async fn prepare_first(&self, sql: &str) -> WeaveResult<BoxStatement<Option<Row>>>;

    async fn prepare_all(&self, sql: &str) -> WeaveResult<BoxStatement<Vec<Row>>>;

    async fn prepare_first_or_throw(&self, sql: &str) -> WeaveResult<BoxStatement<Row>> {
        Ok(require_row(self.prepare_first(sql).await?))
    }

    async fn prepare_iterate(&self, sql: &str) -> WeaveResult<BoxStatement<RowSource>> {
        let _ = sql;
        Err(WeaveError::configuration(
            "query executor does not provide the iterate capability",
        ))
    }
}

#[async_trait]
impl<E: QueryExecutor + ?Sized> QueryExecutor for Arc<E> {
    fn supports(&self, capability: Capability) -> bool {
        (**self).supports(capability)
    }

    async fn prepare_first(&self, sql: &str) -> WeaveResult<BoxStatement<Option<Row>>> {
        (**self).prepare_first(sql).await
    }

    async fn prepare_all(&self, sql: &str) -> WeaveResult<BoxStatement<Vec<Row>>> {
        (**self).prepare_all(sql).await
    }

    async fn prepare_first_or_throw(&self, sql: &str) -> WeaveResult<BoxStatement<Row>> {
        (**self).prepare_first_or_throw(sql).await
    }

    async fn prepare_iterate(&self, sql: &str) -> WeaveResult<BoxStatement<RowSource>> {
        (**self).prepare_iterate(sql).await
    }
}
