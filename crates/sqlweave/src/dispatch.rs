//! Execution dispatch.
//!
//! Chooses between single and sequence execution from the parameter shape:
//!
//! - none / single: normalize, prepare, call once, validate
//! - batch: normalize the whole batch up front, prepare once, then one call
//!   per element as the sequence is pulled
//! - iterator / stream: prepare once, then normalize and call each element
//!   as it is pulled
//!
//! Sequences never run ahead of the consumer and end after the first error.

use crate::client::{Config, QueryOptions};
use crate::error::{Issue, WeaveError, WeaveResult};
use crate::executor::{BoxStatement, Capability, QueryExecutor, Row, RowSource};
use crate::params::{Params, ParamsSource, normalize_batch, normalize_single};
use crate::stream::{Execution, QueryStream};
use crate::trace::{self, CallContext};
use crate::validate::{Validator, validate_result};
use futures_core::future::BoxFuture;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use futures_util::stream;
use serde_json::Value;
use std::sync::Arc;

/// Result types an entry point can produce.
///
/// Ties each output type to the executor capability that prepares it and to
/// the way its raw value is validated.
pub trait Fetch: Sized + Send + 'static {
    const CAPABILITY: Capability;

    fn prepare<'a, E>(executor: &'a E, sql: &'a str) -> BoxFuture<'a, WeaveResult<BoxStatement<Self>>>
    where
        E: QueryExecutor + ?Sized;

    /// Validate a raw value produced by the statement.
    fn check(self, validator: Option<Arc<dyn Validator>>) -> BoxFuture<'static, WeaveResult<Self>>;
}

impl Fetch for Option<Row> {
    const CAPABILITY: Capability = Capability::First;

    fn prepare<'a, E>(executor: &'a E, sql: &'a str) -> BoxFuture<'a, WeaveResult<BoxStatement<Self>>>
    where
        E: QueryExecutor + ?Sized,
    {
        executor.prepare_first(sql)
    }

    fn check(self, validator: Option<Arc<dyn Validator>>) -> BoxFuture<'static, WeaveResult<Self>> {
        Box::pin(async move {
            match self {
                // Absence is returned as-is.
                None => Ok(None),
                Some(raw) => validate_result(validator.as_deref(), raw).await.map(Some),
            }
        })
    }
}

impl Fetch for Row {
    const CAPABILITY: Capability = Capability::FirstOrThrow;

    fn prepare<'a, E>(executor: &'a E, sql: &'a str) -> BoxFuture<'a, WeaveResult<BoxStatement<Self>>>
    where
        E: QueryExecutor + ?Sized,
    {
        executor.prepare_first_or_throw(sql)
    }

    fn check(self, validator: Option<Arc<dyn Validator>>) -> BoxFuture<'static, WeaveResult<Self>> {
        Box::pin(async move {
            if self.is_null() {
                return Err(WeaveError::no_result("query returned no rows"));
            }
            validate_result(validator.as_deref(), self).await
        })
    }
}

impl Fetch for Vec<Row> {
    const CAPABILITY: Capability = Capability::All;

    fn prepare<'a, E>(executor: &'a E, sql: &'a str) -> BoxFuture<'a, WeaveResult<BoxStatement<Self>>>
    where
        E: QueryExecutor + ?Sized,
    {
        executor.prepare_all(sql)
    }

    fn check(self, validator: Option<Arc<dyn Validator>>) -> BoxFuture<'static, WeaveResult<Self>> {
        Box::pin(async move {
            let Some(validator) = validator else {
                return Ok(self);
            };
            let raw = Value::Array(self);
            match validate_result(Some(validator.as_ref()), raw.clone()).await? {
                Value::Array(rows) => Ok(rows),
                _ => Err(WeaveError::result_validation(
                    vec![Issue::new("result validator must return an array of records")],
                    raw,
                )),
            }
        })
    }
}

/// Settings shared by every element of one call.
struct Run {
    params_schema: Option<Arc<dyn Validator>>,
    result_schema: Option<Arc<dyn Validator>>,
    stringify: bool,
    ctx: CallContext,
}

impl Run {
    async fn normalize(&self, params: Params) -> WeaveResult<Params> {
        normalize_single(params, self.params_schema.as_deref(), self.stringify)
            .await
            .inspect_err(|e| trace::validation_failed(&self.ctx, "params", e))
    }

    async fn normalize_batch(&self, batch: Vec<Params>) -> WeaveResult<Vec<Params>> {
        normalize_batch(batch, self.params_schema.as_deref(), self.stringify)
            .await
            .inspect_err(|e| trace::validation_failed(&self.ctx, "params", e))
    }

    async fn check<T: Fetch>(&self, raw: T) -> WeaveResult<T> {
        raw.check(self.result_schema.clone()).await.inspect_err(|e| {
            if e.is_result_validation() {
                trace::validation_failed(&self.ctx, "result", e);
            }
        })
    }

    async fn check_row(&self, raw: Row) -> WeaveResult<Row> {
        validate_result(self.result_schema.as_deref(), raw)
            .await
            .inspect_err(|e| trace::validation_failed(&self.ctx, "result", e))
    }
}

/// Parameter sets still to be executed.
enum Feed {
    /// Already normalized.
    Ready(std::vec::IntoIter<Params>),
    /// A single, already normalized call.
    Once(Option<Option<Params>>),
    /// Normalized as pulled.
    Iter(Box<dyn Iterator<Item = Params> + Send>),
    /// Normalized as pulled.
    Stream(BoxStream<'static, Params>),
}

enum Pending {
    Ready(Option<Params>),
    Raw(Params),
}

impl Feed {
    async fn next(&mut self) -> Option<Pending> {
        match self {
            Feed::Ready(batch) => batch.next().map(|p| Pending::Ready(Some(p))),
            Feed::Once(slot) => slot.take().map(Pending::Ready),
            Feed::Iter(iter) => iter.next().map(Pending::Raw),
            Feed::Stream(stream) => stream.next().await.map(Pending::Raw),
        }
    }
}

impl Run {
    async fn resolve(&self, pending: Pending) -> WeaveResult<Option<Params>> {
        match pending {
            Pending::Ready(params) => Ok(params),
            Pending::Raw(params) => self.normalize(params).await.map(Some),
        }
    }
}

fn call_context(
    capability: Capability,
    sql: &str,
    params: &ParamsSource,
    tag: Option<String>,
    config: &Config,
) -> CallContext {
    CallContext::new(capability, params.shape(), tag, sql, config.max_sql_length)
}

/// Run `sql` through the executor capability matching `T`.
///
/// Returns a single result for absent or single parameters and a lazy
/// sequence for batches, iterators and streams.
pub async fn execute<T, E>(
    executor: &E,
    sql: &str,
    options: QueryOptions,
    config: &Config,
) -> WeaveResult<Execution<T>>
where
    T: Fetch,
    E: QueryExecutor + ?Sized,
{
    let QueryOptions {
        params,
        params_schema,
        result_schema,
        tag,
    } = options;

    let run = Arc::new(Run {
        ctx: call_context(T::CAPABILITY, sql, &params, tag, config),
        params_schema,
        result_schema,
        stringify: config.stringify_object_params,
    });

    let feed = match params {
        ParamsSource::None => return execute_single(executor, sql, &run, None).await,
        ParamsSource::Single(params) => {
            let params = run.normalize(params).await?;
            return execute_single(executor, sql, &run, Some(params)).await;
        }
        ParamsSource::Batch(batch) => Feed::Ready(run.normalize_batch(batch).await?.into_iter()),
        ParamsSource::Iter(iter) => Feed::Iter(iter),
        ParamsSource::Stream(stream) => Feed::Stream(stream),
    };

    let statement = T::prepare(executor, sql).await?;
    trace::statement_prepared(&run.ctx);
    Ok(Execution::Sequence(sequence(run, statement, feed)))
}

async fn execute_single<T, E>(
    executor: &E,
    sql: &str,
    run: &Run,
    params: Option<Params>,
) -> WeaveResult<Execution<T>>
where
    T: Fetch,
    E: QueryExecutor + ?Sized,
{
    let statement = T::prepare(executor, sql).await?;
    trace::statement_prepared(&run.ctx);
    let raw = statement.call(params).await?;
    let value = run.check(raw).await?;
    trace::element_done(&run.ctx, 0);
    Ok(Execution::Single(value))
}

struct SequenceState<T> {
    feed: Feed,
    statement: BoxStatement<T>,
    run: Arc<Run>,
    index: usize,
    done: bool,
}

/// One element: normalize if needed, call, validate.
async fn step<T: Fetch>(run: &Run, statement: &BoxStatement<T>, pending: Pending) -> WeaveResult<T> {
    let params = run.resolve(pending).await?;
    let raw = statement.call(params).await?;
    run.check(raw).await
}

fn sequence<T: Fetch>(run: Arc<Run>, statement: BoxStatement<T>, feed: Feed) -> QueryStream<T> {
    let state = SequenceState {
        feed,
        statement,
        run,
        index: 0,
        done: false,
    };

    QueryStream::new(stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        let pending = state.feed.next().await?;
        let result = step(&state.run, &state.statement, pending).await;
        match &result {
            Ok(_) => trace::element_done(&state.run.ctx, state.index),
            Err(e) => {
                trace::sequence_halted(&state.run.ctx, state.index, e);
                state.done = true;
            }
        }
        state.index += 1;
        Some((result, state))
    }))
}

/// Run `sql` through the executor's iterate capability.
///
/// Always returns a sequence. With several parameter sets the row sources of
/// each call are chained in order.
pub async fn execute_iterate<E>(
    executor: &E,
    sql: &str,
    options: QueryOptions,
    config: &Config,
) -> WeaveResult<QueryStream<Value>>
where
    E: QueryExecutor + ?Sized,
{
    let QueryOptions {
        params,
        params_schema,
        result_schema,
        tag,
    } = options;

    let run = Arc::new(Run {
        ctx: call_context(Capability::Iterate, sql, &params, tag, config),
        params_schema,
        result_schema,
        stringify: config.stringify_object_params,
    });

    let feed = match params {
        ParamsSource::None => Feed::Once(Some(None)),
        ParamsSource::Single(params) => Feed::Once(Some(Some(run.normalize(params).await?))),
        ParamsSource::Batch(batch) => Feed::Ready(run.normalize_batch(batch).await?.into_iter()),
        ParamsSource::Iter(iter) => Feed::Iter(iter),
        ParamsSource::Stream(stream) => Feed::Stream(stream),
    };

    let statement = executor.prepare_iterate(sql).await?;
    trace::statement_prepared(&run.ctx);

    let state = IterateState {
        feed,
        statement,
        current: None,
        run,
        index: 0,
        done: false,
    };

    Ok(QueryStream::new(stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        let result = state.next_row().await?;
        match &result {
            Ok(_) => trace::element_done(&state.run.ctx, state.index),
            Err(e) => {
                trace::sequence_halted(&state.run.ctx, state.index, e);
                state.done = true;
            }
        }
        state.index += 1;
        Some((result, state))
    })))
}

struct IterateState {
    feed: Feed,
    statement: BoxStatement<RowSource>,
    current: Option<RowSource>,
    run: Arc<Run>,
    index: usize,
    done: bool,
}

impl IterateState {
    async fn next_row(&mut self) -> Option<WeaveResult<Row>> {
        loop {
            if let Some(rows) = self.current.as_mut() {
                let next = rows.next_row().await;
                match next {
                    Some(Ok(row)) => return Some(self.run.check_row(row).await),
                    Some(Err(e)) => return Some(Err(e)),
                    None => self.current = None,
                }
            }

            let pending = self.feed.next().await?;
            let rows = match self.run.resolve(pending).await {
                Ok(params) => self.statement.call(params).await,
                Err(e) => Err(e),
            };
            match rows {
                Ok(rows) => self.current = Some(rows),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests;
