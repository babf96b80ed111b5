//! The query client and its entry points.

use crate::dispatch::{self, Fetch};
use crate::error::{WeaveError, WeaveResult};
use crate::executor::{Capability, QueryExecutor, Row};
use crate::params::ParamsSource;
use crate::placeholder::LowerOptions;
use crate::stream::{Execution, QueryStream};
use crate::template::{SqlHelper, SqlSource};
use crate::validate::Validator;
use std::fmt;
use std::sync::Arc;

/// Client-wide settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Replace object/array parameter values with their JSON text before
    /// they reach the executor.
    pub stringify_object_params: bool,
    /// Double-quote the table name of `TableColumns` shorthands.
    pub quote_identifiers: bool,
    /// Truncate logged SQL (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stringify_object_params: false,
            quote_identifiers: false,
            max_sql_length: Some(200),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stringify_object_params(mut self, enabled: bool) -> Self {
        self.stringify_object_params = enabled;
        self
    }

    pub fn quote_identifiers(mut self, enabled: bool) -> Self {
        self.quote_identifiers = enabled;
        self
    }

    /// Set maximum SQL length to log.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation in logs.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub fn lower_options(&self) -> LowerOptions {
        LowerOptions {
            quote_identifiers: self.quote_identifiers,
        }
    }
}

/// Per-call options.
#[derive(Default)]
pub struct QueryOptions {
    pub params: ParamsSource,
    pub params_schema: Option<Arc<dyn Validator>>,
    pub result_schema: Option<Arc<dyn Validator>>,
    /// Label attached to log events.
    pub tag: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(mut self, params: impl Into<ParamsSource>) -> Self {
        self.params = params.into();
        self
    }

    pub fn params_schema(mut self, validator: impl Validator + 'static) -> Self {
        self.params_schema = Some(Arc::new(validator));
        self
    }

    pub fn result_schema(mut self, validator: impl Validator + 'static) -> Self {
        self.result_schema = Some(Arc::new(validator));
        self
    }

    /// Share an already boxed result validator between calls.
    pub fn shared_result_schema(mut self, validator: Arc<dyn Validator>) -> Self {
        self.result_schema = Some(validator);
        self
    }

    pub fn shared_params_schema(mut self, validator: Arc<dyn Validator>) -> Self {
        self.params_schema = Some(validator);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

impl fmt::Debug for QueryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptions")
            .field("params", &self.params)
            .field("params_schema", &self.params_schema.is_some())
            .field("result_schema", &self.result_schema.is_some())
            .field("tag", &self.tag)
            .finish()
    }
}

/// Query client over a [`QueryExecutor`].
///
/// # Example
///
/// ```ignore
/// use sqlweave::{Client, QueryOptions, build, sql};
///
/// let client = Client::new(executor);
/// let user = client
///     .first_or_throw(
///         QueryOptions::new().params(params).result_schema(sqlweave::schema::<User>()),
///         build(|s| sql!(s => "SELECT {} FROM {} WHERE {} = :id", "@users.*", "@users", "@users.id")),
///     )
///     .await?
///     .into_single()?;
/// ```
pub struct Client<E> {
    executor: E,
    config: Config,
}

impl<E: QueryExecutor> Client<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            config: Config::default(),
        }
    }

    pub fn with_config(executor: E, config: Config) -> Self {
        Self { executor, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_inner(self) -> E {
        self.executor
    }

    /// Template helper using this client's lowering options.
    pub fn helper(&self) -> SqlHelper {
        SqlHelper::new(self.config.lower_options())
    }

    /// Zero or one record.
    pub async fn first(
        &self,
        options: QueryOptions,
        sql: impl Into<SqlSource>,
    ) -> WeaveResult<Execution<Option<Row>>> {
        self.fetch(options, sql.into()).await
    }

    /// Exactly one record; absence is [`WeaveError::NoResult`].
    pub async fn first_or_throw(
        &self,
        options: QueryOptions,
        sql: impl Into<SqlSource>,
    ) -> WeaveResult<Execution<Row>> {
        self.fetch(options, sql.into()).await
    }

    /// Every record.
    pub async fn all(
        &self,
        options: QueryOptions,
        sql: impl Into<SqlSource>,
    ) -> WeaveResult<Execution<Vec<Row>>> {
        self.fetch(options, sql.into()).await
    }

    /// Every record, pulled lazily.
    pub async fn iterate(
        &self,
        options: QueryOptions,
        sql: impl Into<SqlSource>,
    ) -> WeaveResult<QueryStream<Row>> {
        let sql = self.render(Capability::Iterate, sql.into())?;
        dispatch::execute_iterate(&self.executor, &sql, options, &self.config).await
    }

    async fn fetch<T: Fetch>(
        &self,
        options: QueryOptions,
        sql: SqlSource,
    ) -> WeaveResult<Execution<T>> {
        let sql = self.render(T::CAPABILITY, sql)?;
        dispatch::execute(&self.executor, &sql, options, &self.config).await
    }

    /// Check the capability, then build the SQL text.
    fn render(&self, capability: Capability, sql: SqlSource) -> WeaveResult<String> {
        if !self.executor.supports(capability) {
            return Err(WeaveError::configuration(format!(
                "no query executor capability available for `{capability}`"
            )));
        }
        Ok(sql.render(&self.helper()))
    }
}

impl<E> fmt::Debug for Client<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
