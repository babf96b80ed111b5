//! [`QueryExecutor`] over a Postgres connection.

use crate::bind::{BoxedParam, bind_params};
use crate::connection::PgConnection;
use crate::decode::row_to_json;
use crate::error::PgError;
use crate::named::NamedSql;
use futures_util::{StreamExt, TryStreamExt};
use sqlweave::{
    BoxStatement, Capability, Params, QueryExecutor, Row, RowSource, Statement, WeaveError,
    WeaveResult, async_trait,
};
use std::fmt;
use std::sync::Arc;
use tokio_postgres::RowStream;
use tokio_postgres::types::ToSql;

/// Runs sqlweave statements on a Postgres connection.
///
/// `:name` parameters are rewritten to `$N` and bound by the types the
/// server reports for each placeholder.
///
/// ```ignore
/// let (client, connection) = tokio_postgres::connect(&url, NoTls).await?;
/// tokio::spawn(connection);
///
/// let db = sqlweave::Client::new(PgExecutor::new(client));
/// let user = db
///     .first_or_throw(QueryOptions::new().params(params), "SELECT * FROM users WHERE id = :id")
///     .await?
///     .into_single()?;
/// ```
pub struct PgExecutor<C> {
    conn: Arc<C>,
}

impl<C: PgConnection> PgExecutor<C> {
    pub fn new(conn: C) -> Self {
        Self {
            conn: Arc::new(conn),
        }
    }

    pub fn from_shared(conn: Arc<C>) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    async fn prepare(&self, sql: &str) -> WeaveResult<PgStatement<C>> {
        let named = NamedSql::parse(sql);
        let statement = self
            .conn
            .prepare(named.sql())
            .await
            .map_err(PgError::from_db_error)?;
        if statement.params().len() != named.names().len() {
            return Err(WeaveError::configuration(format!(
                "statement declares {} parameters but {} names were found",
                statement.params().len(),
                named.names().len()
            )));
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(
            target: "sqlweave.postgres",
            params = ?named.names(),
            "prepared statement"
        );

        Ok(PgStatement {
            conn: self.conn.clone(),
            statement,
            names: named.names().to_vec(),
        })
    }
}

impl<C> Clone for PgExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

impl<C> fmt::Debug for PgExecutor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgExecutor").finish_non_exhaustive()
    }
}

/// A prepared statement bound to its connection.
struct PgStatement<C> {
    conn: Arc<C>,
    statement: tokio_postgres::Statement,
    names: Vec<String>,
}

impl<C: PgConnection> PgStatement<C> {
    fn bind(&self, params: Option<&Params>) -> WeaveResult<Vec<BoxedParam>> {
        Ok(bind_params(&self.names, self.statement.params(), params)?)
    }

    async fn rows(&self, params: Option<Params>) -> WeaveResult<Vec<tokio_postgres::Row>> {
        let bound = self.bind(params.as_ref())?;
        let rows = self
            .conn
            .query(&self.statement, &as_refs(&bound))
            .await
            .map_err(PgError::from_db_error)?;
        Ok(rows)
    }

    /// Rows as they arrive; dropping the stream discards the rest.
    async fn stream(&self, params: Option<Params>) -> WeaveResult<RowStream> {
        let bound = self.bind(params.as_ref())?;
        let stream = self
            .conn
            .query_raw(&self.statement, &as_refs(&bound))
            .await
            .map_err(PgError::from_db_error)?;
        Ok(stream)
    }
}

fn as_refs(bound: &[BoxedParam]) -> Vec<&(dyn ToSql + Sync)> {
    bound
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

struct First<C>(PgStatement<C>);
struct All<C>(PgStatement<C>);
struct Iterate<C>(PgStatement<C>);

#[async_trait]
impl<C: PgConnection> Statement<Option<Row>> for First<C> {
    async fn call(&self, params: Option<Params>) -> WeaveResult<Option<Row>> {
        let stream = self.0.stream(params).await?;
        futures_util::pin_mut!(stream);
        match stream.try_next().await.map_err(PgError::from_db_error)? {
            Some(row) => Ok(Some(row_to_json(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<C: PgConnection> Statement<Vec<Row>> for All<C> {
    async fn call(&self, params: Option<Params>) -> WeaveResult<Vec<Row>> {
        let rows = self.0.rows(params).await?;
        rows.iter()
            .map(|row| row_to_json(row).map_err(WeaveError::from))
            .collect()
    }
}

#[async_trait]
impl<C: PgConnection> Statement<RowSource> for Iterate<C> {
    async fn call(&self, params: Option<Params>) -> WeaveResult<RowSource> {
        let stream = self.0.stream(params).await?;
        Ok(RowSource::from_stream(stream.map(|row| -> WeaveResult<Row> {
            let row = row.map_err(PgError::from_db_error)?;
            Ok(row_to_json(&row)?)
        })))
    }
}

#[async_trait]
impl<C: PgConnection> QueryExecutor for PgExecutor<C> {
    fn supports(&self, _capability: Capability) -> bool {
        true
    }

    async fn prepare_first(&self, sql: &str) -> WeaveResult<BoxStatement<Option<Row>>> {
        Ok(Arc::new(First(self.prepare(sql).await?)))
    }

    async fn prepare_all(&self, sql: &str) -> WeaveResult<BoxStatement<Vec<Row>>> {
        Ok(Arc::new(All(self.prepare(sql).await?)))
    }

    async fn prepare_iterate(&self, sql: &str) -> WeaveResult<BoxStatement<RowSource>> {
        Ok(Arc::new(Iterate(self.prepare(sql).await?)))
    }
}
