//! Connection abstraction over direct and pooled clients.

use std::future::Future;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Row, RowStream, Statement};

/// A connection able to prepare and run statements.
///
/// Implemented for `tokio_postgres::Client` and, with the `pool` feature, for
/// pooled `deadpool_postgres::Client` objects.
pub trait PgConnection: Send + Sync + 'static {
    /// Prepare `sql`, letting the server infer parameter types.
    fn prepare(
        &self,
        sql: &str,
    ) -> impl Future<Output = Result<Statement, tokio_postgres::Error>> + Send;

    fn query(
        &self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = Result<Vec<Row>, tokio_postgres::Error>> + Send;

    /// Run a statement and return its rows as they arrive.
    fn query_raw(
        &self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = Result<RowStream, tokio_postgres::Error>> + Send;
}

impl PgConnection for tokio_postgres::Client {
    async fn prepare(&self, sql: &str) -> Result<Statement, tokio_postgres::Error> {
        tokio_postgres::Client::prepare(self, sql).await
    }

    async fn query(
        &self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        tokio_postgres::Client::query(self, statement, params).await
    }

    async fn query_raw(
        &self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<RowStream, tokio_postgres::Error> {
        tokio_postgres::Client::query_raw(self, statement, params.iter().copied()).await
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl PgConnection for deadpool_postgres::Client {
    /// Uses the per-connection statement cache.
    async fn prepare(&self, sql: &str) -> Result<Statement, tokio_postgres::Error> {
        self.prepare_cached(sql).await
    }

    async fn query(
        &self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        // Delegate to the deref target (ClientWrapper / tokio_postgres::Client).
        PgConnection::query(&***self, statement, params).await
    }

    async fn query_raw(
        &self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<RowStream, tokio_postgres::Error> {
        PgConnection::query_raw(&***self, statement, params).await
    }
}
