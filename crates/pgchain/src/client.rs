//! Engine seam: the clients statements run against.

use std::future::Future;

use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

use crate::error::{ChainError, ChainResult};
use crate::row::{Record, decode_rows};
use crate::value::Value;

/// A trait that unifies database clients and transactions.
///
/// Builders and raw queries accept anything implementing it, so the same code runs on a
/// direct connection, inside a transaction, or through a pool.
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = ChainResult<Vec<Row>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl Future<Output = ChainResult<u64>> + Send;
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ChainResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(ChainError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ChainResult<u64> {
        tokio_postgres::Client::execute(self, sql, params)
            .await
            .map_err(ChainError::from_db_error)
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ChainResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, sql, params)
            .await
            .map_err(ChainError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ChainResult<u64> {
        tokio_postgres::Transaction::execute(self, sql, params)
            .await
            .map_err(ChainError::from_db_error)
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ChainResult<Vec<Row>> {
        // Delegate to the deref target (tokio_postgres::Client).
        let client: &tokio_postgres::Client = self;
        GenericClient::query(client, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ChainResult<u64> {
        let client: &tokio_postgres::Client = self;
        GenericClient::execute(client, sql, params).await
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ChainResult<Vec<Row>> {
        let tx: &tokio_postgres::Transaction<'_> = self;
        GenericClient::query(tx, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ChainResult<u64> {
        let tx: &tokio_postgres::Transaction<'_> = self;
        GenericClient::execute(tx, sql, params).await
    }
}

/// A pool runs each statement on one freshly checked-out connection.
#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Pool {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ChainResult<Vec<Row>> {
        let client = self.get().await?;
        GenericClient::query(&client, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ChainResult<u64> {
        let client = self.get().await?;
        GenericClient::execute(&client, sql, params).await
    }
}

impl<C: GenericClient> GenericClient for &C {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ChainResult<Vec<Row>> {
        (**self).query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> ChainResult<u64> {
        (**self).execute(sql, params).await
    }
}

/// What a compiled statement is executed against.
///
/// Implemented for every [`GenericClient`]; rows come back decoded into [`Record`]s.
/// Tests substitute an in-memory engine.
pub trait Engine: Send + Sync {
    /// Run a statement that returns rows.
    fn fetch(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = ChainResult<Vec<Record>>> + Send;

    /// Run a statement and return the number of affected rows.
    fn run(&self, sql: &str, params: &[Value]) -> impl Future<Output = ChainResult<u64>> + Send;
}

impl<C: GenericClient> Engine for C {
    async fn fetch(&self, sql: &str, params: &[Value]) -> ChainResult<Vec<Record>> {
        let refs = param_refs(params);
        let rows = GenericClient::query(self, sql, &refs).await?;
        decode_rows(&rows)
    }

    async fn run(&self, sql: &str, params: &[Value]) -> ChainResult<u64> {
        let refs = param_refs(params);
        GenericClient::execute(self, sql, &refs).await
    }
}

pub(crate) fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}
