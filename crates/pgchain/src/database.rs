//! Entry point: one engine, fresh builders per call site.

use crate::builder::QueryBuilder;
use crate::client::Engine;
use crate::query::RawQuery;

/// A handle on the engine that hands out builders.
///
/// Cheap to share by reference; builders borrow it for the duration of one query.
///
/// # Example
///
/// ```ignore
/// use pgchain::{Database, DbConfig};
///
/// let db = Database::connect(&DbConfig::from_env()?)?;
/// let resp = db.from("admin_users").eq("email", email).single().await;
/// ```
#[derive(Debug, Clone)]
pub struct Database<E> {
    engine: E,
}

impl<E: Engine> Database<E> {
    /// Wrap any engine: a `tokio_postgres::Client`, a transaction, a pool, or a reference to one.
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Start a query on `table`.
    pub fn from(&self, table: &str) -> QueryBuilder<'_, E> {
        QueryBuilder::new(&self.engine, table)
    }

    /// Start a raw parameterized statement on the same engine.
    pub fn raw(&self, sql: impl Into<String>) -> RawQuery<'_, E> {
        RawQuery::new(&self.engine, sql)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_inner(self) -> E {
        self.engine
    }
}

#[cfg(feature = "pool")]
impl Database<deadpool_postgres::Pool> {
    /// Build a pooled database from configuration. Connections open on first use.
    pub fn connect(config: &crate::DbConfig) -> crate::ChainResult<Self> {
        Ok(Self::new(crate::pool::create_pool(config)?))
    }
}
