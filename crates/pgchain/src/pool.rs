//! Connection pool utilities

use crate::config::{DbConfig, Recycling};
use crate::error::{ChainError, ChainResult};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

/// Create a connection pool from a [`DbConfig`].
///
/// Uses `NoTls`. Connections are opened lazily, so this does not touch the network.
///
/// # Example
///
/// ```ignore
/// let pool = pgchain::create_pool(&DbConfig::from_env()?)?;
/// let client = pool.get().await?;
/// ```
pub fn create_pool(config: &DbConfig) -> ChainResult<Pool> {
    let pg_config: tokio_postgres::Config = config
        .database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| ChainError::Config(e.to_string()))?;

    let mgr = Manager::from_config(pg_config, NoTls, manager_config(config.recycling));
    Pool::builder(mgr)
        .max_size(config.max_connections)
        .build()
        .map_err(|e| ChainError::Pool(e.to_string()))
}

fn manager_config(recycling: Recycling) -> ManagerConfig {
    ManagerConfig {
        recycling_method: match recycling {
            Recycling::Fast => RecyclingMethod::Fast,
            Recycling::Verified => RecyclingMethod::Verified,
        },
    }
}
