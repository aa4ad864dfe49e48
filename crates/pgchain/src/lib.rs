//! # pgchain
//!
//! A chainable, declarative query layer for PostgreSQL.
//!
//! ## Features
//!
//! - **Lazy**: a chain is inert until executed or awaited, then compiles to exactly one statement
//! - **Parameterized**: values are always bound (`$1`, `$2`, ...), never spliced into SQL text
//! - **Uniform results**: every query resolves to `{ data, error, count }`, never a raised failure
//! - **Client-agnostic**: runs on a `tokio_postgres::Client`, a transaction, or a deadpool pool
//! - **Raw escape hatch**: hand-written SQL on the same engine for DDL, joins and seeds
//!
//! ## Example
//!
//! ```ignore
//! use pgchain::{Database, DbConfig, Direction, SelectOptions, payload};
//!
//! let db = Database::connect(&DbConfig::from_env()?)?;
//!
//! // SELECT
//! let latest = db
//!     .from("projects")
//!     .select("*")
//!     .eq("visibility", "public")
//!     .order("created_at", Direction::Desc)
//!     .limit(6)
//!     .await;
//!
//! // Exact count only
//! let unread = db
//!     .from("contact_messages")
//!     .select_with("*", SelectOptions::count_only())
//!     .eq("read", false)
//!     .await
//!     .count;
//!
//! // INSERT
//! db.from("projects")
//!     .insert(payload! { "title" => "X", "slug" => "x" })
//!     .await;
//!
//! // UPDATE
//! db.from("access_requests")
//!     .update(payload! { "status" => "approved" })
//!     .eq("id", request_id)
//!     .await;
//!
//! // DELETE
//! db.from("certifications").delete().eq("id", cert_id).await;
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod payload;
pub mod query;
pub mod response;
pub mod row;
pub mod statement;
pub mod value;

mod trace;

#[cfg(feature = "pool")]
pub mod pool;

pub use builder::{Direction, QueryBuilder, SelectOptions};
pub use client::{Engine, GenericClient};
pub use config::{DbConfig, Recycling};
pub use database::Database;
pub use error::{ChainError, ChainResult};
pub use payload::{IntoRows, Payload};
pub use query::RawQuery;
pub use response::{Data, ErrorKind, NO_ROWS_MESSAGE, Response, ResponseError};
pub use row::{JsonCell, Record, RowExt};
pub use statement::{Statement, StatementKind, quote_ident};
pub use value::Value;

#[cfg(feature = "pool")]
pub use pool::create_pool;

// Re-exported so callers can name engine types without a direct dependency.
pub use tokio_postgres;

#[cfg(feature = "pool")]
pub use deadpool_postgres;
