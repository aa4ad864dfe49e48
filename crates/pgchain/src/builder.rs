//! Chainable query builder with deferred execution.
//!
//! A [`QueryBuilder`] only accumulates state. Nothing reaches the engine until the builder is
//! consumed by [`QueryBuilder::execute`] or `.await`, which compiles exactly one statement,
//! runs it once and normalizes the outcome into a [`Response`].
//!
//! # Example
//! ```ignore
//! use pgchain::{Database, Direction};
//!
//! let resp = db
//!     .from("projects")
//!     .select("id, title, created_at")
//!     .eq("visibility", "public")
//!     .order("created_at", Direction::Desc)
//!     .limit(6)
//!     .await;
//!
//! if let Some(err) = &resp.error {
//!     eprintln!("query failed: {}", err.message);
//! }
//! ```

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::time::Instant;

use serde_json::Value as Json;

use crate::client::Engine;
use crate::error::{ChainError, ChainResult};
use crate::payload::{IntoRows, Payload};
use crate::response::{Data, Response, ResponseError};
use crate::row::Record;
use crate::statement::{self, Mutation, Projection, QueryPlan, Statement, StatementKind};
use crate::trace;
use crate::value::Value;

/// Sort direction for [`QueryBuilder::order`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending { Self::Asc } else { Self::Desc }
    }

    pub fn is_ascending(self) -> bool {
        self == Self::Asc
    }
}

/// Options for [`QueryBuilder::select_with`].
///
/// `exact_count` together with `head` requests only the exact number of matching rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectOptions {
    pub exact_count: bool,
    pub head: bool,
}

impl SelectOptions {
    /// Exact count, no rows.
    pub fn count_only() -> Self {
        Self {
            exact_count: true,
            head: true,
        }
    }

    pub fn exact_count(mut self) -> Self {
        self.exact_count = true;
        self
    }

    pub fn head(mut self) -> Self {
        self.head = true;
        self
    }
}

type ErrorHandler<'a> = Box<dyn FnOnce(&ChainError) + Send + 'a>;

/// One logical query against one table. Consumed by execution.
#[must_use = "a query builder does nothing until it is executed or awaited"]
pub struct QueryBuilder<'a, E: Engine> {
    engine: &'a E,
    plan: QueryPlan,
    on_error: Option<ErrorHandler<'a>>,
}

impl<'a, E: Engine> QueryBuilder<'a, E> {
    /// Create a builder for `table`. The table name is trusted and written verbatim.
    pub fn new(engine: &'a E, table: &str) -> Self {
        Self {
            engine,
            plan: QueryPlan::new(table),
            on_error: None,
        }
    }

    /// Target table.
    pub fn table(&self) -> &str {
        &self.plan.table
    }

    // ==================== Configuration ====================

    /// Set the projection from a comma-separated column list (`*` for every column).
    pub fn select(mut self, columns: &str) -> Self {
        self.plan.projection = Projection::parse(columns);
        self
    }

    /// Set the projection and count options.
    pub fn select_with(mut self, columns: &str, options: SelectOptions) -> Self {
        self.plan.projection = Projection::parse(columns);
        self.plan.exact_count = options.exact_count;
        self.plan.head = options.head;
        self
    }

    /// Add `column = value`. Conditions accumulate and are ANDed in call order.
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.plan.conditions.push((column.to_string(), value.into()));
        self
    }

    /// Order by one column. The last call wins.
    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.plan.order = Some((column.to_string(), direction.is_ascending()));
        self
    }

    /// Cap the number of returned rows.
    pub fn limit(mut self, n: u64) -> Self {
        self.plan.limit = Some(n);
        self
    }

    /// Return at most one row; zero rows is reported as a "No rows found" error.
    ///
    /// Sets the limit to 1; a later [`QueryBuilder::limit`] overrides it.
    pub fn single(mut self) -> Self {
        self.plan.single = true;
        self.plan.limit = Some(1);
        self
    }

    /// Insert one row (or the first of a list of rows). Returns the inserted row.
    pub fn insert(mut self, rows: impl IntoRows) -> Self {
        self.plan.set_mutation(Mutation::Insert(rows.into_rows()));
        self
    }

    /// Update every row matching the conditions. Returns the updated rows.
    pub fn update(mut self, payload: Payload) -> Self {
        self.plan.set_mutation(Mutation::Update(payload));
        self
    }

    /// Delete every row matching the conditions. Returns the deleted rows.
    pub fn delete(mut self) -> Self {
        self.plan.set_mutation(Mutation::Delete);
        self
    }

    /// Register a handler called with the raw error before it is normalized.
    pub fn on_error(mut self, handler: impl FnOnce(&ChainError) + Send + 'a) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    // ==================== Execution ====================

    /// Compile without executing.
    pub fn to_statement(&self) -> ChainResult<Statement> {
        statement::compile(&self.plan)
    }

    /// Compile, run once and normalize. Never fails: errors are returned in the response.
    pub async fn execute(self) -> Response {
        let QueryBuilder {
            engine,
            plan,
            on_error,
        } = self;

        match run(engine, &plan).await {
            Ok(response) => response,
            Err(err) => {
                if let Some(handler) = on_error {
                    handler(&err);
                }
                Response::failure(ResponseError::from(&err))
            }
        }
    }
}

impl<'a, E: Engine + 'a> IntoFuture for QueryBuilder<'a, E> {
    type Output = Response;
    type IntoFuture = Pin<Box<dyn Future<Output = Response> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}

impl<E: Engine> fmt::Debug for QueryBuilder<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("plan", &self.plan)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

async fn run<E: Engine>(engine: &E, plan: &QueryPlan) -> ChainResult<Response> {
    let stmt = statement::compile(plan)?;
    warn_on_sharp_edges(plan, stmt.kind);

    let started = Instant::now();
    let rows = match engine.fetch(&stmt.sql, &stmt.params).await {
        Ok(rows) => rows,
        Err(err) => {
            trace::statement_failed(stmt.kind, &plan.table, &stmt.sql, &err);
            return Err(err);
        }
    };
    trace::statement_executed(
        stmt.kind,
        &plan.table,
        &stmt.sql,
        stmt.params.len(),
        started.elapsed(),
    );

    shape(plan, stmt.kind, rows)
}

fn warn_on_sharp_edges(plan: &QueryPlan, kind: StatementKind) {
    match kind {
        StatementKind::Update | StatementKind::Delete if plan.conditions.is_empty() => {
            trace::unconditional_mutation(kind, &plan.table);
        }
        StatementKind::Insert
            if !plan.conditions.is_empty()
                || plan.order.is_some()
                || (plan.limit.is_some() && !plan.single)
                || plan.projection != Projection::All =>
        {
            trace::insert_ignores_filters(&plan.table);
        }
        _ => {}
    }
}

/// Shape engine rows into the response for this plan.
fn shape(plan: &QueryPlan, kind: StatementKind, rows: Vec<Record>) -> ChainResult<Response> {
    if kind == StatementKind::Count {
        let count = rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(parse_count)
            .ok_or_else(|| ChainError::decode("count", "expected an integer count"))?;
        return Ok(Response::success(None, Some(count)));
    }

    let count = kind.is_read().then_some(rows.len() as i64);
    if plan.single {
        return Ok(match rows.into_iter().next() {
            Some(row) => Response::success(Some(Data::One(row)), count),
            None => Response::failure(ResponseError::no_rows()),
        });
    }
    Ok(Response::success(Some(Data::Many(rows)), count))
}

fn parse_count(value: &Json) -> Option<i64> {
    match value {
        Json::Number(n) => n.as_i64(),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
