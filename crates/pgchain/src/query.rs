//! Raw parameterized statements for what the builder cannot express (DDL, joins, seeds).

use std::time::Instant;

use crate::client::Engine;
use crate::error::{ChainError, ChainResult};
use crate::row::Record;
use crate::statement::StatementKind;
use crate::trace;
use crate::value::Value;

/// A hand-written SQL statement with `$n` placeholders bound in order.
///
/// # Example
///
/// ```ignore
/// let rows = db
///     .raw("SELECT p.* FROM projects p JOIN publications x ON x.project_id = p.id WHERE x.year = $1")
///     .bind(2024)
///     .fetch()
///     .await?;
/// ```
pub struct RawQuery<'a, E: Engine> {
    engine: &'a E,
    sql: String,
    params: Vec<Value>,
}

impl<'a, E: Engine> RawQuery<'a, E> {
    pub fn new(engine: &'a E, sql: impl Into<String>) -> Self {
        Self {
            engine,
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Bind the next parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Execute and return every row.
    pub async fn fetch(&self) -> ChainResult<Vec<Record>> {
        let started = Instant::now();
        let result = self.engine.fetch(&self.sql, &self.params).await;
        self.trace(&result, started);
        result
    }

    /// Execute and return the first row; zero rows is [`ChainError::NotFound`].
    pub async fn fetch_one(&self) -> ChainResult<Record> {
        self.fetch()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ChainError::not_found("Expected one row, got none"))
    }

    /// Execute and return the first row, if any.
    pub async fn fetch_opt(&self) -> ChainResult<Option<Record>> {
        Ok(self.fetch().await?.into_iter().next())
    }

    /// Execute and return the number of affected rows.
    pub async fn execute(&self) -> ChainResult<u64> {
        let started = Instant::now();
        let result = self.engine.run(&self.sql, &self.params).await;
        self.trace(&result, started);
        result
    }

    fn trace<T>(&self, result: &ChainResult<T>, started: Instant) {
        let kind = guess_kind(&self.sql);
        match result {
            Ok(_) => trace::statement_executed(
                kind,
                "-",
                &self.sql,
                self.params.len(),
                started.elapsed(),
            ),
            Err(err) => trace::statement_failed(kind, "-", &self.sql, err),
        }
    }
}

/// Statement kind from the leading keyword, for logging only.
fn guess_kind(sql: &str) -> StatementKind {
    let head = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    match head.as_str() {
        "INSERT" => StatementKind::Insert,
        "UPDATE" => StatementKind::Update,
        "DELETE" => StatementKind::Delete,
        "SELECT" | "WITH" | "TABLE" | "VALUES" => StatementKind::Select,
        _ => StatementKind::Raw,
    }
}
