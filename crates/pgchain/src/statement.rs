//! Statement compiler: turns accumulated builder state into one parameterized SQL statement.
//!
//! Compilation is pure. Every value travels as a bound parameter; only identifiers are
//! written into the SQL text. Placeholders are 1-based and contiguous: payload values
//! (INSERT/UPDATE) are numbered first, filter values continue the sequence.

use std::fmt;

use crate::error::{ChainError, ChainResult};
use crate::payload::Payload;
use crate::value::Value;

/// The shape of a compiled statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Count,
    Insert,
    Update,
    Delete,
    /// Hand-written SQL that is not a plain read or write (DDL and the like).
    Raw,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Count => "count",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Raw => "raw",
        }
    }

    /// Whether results of this kind report `count`.
    pub fn is_read(self) -> bool {
        matches!(self, Self::Select | Self::Count)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled statement: SQL text plus its parameters in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
    pub kind: StatementKind,
}

/// SELECT projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) enum Projection {
    #[default]
    All,
    Columns(Vec<String>),
}

impl Projection {
    /// Parse a comma-separated column list. `*` (or an empty list) selects every column.
    pub(crate) fn parse(columns: &str) -> Self {
        let mut cols: Vec<String> = Vec::new();
        for col in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            if col == "*" {
                return Projection::All;
            }
            if !cols.iter().any(|c| c == col) {
                cols.push(col.to_string());
            }
        }
        if cols.is_empty() {
            Projection::All
        } else {
            Projection::Columns(cols)
        }
    }

    fn to_sql(&self) -> String {
        match self {
            Projection::All => "*".to_string(),
            Projection::Columns(cols) => cols
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Write operation requested on the builder.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Mutation {
    Insert(Vec<Payload>),
    Update(Payload),
    Delete,
}

impl Mutation {
    fn name(&self) -> &'static str {
        match self {
            Mutation::Insert(_) => "insert",
            Mutation::Update(_) => "update",
            Mutation::Delete => "delete",
        }
    }
}

/// Accumulated builder state.
#[derive(Debug, Clone, Default)]
pub(crate) struct QueryPlan {
    pub(crate) table: String,
    pub(crate) conditions: Vec<(String, Value)>,
    pub(crate) projection: Projection,
    /// `(column, ascending)`
    pub(crate) order: Option<(String, bool)>,
    pub(crate) limit: Option<u64>,
    pub(crate) single: bool,
    pub(crate) exact_count: bool,
    pub(crate) head: bool,
    pub(crate) mutation: Option<Mutation>,
    /// First configuration error, reported when the plan is compiled.
    pub(crate) build_error: Option<String>,
}

impl QueryPlan {
    pub(crate) fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    /// Record a write operation. Repeating the same kind replaces its payload; mixing kinds
    /// leaves the plan uncompilable.
    pub(crate) fn set_mutation(&mut self, mutation: Mutation) {
        if let Some(existing) = &self.mutation {
            if existing.name() != mutation.name() && self.build_error.is_none() {
                self.build_error = Some(format!(
                    "conflicting operations on {}: {} and {}",
                    self.table,
                    existing.name(),
                    mutation.name()
                ));
            }
        }
        self.mutation = Some(mutation);
    }

    /// Exact count with no row payload.
    pub(crate) fn is_count_only(&self) -> bool {
        self.exact_count && self.head
    }

    /// The kind of statement this plan compiles to.
    pub(crate) fn kind(&self) -> StatementKind {
        match &self.mutation {
            Some(Mutation::Insert(_)) => StatementKind::Insert,
            Some(Mutation::Update(_)) => StatementKind::Update,
            Some(Mutation::Delete) => StatementKind::Delete,
            None if self.is_count_only() => StatementKind::Count,
            None => StatementKind::Select,
        }
    }
}

/// Quote an identifier unless it is `id` or the `*` wildcard. Embedded `"` are doubled.
pub fn quote_ident(name: &str) -> String {
    if name == "id" || name == "*" {
        return name.to_string();
    }
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Compile a plan into SQL and its ordered parameters.
pub(crate) fn compile(plan: &QueryPlan) -> ChainResult<Statement> {
    if let Some(err) = &plan.build_error {
        return Err(ChainError::invalid_query(err.clone()));
    }
    if plan.table.trim().is_empty() {
        return Err(ChainError::invalid_query("table name is empty"));
    }

    let mut params = Vec::new();
    let kind = plan.kind();
    let sql = match &plan.mutation {
        Some(Mutation::Insert(rows)) => compile_insert(&plan.table, rows, &mut params)?,
        Some(Mutation::Update(payload)) => compile_update(plan, payload, &mut params)?,
        Some(Mutation::Delete) => {
            let mut sql = format!("DELETE FROM {}", plan.table);
            push_where(&mut sql, &plan.conditions, &mut params);
            sql.push_str(" RETURNING *");
            sql
        }
        None if plan.is_count_only() => {
            let mut sql = format!("SELECT COUNT(*) as count FROM {}", plan.table);
            push_where(&mut sql, &plan.conditions, &mut params);
            sql
        }
        None => compile_select(plan, &mut params),
    };

    Ok(Statement { sql, params, kind })
}

fn compile_select(plan: &QueryPlan, params: &mut Vec<Value>) -> String {
    let mut sql = format!("SELECT {} FROM {}", plan.projection.to_sql(), plan.table);
    push_where(&mut sql, &plan.conditions, params);

    if let Some((column, ascending)) = &plan.order {
        sql.push_str(&format!(
            " ORDER BY {} {}",
            quote_ident(column),
            if *ascending { "ASC" } else { "DESC" }
        ));
    }
    if let Some(limit) = plan.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    sql
}

fn compile_insert(table: &str, rows: &[Payload], params: &mut Vec<Value>) -> ChainResult<String> {
    // Only the first row is written; its key order defines columns and parameters.
    let row = rows
        .first()
        .ok_or_else(|| ChainError::invalid_query("INSERT requires at least one row"))?;
    if row.is_empty() {
        return Err(ChainError::invalid_query(
            "INSERT requires at least one column",
        ));
    }

    let mut columns = Vec::with_capacity(row.len());
    let mut placeholders = Vec::with_capacity(row.len());
    for (column, value) in row.iter() {
        params.push(value.clone());
        columns.push(quote_ident(column));
        placeholders.push(format!("${}", params.len()));
    }

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        table,
        columns.join(", "),
        placeholders.join(", ")
    ))
}

fn compile_update(
    plan: &QueryPlan,
    payload: &Payload,
    params: &mut Vec<Value>,
) -> ChainResult<String> {
    if payload.is_empty() {
        return Err(ChainError::invalid_query(
            "UPDATE requires at least one column",
        ));
    }

    let mut set_parts = Vec::with_capacity(payload.len());
    for (column, value) in payload.iter() {
        params.push(value.clone());
        set_parts.push(format!("{} = ${}", quote_ident(column), params.len()));
    }

    let mut sql = format!("UPDATE {} SET {}", plan.table, set_parts.join(", "));
    push_where(&mut sql, &plan.conditions, params);
    sql.push_str(" RETURNING *");
    Ok(sql)
}

/// Append `WHERE c1 = $k AND ...`, numbering from the current parameter count.
/// Nothing is appended when there are no conditions.
fn push_where(sql: &mut String, conditions: &[(String, Value)], params: &mut Vec<Value>) {
    if conditions.is_empty() {
        return;
    }
    let mut parts = Vec::with_capacity(conditions.len());
    for (column, value) in conditions {
        params.push(value.clone());
        parts.push(format!("{} = ${}", quote_ident(column), params.len()));
    }
    sql.push_str(" WHERE ");
    sql.push_str(&parts.join(" AND "));
}
