//! `tracing` events for executed statements (target `pgchain.sql`).

use std::time::Duration;

use crate::error::ChainError;
use crate::statement::StatementKind;

/// Maximum SQL length (in bytes) included in events.
pub(crate) const MAX_SQL_LENGTH: usize = 200;

/// Truncate a SQL string to at most `max_bytes` bytes (UTF-8 safe).
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

fn display_sql(sql: &str) -> String {
    if sql.len() > MAX_SQL_LENGTH {
        format!("{}...", truncate_sql_bytes(sql, MAX_SQL_LENGTH))
    } else {
        sql.to_string()
    }
}

pub(crate) fn statement_executed(
    kind: StatementKind,
    table: &str,
    sql: &str,
    param_count: usize,
    elapsed: Duration,
) {
    tracing::debug!(
        target: "pgchain.sql",
        kind = %kind,
        table,
        param_count,
        sql = %display_sql(sql),
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "statement executed"
    );
}

pub(crate) fn statement_failed(kind: StatementKind, table: &str, sql: &str, err: &ChainError) {
    tracing::warn!(
        target: "pgchain.sql",
        kind = %kind,
        table,
        sql = %display_sql(sql),
        sqlstate = err.sqlstate().unwrap_or("-"),
        error = %err,
        "statement failed"
    );
}

pub(crate) fn unconditional_mutation(kind: StatementKind, table: &str) {
    tracing::warn!(
        target: "pgchain.sql",
        kind = %kind,
        table,
        "{} without filters affects every row",
        kind
    );
}

pub(crate) fn insert_ignores_filters(table: &str) {
    tracing::warn!(
        target: "pgchain.sql",
        table,
        "insert ignores filters, ordering, limit and projection"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_sql_bytes("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql_bytes("SELECT 1", 6), "SELECT");
        // 'é' is two bytes; cutting inside it backs off to the boundary.
        assert_eq!(truncate_sql_bytes("é", 1), "");
    }

    #[test]
    fn long_sql_gets_ellipsis() {
        let sql = "x".repeat(MAX_SQL_LENGTH + 10);
        let shown = display_sql(&sql);
        assert_eq!(shown.len(), MAX_SQL_LENGTH + 3);
        assert!(shown.ends_with("..."));
    }
}
