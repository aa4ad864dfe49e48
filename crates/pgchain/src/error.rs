//! Error types for pgchain

use thiserror::Error;

/// Result type alias for pgchain operations
pub type ChainResult<T> = Result<T, ChainError>;

/// Error types for query compilation and execution
#[derive(Debug, Error)]
pub enum ChainError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// NOT NULL constraint violation
    #[error("Not null violation: {0}")]
    NotNullViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// The builder state cannot be compiled into a statement
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl ChainError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an invalid query error
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// SQLSTATE code reported by the server, if this error came from one.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Query(err) => err.as_db_error().map(|db| db.code().code()),
            Self::UniqueViolation(_) => Some("23505"),
            Self::ForeignKeyViolation(_) => Some("23503"),
            Self::CheckViolation(_) => Some("23514"),
            Self::NotNullViolation(_) => Some("23502"),
            _ => None,
        }
    }

    /// Parse a tokio_postgres error into a more specific ChainError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err
                .constraint()
                .or_else(|| db_err.column())
                .unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                "23502" => return Self::NotNullViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        if err.is_closed() {
            return Self::Connection(error_chain(&err));
        }
        Self::Query(err)
    }
}

/// Render an error followed by every distinct `source()` cause, `outer: inner`.
///
/// Driver errors keep the interesting part (the unsupported type, the bind mismatch) in their
/// source rather than their own message.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for ChainError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_names_column() {
        let err = ChainError::decode("created_at", "unsupported type");
        assert_eq!(
            err.to_string(),
            "Decode error on column 'created_at': unsupported type"
        );
    }

    #[derive(Debug, Error)]
    #[error("error deserializing column 2")]
    struct ColumnError(#[source] TypeError);

    #[derive(Debug, Error)]
    #[error("unsupported column type point")]
    struct TypeError;

    #[test]
    fn error_chain_appends_causes() {
        assert_eq!(
            error_chain(&ColumnError(TypeError)),
            "error deserializing column 2: unsupported column type point"
        );
        assert_eq!(error_chain(&TypeError), "unsupported column type point");
    }

    #[test]
    fn invalid_query_display() {
        let err = ChainError::invalid_query("UPDATE requires at least one column");
        assert_eq!(
            err.to_string(),
            "Invalid query: UPDATE requires at least one column"
        );
    }

    #[test]
    fn constraint_variants_report_sqlstate() {
        assert_eq!(
            ChainError::UniqueViolation("projects_slug_key: dup".into()).sqlstate(),
            Some("23505")
        );
        assert_eq!(ChainError::not_found("No rows found").sqlstate(), None);
        assert!(ChainError::not_found("No rows found").is_not_found());
    }
}
