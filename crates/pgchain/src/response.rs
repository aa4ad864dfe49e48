//! The uniform `{ data, error, count }` result.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, ChainResult, error_chain};
use crate::row::Record;

/// Message reported when single-row mode matches nothing.
pub const NO_ROWS_MESSAGE: &str = "No rows found";

/// Row payload of a [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Data {
    /// Single-row mode.
    One(Record),
    /// Every returned row, in engine order.
    Many(Vec<Record>),
}

/// Broad classification of a failed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Single-row mode matched zero rows.
    NoRows,
    /// The builder state could not be compiled; the engine was not contacted.
    InvalidQuery,
    /// A constraint rejected the write.
    Constraint,
    /// Connection or pool failure.
    Connection,
    /// A returned column could not be decoded.
    Decode,
    /// Any other engine failure.
    Database,
}

/// Error half of a [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub message: String,
    pub kind: ErrorKind,
    /// SQLSTATE reported by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ResponseError {
    pub(crate) fn no_rows() -> Self {
        Self {
            message: NO_ROWS_MESSAGE.to_string(),
            kind: ErrorKind::NoRows,
            code: None,
            details: None,
        }
    }

    pub fn is_no_rows(&self) -> bool {
        self.kind == ErrorKind::NoRows
    }
}

impl From<&ChainError> for ResponseError {
    fn from(err: &ChainError) -> Self {
        let kind = match err {
            ChainError::NotFound(_) => ErrorKind::NoRows,
            ChainError::InvalidQuery(_) => ErrorKind::InvalidQuery,
            ChainError::UniqueViolation(_)
            | ChainError::ForeignKeyViolation(_)
            | ChainError::CheckViolation(_)
            | ChainError::NotNullViolation(_) => ErrorKind::Constraint,
            ChainError::Connection(_) => ErrorKind::Connection,
            #[cfg(feature = "pool")]
            ChainError::Pool(_) => ErrorKind::Connection,
            ChainError::Decode { .. } => ErrorKind::Decode,
            ChainError::Query(_) | ChainError::Config(_) | ChainError::Other(_) => {
                ErrorKind::Database
            }
        };

        let (message, details) = match err {
            ChainError::Query(e) => match e.as_db_error() {
                Some(db) => (
                    db.message().to_string(),
                    db.detail().map(str::to_string),
                ),
                None => (error_chain(e), None),
            },
            other => (other.to_string(), None),
        };

        Self {
            message,
            kind,
            code: err.sqlstate().map(str::to_string),
            details,
        }
    }
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ResponseError {}

/// Outcome of executing a builder. Never a raised failure: errors are data.
///
/// `count` is only reported for reads: the number of returned rows, or the exact count in
/// count-only mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub data: Option<Data>,
    pub error: Option<ResponseError>,
    pub count: Option<i64>,
}

impl Response {
    pub(crate) fn success(data: Option<Data>, count: Option<i64>) -> Self {
        Self {
            data,
            error: None,
            count,
        }
    }

    pub(crate) fn failure(error: ResponseError) -> Self {
        Self {
            data: None,
            error: Some(error),
            count: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Rows regardless of mode (a single row becomes a one-element slice).
    pub fn rows(&self) -> &[Record] {
        match &self.data {
            Some(Data::Many(rows)) => rows,
            Some(Data::One(row)) => std::slice::from_ref(row),
            None => &[],
        }
    }

    /// First row, if any.
    pub fn row(&self) -> Option<&Record> {
        self.rows().first()
    }

    /// Convert into a `Result`, keeping the data.
    pub fn into_result(self) -> Result<Option<Data>, ResponseError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }

    /// Deserialize `data` into caller types (`T` for single-row mode, `Vec<T>` otherwise).
    pub fn data_as<T: DeserializeOwned>(&self) -> ChainResult<Option<T>> {
        let Some(data) = &self.data else {
            return Ok(None);
        };
        let json = serde_json::to_value(data).map_err(|e| ChainError::Other(e.to_string()))?;
        serde_json::from_value(json)
            .map(Some)
            .map_err(|e| ChainError::decode("data", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: serde_json::Value) -> Record {
        match v {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn serializes_to_uniform_shape() {
        let resp = Response::success(
            Some(Data::Many(vec![record(json!({"id": 1}))])),
            Some(1),
        );
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"data": [{"id": 1}], "error": null, "count": 1})
        );

        let resp = Response::failure(ResponseError::no_rows());
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"data": null, "error": {"message": "No rows found", "kind": "no_rows"}, "count": null})
        );
    }

    #[test]
    fn rows_accessor_covers_both_shapes() {
        let one = Response::success(Some(Data::One(record(json!({"id": 7})))), Some(1));
        assert_eq!(one.rows().len(), 1);
        assert_eq!(one.row().unwrap()["id"], json!(7));

        let empty = Response::success(Some(Data::Many(vec![])), Some(0));
        assert!(empty.row().is_none());
        assert!(Response::default().rows().is_empty());
    }

    #[test]
    fn data_as_deserializes() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Project {
            id: i64,
            title: String,
        }

        let resp = Response::success(
            Some(Data::Many(vec![record(json!({"id": 1, "title": "A"}))])),
            Some(1),
        );
        let projects: Vec<Project> = resp.data_as().unwrap().unwrap();
        assert_eq!(
            projects,
            vec![Project {
                id: 1,
                title: "A".into()
            }]
        );
    }

    #[test]
    fn error_kinds_from_chain_errors() {
        let e = ResponseError::from(&ChainError::UniqueViolation("slug_key: dup".into()));
        assert_eq!(e.kind, ErrorKind::Constraint);
        assert_eq!(e.code.as_deref(), Some("23505"));

        let e = ResponseError::from(&ChainError::invalid_query("conflicting operations"));
        assert_eq!(e.kind, ErrorKind::InvalidQuery);
        assert_eq!(e.message, "Invalid query: conflicting operations");

        let e = ResponseError::from(&ChainError::not_found(NO_ROWS_MESSAGE));
        assert!(e.is_no_rows());
    }

    #[test]
    fn into_result_splits_error() {
        assert!(Response::failure(ResponseError::no_rows()).into_result().is_err());
        assert!(Response::success(None, Some(3)).into_result().unwrap().is_none());
    }
}
