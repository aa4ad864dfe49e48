//! Ordered column → value payloads for INSERT and UPDATE.

use crate::error::{ChainError, ChainResult};
use crate::value::Value;

/// An ordered mapping from column name to [`Value`].
///
/// Keys are unique. Insertion order is the column order of the compiled statement and
/// therefore the order of its bound parameters.
///
/// # Example
/// ```ignore
/// use pgchain::{Payload, payload};
///
/// let row = Payload::new().set("title", "X").set("slug", "x");
/// let same = payload! { "title" => "X", "slug" => "x" };
/// assert_eq!(row, same);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    entries: Vec<(String, Value)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value. Setting an existing column replaces its value in place.
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// In-place variant of [`Payload::set`].
    pub fn insert(&mut self, column: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column.to_string(), value)),
        }
    }

    /// Get a column value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    /// Values in column order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Build a payload from a JSON object (e.g. a request body).
    ///
    /// Each member becomes a column; nested arrays/objects are kept as JSON values.
    pub fn from_json(value: serde_json::Value) -> ChainResult<Self> {
        use serde_json::Value as Json;

        let serde_json::Value::Object(map) = value else {
            return Err(ChainError::invalid_query(
                "payload must be a JSON object",
            ));
        };

        let mut payload = Payload::new();
        for (column, member) in map {
            let value = match member {
                Json::Null => Value::Null,
                Json::Bool(b) => Value::Bool(b),
                Json::String(s) => Value::Text(s),
                Json::Number(ref n) => match n.as_i64() {
                    Some(i) => Value::Int(i),
                    None => n.as_f64().map_or(Value::Json(member.clone()), Value::Float),
                },
                other => Value::Json(other),
            };
            payload.insert(&column, value);
        }
        Ok(payload)
    }
}

impl<K, V> FromIterator<(K, V)> for Payload
where
    K: AsRef<str>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut payload = Payload::new();
        for (k, v) in iter {
            payload.insert(k.as_ref(), v);
        }
        payload
    }
}

/// Build a [`Payload`] from `column => value` pairs, keeping their order.
#[macro_export]
macro_rules! payload {
    () => {
        $crate::Payload::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {
        $crate::Payload::new()$(.set($column, $value))+
    };
}

/// Rows accepted by `insert`: a single payload or a list of payloads.
pub trait IntoRows {
    fn into_rows(self) -> Vec<Payload>;
}

impl IntoRows for Payload {
    fn into_rows(self) -> Vec<Payload> {
        vec![self]
    }
}

impl IntoRows for Vec<Payload> {
    fn into_rows(self) -> Vec<Payload> {
        self
    }
}

impl<const N: usize> IntoRows for [Payload; N] {
    fn into_rows(self) -> Vec<Payload> {
        self.into_iter().collect()
    }
}
