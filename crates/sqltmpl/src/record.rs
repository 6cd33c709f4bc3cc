//! Ordered column/value records.
//!
//! A [`Record`] is both what queries return (one per row) and what the
//! table helpers accept as a partial row for inserts and updates. Column order
//! is preserved, so `INSERT` column lists come out in the order they were
//! written.

use crate::error::{DbError, DbResult};
use crate::value::Value;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// An ordered map from column name to [`Value`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, Value)>,
}

/// Build a [`Record`] from `column => value` pairs.
///
/// ```ignore
/// let row = record! { "name" => "alice", "age" => 30 };
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $(record.insert($column, $value);)+
        record
    }};
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Set a column, replacing an existing value in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((column, value)),
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let pos = self.columns.iter().position(|(name, _)| name == column)?;
        Some(self.columns.remove(pos).1)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Build a record from any value serializing to a JSON object.
    ///
    /// Nested arrays/objects are stored as JSON text.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> DbResult<Self> {
        match serde_json::to_value(value).map_err(|e| DbError::Serialization(e.to_string()))? {
            serde_json::Value::Object(map) => Ok(map
                .into_iter()
                .map(|(column, value)| (column, Value::from_json(value)))
                .collect()),
            other => Err(DbError::Serialization(format!(
                "expected a struct or map, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Deserialize the record into `T` by column name.
    pub fn deserialize<T: DeserializeOwned>(&self) -> DbResult<T> {
        serde_json::from_value(self.to_json()).map_err(|e| DbError::decode("*", e.to_string()))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.columns
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}
