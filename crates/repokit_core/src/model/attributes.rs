//! Column/value map used to hydrate and dehydrate entities.

use crate::error::{RepoError, RepoResult};
use rusqlite::types::Value;
use std::collections::BTreeMap;

/// Ordered `column -> value` map for one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: BTreeMap<String, Value>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, convenient for literals.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(column.into(), value.into())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(column, value)| (column.as_str(), value))
    }

    /// Reads an integer column. Missing and `NULL` columns read as `None`.
    pub fn integer(&self, column: &str) -> RepoResult<Option<i64>> {
        match self.values.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Integer(value)) => Ok(Some(*value)),
            Some(other) => Err(type_mismatch(column, "integer", other)),
        }
    }

    /// Reads a text column. Missing and `NULL` columns read as `None`.
    pub fn text(&self, column: &str) -> RepoResult<Option<String>> {
        match self.values.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Text(value)) => Ok(Some(value.clone())),
            Some(other) => Err(type_mismatch(column, "text", other)),
        }
    }

    /// Reads a numeric column, widening integers to `f64`.
    pub fn real(&self, column: &str) -> RepoResult<Option<f64>> {
        match self.values.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Real(value)) => Ok(Some(*value)),
            Some(Value::Integer(value)) => Ok(Some(*value as f64)),
            Some(other) => Err(type_mismatch(column, "real", other)),
        }
    }
}

impl FromIterator<(String, Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Attributes {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Plain-text rendering of a stored value, `NULL` rendering as empty.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(value) => value.to_string(),
        Value::Real(value) => value.to_string(),
        Value::Text(value) => value.clone(),
        Value::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn type_mismatch(column: &str, expected: &str, found: &Value) -> RepoError {
    RepoError::InvalidData(format!(
        "column `{column}` expected {expected}, found {:?}",
        found.data_type()
    ))
}
