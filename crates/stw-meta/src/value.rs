//! Site configuration document.
//!
//! The configuration file is an arbitrary nested document. It is kept as a
//! tagged value rather than a loose map so every access site stays typed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::meta::Meta;

/// A node of the configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// Errors that can occur when reading a configuration document.
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("Invalid YAML document: {0}")]
    InvalidYaml(String),

    #[error("Configuration root must be a mapping, found {0}")]
    NotAMap(&'static str),

    #[error("Cannot convert value: {0}")]
    Convert(String),
}

impl Value {
    /// An empty mapping, the document used when no configuration file exists.
    pub fn empty_map() -> Self {
        Value::Map(BTreeMap::new())
    }

    /// Parse a YAML document whose root is a mapping.
    ///
    /// An empty (or comment-only) document yields an empty map.
    pub fn from_yaml_str(source: &str) -> Result<Self, ValueError> {
        let value: Value =
            serde_yaml::from_str(source).map_err(|e| ValueError::InvalidYaml(e.to_string()))?;

        match value {
            Value::Null => Ok(Self::empty_map()),
            Value::Map(_) => Ok(value),
            other => Err(ValueError::NotAMap(other.kind())),
        }
    }

    /// Look up a key of a mapping. Returns `None` for non-map values.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// True for null, empty strings, empty lists and empty maps.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Human readable name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Re-serialize this value and parse it as page metadata.
    pub fn to_meta(&self) -> Result<Meta, ValueError> {
        let json = serde_json::to_value(self).map_err(|e| ValueError::Convert(e.to_string()))?;
        serde_json::from_value(json).map_err(|e| ValueError::Convert(e.to_string()))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl FromIterator<(String, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Value::Map(iter.into_iter().collect())
    }
}
