//! Parameter bindings supplied by the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Errors building bindings from structured input.
#[derive(Debug, Error)]
pub enum BindingsError {
    #[error("Parameter name must be a string, found {0:?}")]
    InvalidName(Value),

    #[error("Parameter '{0}' must be a scalar value")]
    NonScalar(String),
}

/// Flat parameter name → value overrides.
///
/// Values are kept as strings since that is how the orchestration service
/// receives them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBindings(BTreeMap<String, String>);

impl ParameterBindings {
    /// Create empty bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build bindings from a YAML mapping of scalars.
    pub fn from_mapping(mapping: &Mapping) -> Result<Self, BindingsError> {
        let mut bindings = Self::new();
        for (key, value) in mapping {
            let name = key
                .as_str()
                .ok_or_else(|| BindingsError::InvalidName(key.clone()))?;
            let value = scalar_to_string(value)
                .ok_or_else(|| BindingsError::NonScalar(name.to_string()))?;
            bindings.insert(name, value);
        }
        Ok(bindings)
    }

    /// Bind a value, replacing any earlier binding of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Look up a bound value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Overlay `other` on top of these bindings.
    pub fn merge(&mut self, other: ParameterBindings) {
        self.0.extend(other.0);
    }

    /// Iterate over bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterBindings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Render a YAML scalar the way it would be passed on a command line.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}
