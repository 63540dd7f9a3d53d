//! Dimension bindings: the concrete dimension values one indicator instance
//! is resolved against.
//!
//! A binding maps a dimension name (e.g. `age`, `sex`, `cause`) to the bound
//! value for one indicator instantiation. Bindings are supplied externally
//! and are immutable during a resolution pass.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("dimension key is not a string: {0}")]
    NonStringKey(String),

    #[error("dimension '{0}' has a non-scalar value")]
    NonScalar(String),
}

/// A mapping from dimension name to bound value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionBindings {
    values: BTreeMap<String, String>,
}

impl DimensionBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let values =
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { values }
    }

    /// Build bindings from a YAML mapping of scalar values, the shape the
    /// surrounding pipeline hands a dimension combination over in.
    pub fn from_mapping(map: &Mapping) -> Result<Self, BindingError> {
        let mut bindings = Self::new();
        for (key, value) in map {
            let Value::String(name) = key else {
                return Err(BindingError::NonStringKey(format!("{key:?}")));
            };
            let Some(text) = scalar_to_string(value) else {
                return Err(BindingError::NonScalar(name.clone()));
            };
            bindings.insert(name.clone(), text);
        }
        Ok(bindings)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// String form of a scalar YAML value; `None` for collections.
///
/// This is the same stringification substitution applies, so a value bound
/// from YAML and one bound from a string render identically.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mapping_stringifies_scalars() {
        let map: Mapping =
            serde_yaml::from_str("cause: Malaria\nyear: 2019\nprojected: false\n")
                .unwrap();
        let b = DimensionBindings::from_mapping(&map).unwrap();
        assert_eq!(b.get("cause"), Some("Malaria"));
        assert_eq!(b.get("year"), Some("2019"));
        assert_eq!(b.get("projected"), Some("false"));
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn test_from_mapping_rejects_collections() {
        let map: Mapping = serde_yaml::from_str("age:\n  - 1\n  - 2\n").unwrap();
        let err = DimensionBindings::from_mapping(&map).unwrap_err();
        assert!(matches!(err, BindingError::NonScalar(name) if name == "age"));
    }

    #[test]
    fn test_names_are_sorted() {
        let b = DimensionBindings::from_pairs([("sex", "Male"), ("age", "15-19")]);
        let names: Vec<_> = b.names().collect();
        assert_eq!(names, vec!["age", "sex"]);
    }
}
