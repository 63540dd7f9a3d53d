//! Core document types: unresolved and resolved metadata trees, field paths.

use std::fmt;

use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Reserved top-level keys of a metadata document.
pub const KEY_DEFINITIONS: &str = "definitions";
pub const KEY_DATASET: &str = "dataset";
pub const KEY_TABLES: &str = "tables";
pub const KEY_MACROS: &str = "macros";
pub const KEY_COMMON: &str = "common";
pub const KEY_VARIABLES: &str = "variables";

/// Errors that can occur when constructing a document from parsed YAML.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid YAML document: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("document root must be a mapping, got {0}")]
    NotAMapping(String),
}

/// An unresolved metadata document.
///
/// A tree of mappings and sequences with reserved top-level keys
/// `definitions`, `dataset`, and `tables`. Scalar leaves may contain template
/// syntax (`<< >>` substitutions, `<% %>` control blocks, `{path}` field
/// references) that [`crate::resolver::resolve`] expands against a set of
/// dimension bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataDocument {
    root: Mapping,
}

impl MetadataDocument {
    pub fn new(root: Mapping) -> Self {
        Self { root }
    }

    /// Wrap a parsed YAML value. The root must be a mapping.
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        match value {
            Value::Mapping(root) => Ok(Self { root }),
            other => Err(DocumentError::NotAMapping(kind_name(&other).to_string())),
        }
    }

    /// Parse a YAML source string into a document.
    ///
    /// Plain YAML anchors and aliases are expanded here by the parser; merge
    /// keys (`<<`) are left in the tree for the resolver to fold.
    pub fn from_yaml_str(source: &str) -> Result<Self, DocumentError> {
        let value: Value = serde_yaml::from_str(source)?;
        Self::from_value(value)
    }

    pub fn root(&self) -> &Mapping {
        &self.root
    }

    pub fn definitions(&self) -> Option<&Value> {
        get_key(&self.root, KEY_DEFINITIONS)
    }

    pub fn dataset(&self) -> Option<&Value> {
        get_key(&self.root, KEY_DATASET)
    }

    pub fn tables(&self) -> Option<&Value> {
        get_key(&self.root, KEY_TABLES)
    }
}

/// A fully resolved metadata document for one indicator instance.
///
/// Carries `dataset` and `tables` only; `definitions` and `macros` are
/// template source and are not retained on the output.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDocument {
    root: Mapping,
}

impl ResolvedDocument {
    pub(crate) fn new(root: Mapping) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Mapping {
        &self.root
    }

    pub fn into_root(self) -> Mapping {
        self.root
    }

    /// Look up a value by dotted path, e.g. `tables.deaths.variables.v.title`.
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        lookup_dotted(&self.root, dotted)
    }

    /// Serialize the resolved tree back to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.root)
    }
}

/// Path of a field inside a document, used in error reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_dotted(dotted: &str) -> Self {
        Self(dotted.split('.').map(ToOwned::to_owned).collect())
    }

    /// A new path with one more segment appended.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0.join("."))
        }
    }
}

/// Fetch a string-keyed entry from a mapping.
pub(crate) fn get_key<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(&Value::String(key.to_string()))
}

/// Walk a dotted path through mappings and sequences.
///
/// Numeric segments index into sequences.
pub(crate) fn lookup_dotted<'a>(root: &'a Mapping, dotted: &str) -> Option<&'a Value> {
    let mut segments = dotted.split('.');
    let first = segments.next()?;
    let mut current = get_key(root, first)?;

    for segment in segments {
        current = match current {
            Value::Mapping(map) => get_key(map, segment)?,
            Value::Sequence(seq) => {
                let idx: usize = segment.parse().ok()?;
                seq.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        _ => "tagged value",
    }
}
