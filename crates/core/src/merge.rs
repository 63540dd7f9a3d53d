//! Merge-key expansion and `common` default propagation.
//!
//! Two separate rules live here, applied before any templating:
//!
//! 1. **Merge keys.** A mapping containing the YAML merge key `<<` is
//!    deep-merged with the merged-in mapping (the alias was already expanded
//!    to the anchored subtree by the parser); explicit sibling keys take
//!    precedence over merged-in keys of the same name. A sequence value
//!    merges its mappings left to right, earlier entries winning among
//!    themselves. A merge key holding anything else is a [`MergeError`].
//! 2. **Common blocks.** `definitions.common` declares default fields for
//!    every variable in every table; `tables.<name>.common` overrides it per
//!    field for that table. A `variables.<name>` field with the same name
//!    entirely replaces the common field; deep merging only happens when the
//!    overriding mapping itself carries a merge key (rule 1).

use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::document::types::{
    FieldPath, KEY_COMMON, KEY_DEFINITIONS, KEY_TABLES, KEY_VARIABLES, get_key,
    kind_name,
};

/// YAML merge key.
pub const MERGE_KEY: &str = "<<";

/// A merge key whose value is not mergeable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("merge key '<<' at {path} holds a {kind}, not a mapping or a sequence of mappings")]
pub struct MergeError {
    pub path: FieldPath,
    pub kind: &'static str,
}

/// Expand merge keys everywhere under a mapping root.
pub(crate) fn expand_merge_keys_mapping(root: &Mapping) -> Result<Mapping, MergeError> {
    expand_mapping(root, &FieldPath::root())
}

/// Expand merge keys everywhere in a tree.
pub fn expand_merge_keys(value: &Value) -> Result<Value, MergeError> {
    expand_value(value, &FieldPath::root())
}

fn expand_value(value: &Value, at: &FieldPath) -> Result<Value, MergeError> {
    match value {
        Value::Mapping(map) => Ok(Value::Mapping(expand_mapping(map, at)?)),
        Value::Sequence(seq) => {
            let mut out = Vec::with_capacity(seq.len());
            for (idx, item) in seq.iter().enumerate() {
                out.push(expand_value(item, &at.child(idx.to_string()))?);
            }
            Ok(Value::Sequence(out))
        }
        other => Ok(other.clone()),
    }
}

fn expand_mapping(map: &Mapping, at: &FieldPath) -> Result<Mapping, MergeError> {
    let mut out = match get_key(map, MERGE_KEY) {
        None => Mapping::new(),
        Some(value) => {
            let merge_at = at.child(MERGE_KEY);
            match expand_value(value, &merge_at)? {
                Value::Mapping(base) => base,
                Value::Sequence(bases) => {
                    let mut folded = Mapping::new();
                    for base in bases {
                        let Value::Mapping(base) = base else {
                            return Err(MergeError {
                                path: merge_at,
                                kind: kind_name(&base),
                            });
                        };
                        for (k, v) in base {
                            // Earlier entries win among merged-in mappings.
                            folded.entry(k).or_insert(v);
                        }
                    }
                    folded
                }
                other => {
                    return Err(MergeError { path: merge_at, kind: kind_name(&other) });
                }
            }
        }
    };

    let merge_key = Value::String(MERGE_KEY.to_string());
    for (key, value) in map {
        if key == &merge_key {
            continue;
        }
        let child = match key.as_str() {
            Some(name) => at.child(name),
            None => at.clone(),
        };
        let expanded = expand_value(value, &child)?;
        let merged = match (out.get(key), expanded) {
            (Some(Value::Mapping(existing)), Value::Mapping(overlay)) => {
                Value::Mapping(deep_merge(existing, &overlay))
            }
            (_, other) => other,
        };
        out.insert(key.clone(), merged);
    }
    Ok(out)
}

/// Recursive merge of two mappings; `overlay` wins on conflicting scalars.
pub(crate) fn deep_merge(base: &Mapping, overlay: &Mapping) -> Mapping {
    let mut out = base.clone();
    for (key, value) in overlay {
        let merged = match (out.get(key), value) {
            (Some(Value::Mapping(existing)), Value::Mapping(incoming)) => {
                Value::Mapping(deep_merge(existing, incoming))
            }
            (_, other) => other.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

/// Per-field replacement: every field of `base`, with fields of `over`
/// substituted wholesale where both define the same name.
fn override_fields(base: &Mapping, over: &Mapping) -> Mapping {
    let mut out = base.clone();
    for (key, value) in over {
        out.insert(key.clone(), value.clone());
    }
    out
}

/// Fold `common` defaults into every variable of every table.
///
/// The returned tree has `tables.<t>.common` removed and each
/// `tables.<t>.variables.<v>` replaced by the merged mapping, so templates in
/// overridden fields (and `{path}` references into them) see the merged
/// value. Expects merge keys to be expanded already.
pub(crate) fn apply_commons(tree: &Mapping) -> Mapping {
    let document_common = get_key(tree, KEY_DEFINITIONS)
        .and_then(Value::as_mapping)
        .and_then(|defs| get_key(defs, KEY_COMMON))
        .and_then(Value::as_mapping)
        .cloned()
        .unwrap_or_default();

    let mut out = tree.clone();
    let tables_key = Value::String(KEY_TABLES.into());
    let Some(Value::Mapping(tables)) = out.get_mut(&tables_key) else {
        return out;
    };

    for (_, table) in tables.iter_mut() {
        let Value::Mapping(table) = table else { continue };

        let table_common = match get_key(table, KEY_COMMON).and_then(Value::as_mapping)
        {
            Some(tc) => override_fields(&document_common, tc),
            None => document_common.clone(),
        };
        table.remove(&Value::String(KEY_COMMON.into()));

        let variables_key = Value::String(KEY_VARIABLES.into());
        let Some(Value::Mapping(variables)) = table.get_mut(&variables_key) else {
            continue;
        };
        for (_, variable) in variables.iter_mut() {
            if let Value::Mapping(fields) = variable {
                *fields = override_fields(&table_common, fields);
            }
        }
    }
    out
}
