//! Metadata template resolution.
//!
//! [`resolve`] takes an unresolved [`MetadataDocument`] plus one set of
//! [`DimensionBindings`] and produces the fully expanded, dimension-free
//! metadata for that indicator instance. Resolution is a pure, synchronous
//! computation over the in-memory tree: it performs no I/O, reads the shared
//! document immutably, and writes a private output tree, so callers may
//! resolve many `(document, bindings)` pairs concurrently.
//!
//! Per scalar the pipeline is: control-flow phase, `{path}` field-reference
//! expansion against the document's own (merged, partially resolved) tree,
//! substitution phase, then whitespace normalization where template syntax
//! was present. Errors are fail-fast; no partial output is ever returned.

use std::collections::HashMap;

use regex::Regex;
use serde_yaml::{Mapping, Value};

use crate::bindings::{DimensionBindings, scalar_to_string};
use crate::document::types::{
    FieldPath, KEY_DATASET, KEY_DEFINITIONS, KEY_MACROS, KEY_TABLES, MetadataDocument,
    ResolvedDocument, get_key, kind_name, lookup_dotted,
};
use crate::error::ResolveError;
use crate::merge::{apply_commons, expand_merge_keys_mapping};
use crate::template::{MacroTable, RenderEngine, normalize_whitespace};

/// Tuning knobs for a resolution pass.
#[derive(Debug, Clone, Copy)]
pub struct ResolverOptions {
    /// Depth bound on nested macro expansion; catches accidental
    /// self-reference.
    pub macro_recursion_limit: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self { macro_recursion_limit: 20 }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    options: ResolverOptions,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ResolverOptions) -> Self {
        Self { options }
    }

    /// Resolve one document against one set of dimension bindings.
    pub fn resolve(
        &self,
        document: &MetadataDocument,
        bindings: &DimensionBindings,
    ) -> Result<ResolvedDocument, ResolveError> {
        tracing::debug!(
            dimensions = bindings.len(),
            "resolving metadata document"
        );

        // Merge keys and common defaults fold first, so templates in
        // overridden fields (and field references into them) see the merged
        // values rather than pre-merge defaults.
        let expanded =
            expand_merge_keys_mapping(document.root()).map_err(ResolveError::from_merge)?;
        let tree = apply_commons(&expanded);

        let macros = collect_macros(&tree)?;
        let engine =
            RenderEngine::new(bindings, &macros, self.options.macro_recursion_limit);

        let mut pass = Pass { tree: &tree, engine, memo: HashMap::new(), visiting: Vec::new() };

        let mut out = Mapping::new();
        for key in [KEY_DATASET, KEY_TABLES] {
            if let Some(value) = get_key(&tree, key) {
                let path = FieldPath::root().child(key);
                out.insert(
                    Value::String(key.to_string()),
                    pass.resolve_value(value, &path)?,
                );
            }
        }
        Ok(ResolvedDocument::new(out))
    }
}

/// Resolve with default options.
pub fn resolve(
    document: &MetadataDocument,
    bindings: &DimensionBindings,
) -> Result<ResolvedDocument, ResolveError> {
    Resolver::new().resolve(document, bindings)
}

fn collect_macros(tree: &Mapping) -> Result<MacroTable, ResolveError> {
    let mut table = MacroTable::empty();
    for key in [KEY_DEFINITIONS, KEY_MACROS] {
        if let Some(subtree) = get_key(tree, key) {
            table
                .collect_from(subtree)
                .map_err(|e| ResolveError::from_template(e, &FieldPath::root().child(key)))?;
        }
    }
    if !table.is_empty() {
        tracing::debug!(count = table.len(), "indexed macro declarations");
    }
    Ok(table)
}

/// State for one resolution pass.
struct Pass<'a> {
    /// Merged document tree, field-reference lookup target.
    tree: &'a Mapping,
    engine: RenderEngine<'a>,
    /// Resolved text per referenced field, keyed by dotted path.
    memo: HashMap<String, String>,
    /// Field references currently being resolved, for cycle detection.
    visiting: Vec<String>,
}

impl Pass<'_> {
    fn resolve_value(
        &mut self,
        value: &Value,
        path: &FieldPath,
    ) -> Result<Value, ResolveError> {
        match value {
            Value::String(s) => {
                Ok(Value::String(self.resolve_scalar(s, path)?))
            }
            Value::Mapping(map) => {
                let mut out = Mapping::new();
                for (key, item) in map {
                    let child = match key.as_str() {
                        Some(name) => path.child(name),
                        None => path.clone(),
                    };
                    out.insert(key.clone(), self.resolve_value(item, &child)?);
                }
                Ok(Value::Mapping(out))
            }
            Value::Sequence(seq) => {
                let mut out = Vec::with_capacity(seq.len());
                for (idx, item) in seq.iter().enumerate() {
                    out.push(self.resolve_value(item, &path.child(idx.to_string()))?);
                }
                Ok(Value::Sequence(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_scalar(
        &mut self,
        source: &str,
        path: &FieldPath,
    ) -> Result<String, ResolveError> {
        let mut templated = source.contains("<%") || source.contains("<<");

        let text = if source.contains("<%") {
            self.engine
                .expand_control(source)
                .map_err(|e| ResolveError::from_template(e, path))?
        } else {
            source.to_string()
        };

        let (text, expanded) = self.expand_field_refs(&text, path)?;
        templated |= expanded;

        let text = self
            .engine
            .expand_substitutions(&text)
            .map_err(|e| ResolveError::from_template(e, path))?;

        // Substituted values, macro bodies included, may emit further field
        // references. The text a reference splices in is already fully
        // resolved, so one further pass reaches a fixed point.
        let (text, expanded) = self.expand_field_refs(&text, path)?;
        templated |= expanded;

        // Plain prose passes through byte-identical; normalization only
        // applies where template syntax was expanded.
        if templated { Ok(normalize_whitespace(&text)) } else { Ok(text) }
    }

    /// Expand `{path}` references against the document's own tree.
    ///
    /// Only dotted paths rooted at a reserved document key are treated as
    /// references; other braced text is authored prose and passes through.
    /// The flag reports whether any reference was actually expanded.
    fn expand_field_refs(
        &mut self,
        input: &str,
        path: &FieldPath,
    ) -> Result<(String, bool), ResolveError> {
        if !input.contains('{') {
            return Ok((input.to_string(), false));
        }
        let re = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)+)\}")
            .expect("valid regex");
        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        let mut expanded = false;

        for caps in re.captures_iter(input) {
            let whole = caps.get(0).expect("group 0 always present");
            let target = caps.get(1).map_or("", |m| m.as_str());
            out.push_str(&input[last..whole.start()]);

            let root = target.split('.').next().unwrap_or("");
            if matches!(root, KEY_DEFINITIONS | KEY_DATASET | KEY_TABLES) {
                out.push_str(&self.resolve_field(target, path)?);
                expanded = true;
            } else {
                out.push_str(whole.as_str());
            }
            last = whole.end();
        }
        out.push_str(&input[last..]);
        Ok((out, expanded))
    }

    /// Resolve a referenced field to its final text, memoized per pass.
    fn resolve_field(
        &mut self,
        target: &str,
        at: &FieldPath,
    ) -> Result<String, ResolveError> {
        if let Some(resolved) = self.memo.get(target) {
            return Ok(resolved.clone());
        }
        if self.visiting.iter().any(|v| v == target) {
            let mut cycle: Vec<&str> =
                self.visiting.iter().map(String::as_str).collect();
            cycle.push(target);
            return Err(ResolveError::CyclicReference {
                path: at.clone(),
                cycle: cycle.join(" -> "),
            });
        }

        let Some(value) = lookup_dotted(self.tree, target) else {
            return Err(ResolveError::MalformedTemplate {
                path: at.clone(),
                detail: format!("unknown field reference '{{{target}}}'"),
            });
        };

        let resolved = match value {
            Value::String(s) => {
                self.visiting.push(target.to_string());
                let result = self.resolve_scalar(s, &FieldPath::from_dotted(target));
                self.visiting.pop();
                result?
            }
            other => scalar_to_string(other).ok_or_else(|| {
                ResolveError::MalformedTemplate {
                    path: at.clone(),
                    detail: format!(
                        "field reference '{{{target}}}' resolves to a {}, not a scalar",
                        kind_name(other)
                    ),
                }
            })?,
        };

        self.memo.insert(target.to_string(), resolved.clone());
        Ok(resolved)
    }
}
