//! Macro declarations: collection and lookup.
//!
//! Macros are declared with `<% macro name(params) %> body <% endmacro %>`
//! inside `definitions` or a document-local `macros` field, and are lexically
//! scoped to the document being resolved. Cross-document imports are the
//! loader's concern and happen before resolution.

use std::collections::HashMap;

use serde_yaml::Value;

use super::TemplateError;
use super::ast::{MacroDef, Node};
use super::parser::parse_blocks;

#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    by_name: HashMap<String, MacroDef>,
}

impl MacroTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn insert(&mut self, def: MacroDef) -> Result<(), TemplateError> {
        if self.by_name.contains_key(&def.name) {
            return Err(TemplateError::Malformed(format!(
                "macro '{}' declared more than once",
                def.name
            )));
        }
        self.by_name.insert(def.name.clone(), def);
        Ok(())
    }

    /// Harvest macro declarations from every scalar under a subtree.
    pub(crate) fn collect_from(&mut self, value: &Value) -> Result<(), TemplateError> {
        match value {
            Value::String(s) if s.contains("<%") => {
                for node in parse_blocks(s)? {
                    if let Node::MacroDef(def) = node {
                        self.insert(def)?;
                    }
                }
                Ok(())
            }
            Value::Sequence(seq) => {
                for item in seq {
                    self.collect_from(item)?;
                }
                Ok(())
            }
            Value::Mapping(map) => {
                for (_, item) in map {
                    self.collect_from(item)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
