//! Resolution error taxonomy.
//!
//! Every variant is a deterministic, non-retryable authoring-time error: it
//! points at a defect in the template document or in the caller-supplied
//! bindings, never a transient fault. Each carries the document path of the
//! offending field so the error can be traced back to a source line.

use thiserror::Error;

use crate::document::FieldPath;
use crate::merge::MergeError;
use crate::template::TemplateError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A substitution referenced a dimension the caller did not bind.
    #[error("missing dimension '{name}' at {path}")]
    MissingDimension { name: String, path: FieldPath },

    /// Field references form a cycle.
    #[error("cyclic field reference at {path}: {cycle}")]
    CyclicReference { path: FieldPath, cycle: String },

    /// A macro invocation named an undeclared macro.
    #[error("unknown macro '{name}' at {path}")]
    UnknownMacro { name: String, path: FieldPath },

    /// Unbalanced control tags or an expression outside the fixed grammar.
    #[error("malformed template at {path}: {detail}")]
    MalformedTemplate { path: FieldPath, detail: String },

    /// Macro expansion exceeded the configured depth bound.
    #[error("macro recursion limit ({limit}) exceeded at {path} while expanding '{name}'")]
    RecursionLimitExceeded { name: String, limit: usize, path: FieldPath },
}

impl ResolveError {
    /// Attach a document path to a path-free template error.
    pub(crate) fn from_template(error: TemplateError, path: &FieldPath) -> Self {
        let path = path.clone();
        match error {
            TemplateError::MissingDimension(name) => {
                Self::MissingDimension { name, path }
            }
            TemplateError::UnknownMacro(name) => Self::UnknownMacro { name, path },
            TemplateError::Malformed(detail) => {
                Self::MalformedTemplate { path, detail }
            }
            TemplateError::RecursionLimit { name, limit } => {
                Self::RecursionLimitExceeded { name, limit, path }
            }
        }
    }

    /// A non-mergeable merge key is a document-authoring defect.
    pub(crate) fn from_merge(error: MergeError) -> Self {
        Self::MalformedTemplate {
            path: error.path,
            detail: format!(
                "merge key '<<' holds a {}, not a mapping or a sequence of mappings",
                error.kind
            ),
        }
    }

    /// The document path the error was reported at.
    pub fn path(&self) -> &FieldPath {
        match self {
            Self::MissingDimension { path, .. }
            | Self::CyclicReference { path, .. }
            | Self::UnknownMacro { path, .. }
            | Self::MalformedTemplate { path, .. }
            | Self::RecursionLimitExceeded { path, .. } => path,
        }
    }
}
