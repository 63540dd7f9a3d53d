//! Template parsing and rendering for metadata scalars.
//!
//! A templated scalar goes through two phases:
//! 1. **Control flow**: `<% if / elif / else / endif %>` blocks are parsed
//!    into an AST and evaluated against the dimension bindings; only the text
//!    of the taken branch is emitted. `<% macro %>` blocks render to nothing.
//! 2. **Substitution**: `<< expr >>` tokens are expanded: bare dimension
//!    names, macro calls, and a fixed set of expression forms (string
//!    literals, `.lower()`/`.upper()`/`.title()`, `~` concatenation). There
//!    is no general-purpose evaluation.
//!
//! Errors here are path-free; the resolver attaches the document path.

pub mod ast;
pub mod expr;
pub mod macros;
pub mod parser;
pub mod render;

use thiserror::Error;

pub use ast::{CmpOp, CondExpr, Expr, MacroDef, Method, Node};
pub use macros::MacroTable;
pub use render::{RenderEngine, normalize_whitespace};

/// Template-level errors, without document-path context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("missing dimension '{0}'")]
    MissingDimension(String),

    #[error("unknown macro '{0}'")]
    UnknownMacro(String),

    #[error("malformed template: {0}")]
    Malformed(String),

    #[error("macro recursion limit ({limit}) exceeded while expanding '{name}'")]
    RecursionLimit { name: String, limit: usize },
}
