//! Template AST: block nodes, substitution expressions, conditions.

/// A substitution expression inside `<< >>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A quoted string literal.
    Literal(String),
    /// A bare dimension name, substituted with its bound value.
    Dimension(String),
    /// A method call on another expression, e.g. `cause.lower()`.
    Method { recv: Box<Expr>, method: Method },
    /// String concatenation with `~`.
    Concat(Box<Expr>, Box<Expr>),
    /// A declared macro invoked with argument expressions.
    MacroCall { name: String, args: Vec<Expr> },
}

/// The enumerable set of supported methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Lower,
    Upper,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
}

/// A boolean condition inside `<% if %>` / `<% elif %>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CondExpr {
    /// Bare value: true when bound and non-empty.
    Truthy(Expr),
    /// String equality / inequality.
    Compare { left: Expr, op: CmpOp, right: Expr },
    /// Membership in a list of string literals.
    In { needle: Expr, haystack: Vec<String>, negated: bool },
    Not(Box<CondExpr>),
    And(Box<CondExpr>, Box<CondExpr>),
    Or(Box<CondExpr>, Box<CondExpr>),
}

/// One node of a parsed template body.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    If {
        /// `(condition, body)` pairs: the `if` branch and any `elif`s.
        cases: Vec<(CondExpr, Vec<Node>)>,
        else_body: Option<Vec<Node>>,
    },
    /// Declaration block; emits nothing when rendered.
    MacroDef(MacroDef),
}

/// A `<% macro name(params) %> body <% endmacro %>` declaration.
///
/// The body is kept as raw source and re-expanded through both template
/// phases at every invocation, with formal parameters bound to the actual
/// argument values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: String,
}
