//! Two-phase template rendering for a single scalar.

use regex::Regex;

use crate::bindings::DimensionBindings;

use super::TemplateError;
use super::ast::{CmpOp, CondExpr, Expr, MacroDef, Method, Node};
use super::expr::parse_value_expr;
use super::macros::MacroTable;
use super::parser::parse_blocks;

/// Name lookup during one expansion: dimension bindings plus macro-parameter
/// locals, with locals shadowing dimensions of the same name.
struct Scope<'a> {
    bindings: &'a DimensionBindings,
    locals: Vec<(String, String)>,
}

impl Scope<'_> {
    fn get(&self, name: &str) -> Option<&str> {
        self.locals
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .or_else(|| self.bindings.get(name))
    }
}

/// Renders template scalars against one set of dimension bindings.
pub struct RenderEngine<'a> {
    bindings: &'a DimensionBindings,
    macros: &'a MacroTable,
    recursion_limit: usize,
}

impl<'a> RenderEngine<'a> {
    pub fn new(
        bindings: &'a DimensionBindings,
        macros: &'a MacroTable,
        recursion_limit: usize,
    ) -> Self {
        Self { bindings, macros, recursion_limit }
    }

    /// Control-flow phase: evaluate `<% %>` blocks, emit the taken branches.
    pub fn expand_control(&self, input: &str) -> Result<String, TemplateError> {
        let scope = Scope { bindings: self.bindings, locals: Vec::new() };
        self.expand_control_in(input, &scope, 0)
    }

    /// Substitution phase: expand every `<< expr >>` token.
    pub fn expand_substitutions(&self, input: &str) -> Result<String, TemplateError> {
        let scope = Scope { bindings: self.bindings, locals: Vec::new() };
        self.expand_substitutions_in(input, &scope, 0)
    }

    fn expand_control_in(
        &self,
        input: &str,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Result<String, TemplateError> {
        if !input.contains("<%") {
            return Ok(input.to_string());
        }
        let nodes = parse_blocks(input)?;
        self.eval_nodes(&nodes, scope, depth)
    }

    fn eval_nodes(
        &self,
        nodes: &[Node],
        scope: &Scope<'_>,
        depth: usize,
    ) -> Result<String, TemplateError> {
        let mut out = String::new();
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::If { cases, else_body } => {
                    let mut taken = false;
                    for (cond, body) in cases {
                        if self.eval_cond(cond, scope, depth)? {
                            out.push_str(&self.eval_nodes(body, scope, depth)?);
                            taken = true;
                            break;
                        }
                    }
                    if !taken && let Some(body) = else_body {
                        out.push_str(&self.eval_nodes(body, scope, depth)?);
                    }
                }
                // Declarations emit nothing.
                Node::MacroDef(_) => {}
            }
        }
        Ok(out)
    }

    fn expand_substitutions_in(
        &self,
        input: &str,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Result<String, TemplateError> {
        if !input.contains("<<") {
            return Ok(input.to_string());
        }
        let re = Regex::new(r"(?s)<<\s*([^<>]+?)\s*>>").expect("valid regex");
        let mut out = String::with_capacity(input.len());
        let mut last = 0;

        for caps in re.captures_iter(input) {
            let whole = caps.get(0).expect("group 0 always present");
            let expr_src = caps.get(1).map_or("", |m| m.as_str());

            out.push_str(&input[last..whole.start()]);
            let expr = parse_value_expr(expr_src)?;
            let value = self
                .eval_value(&expr, scope, depth, Strictness::Strict)?
                .unwrap_or_default();
            out.push_str(&value);
            last = whole.end();
        }
        out.push_str(&input[last..]);
        Ok(out)
    }

    /// Evaluate a substitution expression.
    ///
    /// In lenient mode (condition operands) an unbound dimension yields
    /// `None` instead of an error, so dead branches and absent-safe guards
    /// never raise `MissingDimension`.
    fn eval_value(
        &self,
        expr: &Expr,
        scope: &Scope<'_>,
        depth: usize,
        strictness: Strictness,
    ) -> Result<Option<String>, TemplateError> {
        match expr {
            Expr::Literal(lit) => Ok(Some(lit.clone())),
            Expr::Dimension(name) => match scope.get(name) {
                Some(value) => Ok(Some(value.to_string())),
                None if strictness == Strictness::Lenient => Ok(None),
                None => Err(TemplateError::MissingDimension(name.clone())),
            },
            Expr::Method { recv, method } => {
                let value = self.eval_value(recv, scope, depth, strictness)?;
                Ok(value.map(|v| apply_method(&v, *method)))
            }
            Expr::Concat(left, right) => {
                let left = self.eval_value(left, scope, depth, strictness)?;
                let right = self.eval_value(right, scope, depth, strictness)?;
                match (left, right) {
                    (Some(l), Some(r)) => Ok(Some(l + &r)),
                    _ => Ok(None),
                }
            }
            Expr::MacroCall { name, args } => {
                self.expand_macro_call(name, args, scope, depth, strictness)
            }
        }
    }

    fn expand_macro_call(
        &self,
        name: &str,
        args: &[Expr],
        scope: &Scope<'_>,
        depth: usize,
        strictness: Strictness,
    ) -> Result<Option<String>, TemplateError> {
        let Some(def) = self.macros.get(name) else {
            return Err(TemplateError::UnknownMacro(name.to_string()));
        };
        if args.len() != def.params.len() {
            return Err(TemplateError::Malformed(format!(
                "macro '{name}' expects {} argument(s), got {}",
                def.params.len(),
                args.len()
            )));
        }
        if depth >= self.recursion_limit {
            return Err(TemplateError::RecursionLimit {
                name: name.to_string(),
                limit: self.recursion_limit,
            });
        }

        let mut locals = Vec::with_capacity(args.len());
        for (param, arg) in def.params.iter().zip(args) {
            match self.eval_value(arg, scope, depth, strictness)? {
                Some(value) => locals.push((param.clone(), value)),
                None => return Ok(None),
            }
        }

        let inner = Scope { bindings: self.bindings, locals };
        Ok(Some(self.expand_macro_body(def, &inner, depth + 1)?))
    }

    /// Run a macro body through both phases with its parameters in scope.
    fn expand_macro_body(
        &self,
        def: &MacroDef,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Result<String, TemplateError> {
        let control = self.expand_control_in(&def.body, scope, depth)?;
        self.expand_substitutions_in(&control, scope, depth)
    }

    fn eval_cond(
        &self,
        cond: &CondExpr,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Result<bool, TemplateError> {
        match cond {
            CondExpr::Truthy(expr) => {
                let value = self.eval_value(expr, scope, depth, Strictness::Lenient)?;
                Ok(value.is_some_and(|v| !v.is_empty()))
            }
            CondExpr::Compare { left, op, right } => {
                let left = self.eval_value(left, scope, depth, Strictness::Lenient)?;
                let right = self.eval_value(right, scope, depth, Strictness::Lenient)?;
                Ok(match (left, right, op) {
                    (Some(l), Some(r), CmpOp::Eq) => l == r,
                    (Some(l), Some(r), CmpOp::Ne) => l != r,
                    // An unbound operand compares unequal to everything.
                    (_, _, CmpOp::Eq) => false,
                    (_, _, CmpOp::Ne) => true,
                })
            }
            CondExpr::In { needle, haystack, negated } => {
                let needle =
                    self.eval_value(needle, scope, depth, Strictness::Lenient)?;
                let contained =
                    needle.is_some_and(|v| haystack.iter().any(|item| item == &v));
                Ok(contained != *negated)
            }
            CondExpr::Not(inner) => Ok(!self.eval_cond(inner, scope, depth)?),
            CondExpr::And(left, right) => {
                Ok(self.eval_cond(left, scope, depth)?
                    && self.eval_cond(right, scope, depth)?)
            }
            CondExpr::Or(left, right) => {
                Ok(self.eval_cond(left, scope, depth)?
                    || self.eval_cond(right, scope, depth)?)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strictness {
    Strict,
    Lenient,
}

fn apply_method(value: &str, method: Method) -> String {
    match method {
        Method::Lower => value.to_lowercase(),
        Method::Upper => value.to_uppercase(),
        Method::Title => title_case(value),
    }
}

/// Uppercase the first alphabetic character of each whitespace-separated word.
fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for c in value.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Deterministic cleanup of the whitespace control-block removal leaves
/// behind: trailing spaces are trimmed per line, runs of 2+ blank lines
/// collapse to one, and leading/trailing blank lines are stripped.
pub fn normalize_whitespace(input: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut pending_blank = false;

    for line in input.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if !lines.is_empty() {
                pending_blank = true;
            }
        } else {
            if pending_blank {
                lines.push("");
                pending_blank = false;
            }
            lines.push(line);
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> DimensionBindings {
        DimensionBindings::from_pairs(pairs.iter().copied())
    }

    fn engine_render(
        source: &str,
        b: &DimensionBindings,
        macros: &MacroTable,
    ) -> Result<String, TemplateError> {
        let engine = RenderEngine::new(b, macros, 20);
        let control = engine.expand_control(source)?;
        engine.expand_substitutions(&control)
    }

    #[test]
    fn test_substitutes_bound_dimensions() {
        let b = bindings(&[("cause", "Malaria"), ("age", "15-19")]);
        let out = engine_render(
            "Deaths from <<cause.lower()>>, among individuals aged <<age>>",
            &b,
            &MacroTable::empty(),
        )
        .unwrap();
        assert_eq!(out, "Deaths from malaria, among individuals aged 15-19");
    }

    #[test]
    fn test_unbound_dimension_is_an_error() {
        let b = bindings(&[("cause", "Malaria")]);
        let err = engine_render("<<age>>", &b, &MacroTable::empty()).unwrap_err();
        assert_eq!(err, TemplateError::MissingDimension("age".into()));
    }

    #[test]
    fn test_dead_branch_never_evaluates() {
        // `y` is unbound but only referenced in the untaken branch.
        let b = bindings(&[("x", "b")]);
        let out = engine_render(
            "<% if x == 'a' %><<y>><% else %>fixed<% endif %>",
            &b,
            &MacroTable::empty(),
        )
        .unwrap();
        assert_eq!(out, "fixed");
    }

    #[test]
    fn test_unbound_dimension_in_condition_is_falsy() {
        let b = bindings(&[]);
        let out = engine_render(
            "<% if sex %>for <<sex>><% else %>for everyone<% endif %>",
            &b,
            &MacroTable::empty(),
        )
        .unwrap();
        assert_eq!(out, "for everyone");
    }

    #[test]
    fn test_concat_and_title() {
        let b = bindings(&[("metric", "rate")]);
        let out = engine_render("<<'Metric: ' ~ metric.title()>>", &b, &MacroTable::empty())
            .unwrap();
        assert_eq!(out, "Metric: Rate");
    }

    #[test]
    fn test_macro_expansion_binds_parameters() {
        let b = bindings(&[("sex", "Male")]);
        let mut table = MacroTable::empty();
        let source: serde_yaml::Value = serde_yaml::from_str(
            "m: \"<% macro format_sex(s) %><% if s == 'Male' %>males<% elif s == 'Female' %>females<% else %><<s.lower()>><% endif %><% endmacro %>\"",
        )
        .unwrap();
        table.collect_from(&source).unwrap();

        let out = engine_render("<<format_sex(sex)>>", &b, &table).unwrap();
        assert_eq!(out, "males");
    }

    #[test]
    fn test_macro_arity_mismatch_is_malformed() {
        let b = bindings(&[("sex", "Male")]);
        let mut table = MacroTable::empty();
        let source: serde_yaml::Value = serde_yaml::from_str(
            "m: \"<% macro format_sex(s) %>x<% endmacro %>\"",
        )
        .unwrap();
        table.collect_from(&source).unwrap();

        let err = engine_render("<<format_sex(sex, sex)>>", &b, &table).unwrap_err();
        assert!(matches!(err, TemplateError::Malformed(d) if d.contains("expects 1")));
    }

    #[test]
    fn test_unknown_macro() {
        let b = bindings(&[]);
        let err = engine_render("<<nope()>>", &b, &MacroTable::empty()).unwrap_err();
        assert_eq!(err, TemplateError::UnknownMacro("nope".into()));
    }

    #[test]
    fn test_self_referencing_macro_hits_recursion_limit() {
        let b = bindings(&[]);
        let mut table = MacroTable::empty();
        let source: serde_yaml::Value =
            serde_yaml::from_str("m: \"<% macro loop_() %><<loop_()>><% endmacro %>\"")
                .unwrap();
        table.collect_from(&source).unwrap();

        let engine = RenderEngine::new(&b, &table, 5);
        let control = engine.expand_control("<<loop_()>>").unwrap();
        let err = engine.expand_substitutions(&control).unwrap_err();
        assert_eq!(
            err,
            TemplateError::RecursionLimit { name: "loop_".into(), limit: 5 }
        );
    }

    #[test]
    fn test_normalize_whitespace_collapses_blank_runs() {
        let input = "\n\nFirst paragraph.   \n\n\n\nSecond paragraph.\n\n";
        assert_eq!(
            normalize_whitespace(input),
            "First paragraph.\n\nSecond paragraph."
        );
    }

    #[test]
    fn test_normalize_whitespace_is_idempotent() {
        let once = normalize_whitespace("a\n\n\nb\n");
        assert_eq!(normalize_whitespace(&once), once);
    }
}
