//! Fixed-grammar parser for substitution expressions and conditions.
//!
//! The grammar covers exactly the forms metadata authors use: bare dimension
//! names, quoted string literals, `.lower()`/`.upper()`/`.title()`, `~`
//! concatenation, macro calls, and boolean conditions built from `==`, `!=`,
//! `in`/`not in`, `and`, `or`, `not`. Anything else is a
//! [`TemplateError::Malformed`].

use super::TemplateError;
use super::ast::{CmpOp, CondExpr, Expr, Method};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Tilde,
    EqEq,
    NotEq,
}

fn lex(src: &str) -> Result<Vec<Tok>, TemplateError> {
    let mut toks = Vec::new();
    let mut chars = src.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Ident(ident));
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut lit = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    lit.push(c);
                }
                if !closed {
                    return Err(TemplateError::Malformed(format!(
                        "unterminated string literal in '{src}'"
                    )));
                }
                toks.push(Tok::Str(lit));
            }
            '(' => {
                chars.next();
                toks.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                toks.push(Tok::RParen);
            }
            '[' => {
                chars.next();
                toks.push(Tok::LBracket);
            }
            ']' => {
                chars.next();
                toks.push(Tok::RBracket);
            }
            ',' => {
                chars.next();
                toks.push(Tok::Comma);
            }
            '.' => {
                chars.next();
                toks.push(Tok::Dot);
            }
            '~' => {
                chars.next();
                toks.push(Tok::Tilde);
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    toks.push(Tok::EqEq);
                } else {
                    return Err(TemplateError::Malformed(format!(
                        "single '=' in '{src}' (use '==')"
                    )));
                }
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    toks.push(Tok::NotEq);
                } else {
                    return Err(TemplateError::Malformed(format!(
                        "unexpected '!' in '{src}'"
                    )));
                }
            }
            other => {
                return Err(TemplateError::Malformed(format!(
                    "unexpected character '{other}' in '{src}'"
                )));
            }
        }
    }
    Ok(toks)
}

const KEYWORDS: &[&str] = &["and", "or", "not", "in"];

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
    src: String,
}

impl Parser {
    fn new(src: &str) -> Result<Self, TemplateError> {
        Ok(Self { toks: lex(src)?, pos: 0, src: src.to_string() })
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Ident(id)) if id == kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> Result<(), TemplateError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.fail(&format!("expected {what}")))
        }
    }

    fn fail(&self, detail: &str) -> TemplateError {
        TemplateError::Malformed(format!("{detail} in '{}'", self.src))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    // expr := postfix ('~' postfix)*
    fn parse_concat(&mut self) -> Result<Expr, TemplateError> {
        let mut left = self.parse_postfix()?;
        while self.eat(&Tok::Tilde) {
            let right = self.parse_postfix()?;
            left = Expr::Concat(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // postfix := primary ('.' method '(' ')')*
    fn parse_postfix(&mut self) -> Result<Expr, TemplateError> {
        let mut expr = self.parse_primary()?;
        while self.eat(&Tok::Dot) {
            let Some(Tok::Ident(name)) = self.bump() else {
                return Err(self.fail("expected method name after '.'"));
            };
            let method = match name.as_str() {
                "lower" => Method::Lower,
                "upper" => Method::Upper,
                "title" => Method::Title,
                other => {
                    return Err(self.fail(&format!("unsupported method '{other}'")));
                }
            };
            self.expect(&Tok::LParen, "'(' after method name")?;
            self.expect(&Tok::RParen, "')' after method name")?;
            expr = Expr::Method { recv: Box::new(expr), method };
        }
        Ok(expr)
    }

    // primary := string | name | name '(' args ')'
    fn parse_primary(&mut self) -> Result<Expr, TemplateError> {
        match self.bump() {
            Some(Tok::Str(lit)) => Ok(Expr::Literal(lit)),
            Some(Tok::Ident(name)) => {
                if KEYWORDS.contains(&name.as_str()) {
                    return Err(self.fail(&format!("unexpected keyword '{name}'")));
                }
                if self.eat(&Tok::LParen) {
                    let mut args = Vec::new();
                    if !self.eat(&Tok::RParen) {
                        loop {
                            args.push(self.parse_concat()?);
                            if self.eat(&Tok::RParen) {
                                break;
                            }
                            self.expect(&Tok::Comma, "',' between macro arguments")?;
                        }
                    }
                    Ok(Expr::MacroCall { name, args })
                } else {
                    Ok(Expr::Dimension(name))
                }
            }
            _ => Err(self.fail("expected a value")),
        }
    }

    // cond := and_cond ('or' and_cond)*
    fn parse_or(&mut self) -> Result<CondExpr, TemplateError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = CondExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<CondExpr, TemplateError> {
        let mut left = self.parse_unary()?;
        while self.eat_keyword("and") {
            let right = self.parse_unary()?;
            left = CondExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<CondExpr, TemplateError> {
        if self.eat_keyword("not") {
            let inner = self.parse_unary()?;
            return Ok(CondExpr::Not(Box::new(inner)));
        }
        if self.eat(&Tok::LParen) {
            let inner = self.parse_or()?;
            self.expect(&Tok::RParen, "closing ')'")?;
            return Ok(inner);
        }
        self.parse_comparison()
    }

    // comparison := concat (('==' | '!=') concat | ['not'] 'in' list)?
    fn parse_comparison(&mut self) -> Result<CondExpr, TemplateError> {
        let left = self.parse_concat()?;

        if self.eat(&Tok::EqEq) {
            let right = self.parse_concat()?;
            return Ok(CondExpr::Compare { left, op: CmpOp::Eq, right });
        }
        if self.eat(&Tok::NotEq) {
            let right = self.parse_concat()?;
            return Ok(CondExpr::Compare { left, op: CmpOp::Ne, right });
        }
        if self.eat_keyword("not") {
            if !self.eat_keyword("in") {
                return Err(self.fail("expected 'in' after 'not'"));
            }
            let haystack = self.parse_list()?;
            return Ok(CondExpr::In { needle: left, haystack, negated: true });
        }
        if self.eat_keyword("in") {
            let haystack = self.parse_list()?;
            return Ok(CondExpr::In { needle: left, haystack, negated: false });
        }
        Ok(CondExpr::Truthy(left))
    }

    // list := '[' (string (',' string)*)? ']'
    fn parse_list(&mut self) -> Result<Vec<String>, TemplateError> {
        self.expect(&Tok::LBracket, "'[' to open membership list")?;
        let mut items = Vec::new();
        if self.eat(&Tok::RBracket) {
            return Ok(items);
        }
        loop {
            match self.bump() {
                Some(Tok::Str(lit)) => items.push(lit),
                _ => return Err(self.fail("membership lists hold string literals")),
            }
            if self.eat(&Tok::RBracket) {
                break;
            }
            self.expect(&Tok::Comma, "',' between list items")?;
        }
        Ok(items)
    }
}

/// Parse the contents of a `<< >>` token.
pub fn parse_value_expr(src: &str) -> Result<Expr, TemplateError> {
    let mut parser = Parser::new(src)?;
    let expr = parser.parse_concat()?;
    if parser.at_end() {
        Ok(expr)
    } else {
        Err(parser.fail("trailing input after expression"))
    }
}

/// Parse the condition of an `<% if %>` / `<% elif %>` tag.
pub fn parse_condition(src: &str) -> Result<CondExpr, TemplateError> {
    let mut parser = Parser::new(src)?;
    let cond = parser.parse_or()?;
    if parser.at_end() {
        Ok(cond)
    } else {
        Err(parser.fail("trailing input after condition"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_dimension() {
        assert_eq!(parse_value_expr("age").unwrap(), Expr::Dimension("age".into()));
    }

    #[test]
    fn test_parse_method_chain() {
        let expr = parse_value_expr("cause.lower()").unwrap();
        assert_eq!(
            expr,
            Expr::Method {
                recv: Box::new(Expr::Dimension("cause".into())),
                method: Method::Lower
            }
        );
    }

    #[test]
    fn test_parse_concat_and_literal() {
        let expr = parse_value_expr("'aged ' ~ age").unwrap();
        assert_eq!(
            expr,
            Expr::Concat(
                Box::new(Expr::Literal("aged ".into())),
                Box::new(Expr::Dimension("age".into()))
            )
        );
    }

    #[test]
    fn test_parse_macro_call() {
        let expr = parse_value_expr("format_sex(sex, 'long')").unwrap();
        assert_eq!(
            expr,
            Expr::MacroCall {
                name: "format_sex".into(),
                args: vec![
                    Expr::Dimension("sex".into()),
                    Expr::Literal("long".into())
                ],
            }
        );
    }

    #[test]
    fn test_parse_unsupported_method() {
        let err = parse_value_expr("cause.strip()").unwrap_err();
        assert!(matches!(err, TemplateError::Malformed(d) if d.contains("strip")));
    }

    #[test]
    fn test_parse_condition_precedence() {
        // `not` binds tighter than `and`, `and` tighter than `or`.
        let cond = parse_condition("not a and b or c").unwrap();
        assert!(matches!(cond, CondExpr::Or(_, _)));
    }

    #[test]
    fn test_parse_membership() {
        let cond = parse_condition("metric not in ['Rate', 'Share']").unwrap();
        assert_eq!(
            cond,
            CondExpr::In {
                needle: Expr::Dimension("metric".into()),
                haystack: vec!["Rate".into(), "Share".into()],
                negated: true,
            }
        );
    }

    #[test]
    fn test_parse_single_equals_is_malformed() {
        let err = parse_condition("sex = 'Male'").unwrap_err();
        assert!(matches!(err, TemplateError::Malformed(_)));
    }

    #[test]
    fn test_trailing_input_is_malformed() {
        let err = parse_value_expr("age sex").unwrap_err();
        assert!(matches!(err, TemplateError::Malformed(_)));
    }
}
