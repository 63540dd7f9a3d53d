//! Tag scanner and block parser for `<% %>` control structures.

use regex::Regex;

use super::TemplateError;
use super::ast::{CondExpr, MacroDef, Node};
use super::expr::parse_condition;

/// A scanned piece of template source.
#[derive(Debug)]
enum Piece<'a> {
    Text(&'a str),
    Tag { content: &'a str, start: usize, end: usize },
}

/// Split source into literal text and `<% ... %>` tags.
///
/// Whitespace-control dashes (`<%-`, `-%>`) are accepted and ignored; the
/// renderer's whitespace normalization covers what they would chomp.
fn scan(source: &str) -> Vec<Piece<'_>> {
    let re = Regex::new(r"(?s)<%-?\s*(.*?)\s*-?%>").expect("valid regex");
    let mut pieces = Vec::new();
    let mut last = 0;

    for caps in re.captures_iter(source) {
        let whole = caps.get(0).expect("group 0 always present");
        let content = caps.get(1).map_or("", |m| m.as_str());
        if whole.start() > last {
            pieces.push(Piece::Text(&source[last..whole.start()]));
        }
        pieces.push(Piece::Tag { content, start: whole.start(), end: whole.end() });
        last = whole.end();
    }
    if last < source.len() {
        pieces.push(Piece::Text(&source[last..]));
    }
    pieces
}

/// Head of a tag that terminates or continues a block.
enum BranchTag {
    Elif(CondExpr),
    Else,
    Endif,
}

struct BlockParser<'a> {
    source: &'a str,
    pieces: Vec<Piece<'a>>,
    pos: usize,
}

impl<'a> BlockParser<'a> {
    /// Parse a body; `inside_if` controls whether branch tags may terminate
    /// it. Returns the parsed nodes and the terminating branch tag, if any.
    fn parse_body(
        &mut self,
        inside_if: bool,
    ) -> Result<(Vec<Node>, Option<BranchTag>), TemplateError> {
        let mut nodes = Vec::new();

        while self.pos < self.pieces.len() {
            match &self.pieces[self.pos] {
                Piece::Text(text) => {
                    nodes.push(Node::Text((*text).to_string()));
                    self.pos += 1;
                }
                Piece::Tag { content, end, .. } => {
                    let content = *content;
                    let tag_end = *end;
                    let (keyword, rest) = split_keyword(content);
                    match keyword {
                        "if" => {
                            self.pos += 1;
                            nodes.push(self.parse_if(rest)?);
                        }
                        "macro" => {
                            self.pos += 1;
                            nodes.push(self.parse_macro(rest, tag_end)?);
                        }
                        "elif" | "else" | "endif" if inside_if => {
                            self.pos += 1;
                            let tag = match keyword {
                                "elif" => BranchTag::Elif(parse_condition(rest)?),
                                "else" => BranchTag::Else,
                                _ => BranchTag::Endif,
                            };
                            return Ok((nodes, Some(tag)));
                        }
                        "elif" | "else" | "endif" => {
                            return Err(TemplateError::Malformed(format!(
                                "'{keyword}' without matching 'if'"
                            )));
                        }
                        "endmacro" => {
                            return Err(TemplateError::Malformed(
                                "'endmacro' without matching 'macro'".to_string(),
                            ));
                        }
                        other => {
                            return Err(TemplateError::Malformed(format!(
                                "unknown tag '{other}'"
                            )));
                        }
                    }
                }
            }
        }
        Ok((nodes, None))
    }

    fn parse_if(&mut self, cond_src: &str) -> Result<Node, TemplateError> {
        let mut cases = Vec::new();
        let mut current = parse_condition(cond_src)?;

        loop {
            let (body, branch) = self.parse_body(true)?;
            match branch {
                Some(BranchTag::Elif(cond)) => {
                    cases.push((current, body));
                    current = cond;
                }
                Some(BranchTag::Else) => {
                    cases.push((current, body));
                    let (else_body, branch) = self.parse_body(true)?;
                    match branch {
                        Some(BranchTag::Endif) => {
                            return Ok(Node::If { cases, else_body: Some(else_body) });
                        }
                        Some(_) => {
                            return Err(TemplateError::Malformed(
                                "branch after 'else'".to_string(),
                            ));
                        }
                        None => {
                            return Err(TemplateError::Malformed(
                                "unterminated 'if' (missing 'endif')".to_string(),
                            ));
                        }
                    }
                }
                Some(BranchTag::Endif) => {
                    cases.push((current, body));
                    return Ok(Node::If { cases, else_body: None });
                }
                None => {
                    return Err(TemplateError::Malformed(
                        "unterminated 'if' (missing 'endif')".to_string(),
                    ));
                }
            }
        }
    }

    /// Capture a macro declaration. The body is the raw source between the
    /// `macro` and `endmacro` tags; macros do not nest.
    fn parse_macro(
        &mut self,
        signature: &str,
        body_start: usize,
    ) -> Result<Node, TemplateError> {
        let (name, params) = parse_signature(signature)?;

        while self.pos < self.pieces.len() {
            if let Piece::Tag { content, start, .. } = &self.pieces[self.pos] {
                let (keyword, _) = split_keyword(content);
                if keyword == "endmacro" {
                    let body = self.source[body_start..*start].to_string();
                    self.pos += 1;
                    return Ok(Node::MacroDef(MacroDef { name, params, body }));
                }
                if keyword == "macro" {
                    return Err(TemplateError::Malformed(format!(
                        "nested 'macro' inside '{name}'"
                    )));
                }
            }
            self.pos += 1;
        }
        Err(TemplateError::Malformed(format!(
            "unterminated 'macro {name}' (missing 'endmacro')"
        )))
    }
}

fn split_keyword(content: &str) -> (&str, &str) {
    let trimmed = content.trim();
    match trimmed.find(char::is_whitespace) {
        Some(idx) => (&trimmed[..idx], trimmed[idx..].trim_start()),
        None => (trimmed, ""),
    }
}

fn parse_signature(signature: &str) -> Result<(String, Vec<String>), TemplateError> {
    let re = Regex::new(r"^(\w+)\s*\(([^)]*)\)$").expect("valid regex");
    let Some(caps) = re.captures(signature.trim()) else {
        return Err(TemplateError::Malformed(format!(
            "invalid macro signature '{signature}'"
        )));
    };
    let name = caps[1].to_string();
    let params = caps[2]
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ToOwned::to_owned)
        .collect();
    Ok((name, params))
}

/// Parse template source into block nodes.
pub fn parse_blocks(source: &str) -> Result<Vec<Node>, TemplateError> {
    let mut parser = BlockParser { source, pieces: scan(source), pos: 0 };
    let (nodes, branch) = parser.parse_body(false)?;
    debug_assert!(branch.is_none());
    Ok(nodes)
}
