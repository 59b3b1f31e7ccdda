// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Template compilation: tokenizer and node tree.
//!
//! Compilation happens in two passes. The tokenizer splits Liquid source
//! into text, `{{ output }}` and `{% tag %}` tokens using `nom` over a
//! `nom_locate` span, so every token knows its line and column. The tree
//! builder then folds the flat token list into [`Node`]s, consulting the
//! [`TagRegistry`] to learn which custom tags take a body.
//!
//! Whitespace control (`{{-`, `-}}`, `{%-`, `-%}`) strips whitespace from
//! the neighbouring text when tokenizing.

use crate::error::{LavaError, Result};
use crate::expression::{Condition, Expression};
use crate::registry::{TagKind, TagRegistry};
use crate::rewrite::find_close;
use lazy_static::lazy_static;
use nom::branch::alt;
use nom::bytes::complete::{tag, take};
use nom::error::{Error as NomError, ErrorKind};
use nom::{IResult, Parser};
use nom_locate::LocatedSpan;
use regex::Regex;

type Span<'a> = LocatedSpan<&'a str>;

lazy_static! {
    static ref END_RAW: Regex = Regex::new(r"\{%-?\s*endraw\s*-?%\}").expect("endraw pattern is valid");
    static ref END_COMMENT: Regex =
        Regex::new(r"\{%-?\s*endcomment\s*-?%\}").expect("endcomment pattern is valid");
}

/// A compiled template node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text.
    Text(String),
    /// `{{ expression }}`.
    Output(Expression),
    /// `if`/`elsif`/`else` or `unless`/`else`.
    If {
        /// Conditions with their bodies, tried in order.
        branches: Vec<(Condition, Vec<Node>)>,
        /// Rendered when no branch matches.
        otherwise: Option<Vec<Node>>,
    },
    /// `{% assign name = expression %}`.
    Assign {
        /// Merge field name.
        name: String,
        /// Value expression.
        value: Expression,
    },
    /// A registered custom tag.
    Custom {
        /// Lower-cased tag name.
        name: String,
        /// Everything after the tag name, unparsed.
        markup: String,
        /// Body nodes; `None` for inline tags.
        body: Option<Vec<Node>>,
    },
}

/// A compiled template.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Compiles Liquid source. Shortcode and `elseif` rewriting must already
    /// have been applied.
    ///
    /// # Errors
    ///
    /// Returns [`LavaError::ParseError`] with the position of the offending
    /// token.
    pub fn parse(source: &str, registry: &TagRegistry) -> Result<Self> {
        let tokens = tokenize(source)?;
        let mut builder = TreeBuilder {
            tokens,
            pos: 0,
            registry,
            source,
        };
        let nodes = builder.build()?;
        Ok(Self {
            source: source.to_string(),
            nodes,
        })
    }

    /// The compiled nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The source the template was compiled from, after rewriting.
    pub fn source(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Text,
    Output,
    Tag,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    content: String,
    line: usize,
    column: usize,
    trim_left: bool,
    trim_right: bool,
}

impl Token {
    fn at(kind: TokenKind, span: &Span<'_>, content: String) -> Self {
        Self {
            kind,
            content,
            line: span.location_line() as usize,
            column: span.get_utf8_column(),
            trim_left: false,
            trim_right: false,
        }
    }

    fn delimited(kind: TokenKind, span: &Span<'_>, inner: &str) -> Self {
        let trim_left = inner.starts_with('-');
        let trim_right = inner.len() > usize::from(trim_left) && inner.ends_with('-');
        let start = usize::from(trim_left);
        let end = inner.len() - usize::from(trim_right);
        let mut token = Self::at(kind, span, inner[start..end].trim().to_string());
        token.trim_left = trim_left;
        token.trim_right = trim_right;
        token
    }

    /// Splits a tag token into keyword and markup.
    fn keyword(&self) -> (&str, &str) {
        let content = self.content.as_str();
        match content.find(char::is_whitespace) {
            Some(idx) => (&content[..idx], content[idx..].trim()),
            None => (content, ""),
        }
    }
}

fn take_bytes(input: Span<'_>, len: usize) -> IResult<Span<'_>, Span<'_>> {
    let count = input.fragment()[..len].chars().count();
    take(count).parse(input)
}

/// Byte length of the inner part of a delimited token.
///
/// Uses the rewriter's delimiter rules, so quotes inside nested `{{ }}` are
/// ignored and unbalanced quotes fall back to the first closer.
fn inner_len(text: &str, close: &'static [u8; 2]) -> Option<usize> {
    find_close(text.as_bytes(), 0, close)
}

fn delimited_token<'a>(
    input: Span<'a>,
    open: &'static str,
    close: &'static [u8; 2],
    kind: TokenKind,
) -> IResult<Span<'a>, Token> {
    let (after_open, _) = tag(open).parse(input)?;
    let len = inner_len(after_open.fragment(), close)
        .ok_or_else(|| nom::Err::Failure(NomError::new(input, ErrorKind::TakeUntil)))?;
    let (after_inner, inner) = take_bytes(after_open, len)?;
    let (rest, _) = take(2usize).parse(after_inner)?;
    Ok((rest, Token::delimited(kind, &input, inner.fragment())))
}

fn output_token(input: Span<'_>) -> IResult<Span<'_>, Token> {
    delimited_token(input, "{{", b"}}", TokenKind::Output)
}

fn tag_token(input: Span<'_>) -> IResult<Span<'_>, Token> {
    delimited_token(input, "{%", b"%}", TokenKind::Tag)
}

fn text_token(input: Span<'_>) -> IResult<Span<'_>, Token> {
    let fragment = input.fragment();
    let end = [fragment.find("{{"), fragment.find("{%")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(fragment.len());
    if end == 0 {
        return Err(nom::Err::Error(NomError::new(input, ErrorKind::TakeUntil)));
    }
    let (rest, text) = take_bytes(input, end)?;
    Ok((rest, Token::at(TokenKind::Text, &input, text.fragment().to_string())))
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut input = Span::new(source);
    let mut tokens: Vec<Token> = Vec::new();

    while !input.fragment().is_empty() {
        let (rest, token) = match alt((output_token, tag_token, text_token)).parse(input) {
            Ok(parsed) => parsed,
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let what = if e.input.fragment().starts_with("{{") {
                    "Unterminated output '{{': expected '}}'"
                } else {
                    "Unterminated tag '{%': expected '%}'"
                };
                return Err(span_error(source, &e.input, what));
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(span_error(source, &input, "Unexpected end of template"));
            }
        };
        input = rest;

        if token.kind == TokenKind::Tag {
            let keyword = token.keyword().0;
            if keyword == "raw" || keyword == "comment" {
                let end_pattern: &Regex = if keyword == "raw" { &END_RAW } else { &END_COMMENT };
                let found = end_pattern.find(input.fragment()).map(|m| (m.start(), m.end()));
                let Some((start, end)) = found else {
                    return Err(LavaError::parse(
                        source,
                        format!("'{}' tag was never closed", keyword),
                        token.line,
                        token.column,
                    ));
                };
                if keyword == "raw" {
                    let mut raw = Token::at(TokenKind::Text, &input, input.fragment()[..start].to_string());
                    raw.line = token.line;
                    raw.column = token.column;
                    tokens.push(raw);
                }
                let (rest, _) = take_bytes(input, end).map_err(|_| {
                    LavaError::parse(source, "Malformed raw block", token.line, token.column)
                })?;
                input = rest;
                continue;
            }
        }

        tokens.push(token);
    }

    apply_whitespace_control(&mut tokens);
    Ok(tokens)
}

fn apply_whitespace_control(tokens: &mut [Token]) {
    for i in 0..tokens.len() {
        if tokens[i].kind == TokenKind::Text {
            continue;
        }
        if tokens[i].trim_left && i > 0 && tokens[i - 1].kind == TokenKind::Text {
            let trimmed = tokens[i - 1].content.trim_end().to_string();
            tokens[i - 1].content = trimmed;
        }
        if tokens[i].trim_right && i + 1 < tokens.len() && tokens[i + 1].kind == TokenKind::Text {
            let trimmed = tokens[i + 1].content.trim_start().to_string();
            tokens[i + 1].content = trimmed;
        }
    }
}

fn span_error(source: &str, span: &Span<'_>, message: &str) -> LavaError {
    LavaError::parse(
        source,
        message,
        span.location_line() as usize,
        span.get_utf8_column(),
    )
}

struct TreeBuilder<'a> {
    tokens: Vec<Token>,
    pos: usize,
    registry: &'a TagRegistry,
    source: &'a str,
}

impl TreeBuilder<'_> {
    fn build(&mut self) -> Result<Vec<Node>> {
        let (nodes, _) = self.parse_until(&[])?;
        Ok(nodes)
    }

    fn error(&self, token: &Token, message: impl Into<String>) -> LavaError {
        LavaError::parse(self.source, message, token.line, token.column)
    }

    /// Parses nodes until a tag whose keyword is in `ends`, which is
    /// returned. Returns `None` at end of input.
    fn parse_until(&mut self, ends: &[&str]) -> Result<(Vec<Node>, Option<Token>)> {
        let mut nodes = Vec::new();

        while self.pos < self.tokens.len() {
            let token = self.tokens[self.pos].clone();
            self.pos += 1;

            match token.kind {
                TokenKind::Text => {
                    if !token.content.is_empty() {
                        nodes.push(Node::Text(token.content));
                    }
                }
                TokenKind::Output => {
                    let expr = Expression::parse(&token.content).map_err(|m| self.error(&token, m))?;
                    nodes.push(Node::Output(expr));
                }
                TokenKind::Tag => {
                    let (keyword, markup) = token.keyword();
                    let keyword = keyword.to_lowercase();

                    if ends.contains(&keyword.as_str()) {
                        return Ok((nodes, Some(token)));
                    }

                    match keyword.as_str() {
                        "if" => nodes.push(self.parse_conditional(&token, markup, false)?),
                        "unless" => nodes.push(self.parse_conditional(&token, markup, true)?),
                        "assign" => nodes.push(self.parse_assign(&token, markup)?),
                        "" => return Err(self.error(&token, "Empty tag")),
                        _ => nodes.push(self.parse_custom(&token, &keyword, markup)?),
                    }
                }
            }
        }

        Ok((nodes, None))
    }

    fn parse_conditional(&mut self, opening: &Token, markup: &str, negate: bool) -> Result<Node> {
        let name = if negate { "unless" } else { "if" };
        let end = if negate { "endunless" } else { "endif" };

        let first = Condition::parse(markup).map_err(|m| self.error(opening, m))?;
        let mut condition = if negate {
            Condition::Not(Box::new(first))
        } else {
            first
        };

        let mut branches = Vec::new();
        let mut otherwise = None;

        loop {
            let (body, terminator) = self.parse_until(&["elsif", "else", end])?;
            let terminator = terminator
                .ok_or_else(|| self.error(opening, format!("'{}' tag was never closed", name)))?;
            branches.push((condition, body));

            let (keyword, markup) = terminator.keyword();
            match keyword.to_lowercase().as_str() {
                "elsif" => {
                    condition = Condition::parse(markup).map_err(|m| self.error(&terminator, m))?;
                }
                "else" => {
                    let (body, closing) = self.parse_until(&[end])?;
                    if closing.is_none() {
                        return Err(self.error(opening, format!("'{}' tag was never closed", name)));
                    }
                    otherwise = Some(body);
                    break;
                }
                _ => break,
            }
        }

        Ok(Node::If { branches, otherwise })
    }

    fn parse_assign(&self, token: &Token, markup: &str) -> Result<Node> {
        let Some((name, value)) = markup.split_once('=') else {
            return Err(self.error(token, "Invalid assign syntax, expected 'name = value'"));
        };
        let name = name.trim();
        let valid = name.starts_with(|c: char| c.is_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_alphanumeric() || c == '_');
        if !valid {
            return Err(self.error(token, format!("Invalid variable name '{}'", name)));
        }
        let value = Expression::parse(value).map_err(|m| self.error(token, m))?;
        Ok(Node::Assign {
            name: name.to_string(),
            value,
        })
    }

    fn parse_custom(&mut self, token: &Token, keyword: &str, markup: &str) -> Result<Node> {
        let Some(registered) = self.registry.get(keyword) else {
            let message = if keyword.starts_with("end") || keyword == "else" || keyword == "elsif" {
                format!("Unexpected tag '{}'", keyword)
            } else {
                format!("Unknown tag '{}'", keyword)
            };
            return Err(self.error(token, message));
        };

        let name = registered.name.clone();
        let body = match registered.kind {
            TagKind::Inline => None,
            TagKind::Block => {
                let end = format!("end{}", name);
                let (body, closing) = self.parse_until(&[end.as_str()])?;
                if closing.is_none() {
                    return Err(self.error(token, format!("'{}' tag was never closed", name)));
                }
                Some(body)
            }
        };

        Ok(Node::Custom {
            name,
            markup: markup.to_string(),
            body,
        })
    }
}
