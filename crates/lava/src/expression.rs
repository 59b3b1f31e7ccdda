// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Output expressions and conditions for the host engine.
//!
//! The engine understands a deliberately small expression language:
//!
//! - merge field paths: `Person.NickName`, `Items[0]`, `Items.first`,
//!   `Row['Display Name']`
//! - literals: `'text'`, `"text"`, `42`, `-1.5`, `true`, `false`, `nil`,
//!   `empty`
//! - conditions: `==`, `!=`, `<>`, `<`, `>`, `<=`, `>=`, `contains`,
//!   combined with `and` / `or` and evaluated right to left
//!
//! Filters are not supported.

use crate::context::RenderContext;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while};
use nom::character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, multispace1};
use nom::combinator::{all_consuming, opt, recognize};
use nom::multi::{many0, many0_count};
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::{IResult, Parser};
use serde_json::Value;
use std::cmp::Ordering;

/// A value-producing expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A constant.
    Literal(Value),
    /// A merge field path; the first segment names the merge field.
    Path(Vec<String>),
    /// The `empty` keyword, equal to `""`, `[]` and `{}`.
    Empty,
}

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `==`
    Equal,
    /// `!=` or `<>`
    NotEqual,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `<=`
    LessOrEqual,
    /// `>=`
    GreaterOrEqual,
    /// `contains`
    Contains,
}

/// A boolean condition used by `if`, `elsif` and `unless`.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Truthiness of a single expression.
    Truthy(Expression),
    /// A binary comparison.
    Compare {
        /// Left operand.
        left: Expression,
        /// Operator.
        op: Comparison,
        /// Right operand.
        right: Expression,
    },
    /// Both sides hold.
    And(Box<Condition>, Box<Condition>),
    /// Either side holds.
    Or(Box<Condition>, Box<Condition>),
    /// Negation, produced by `unless`.
    Not(Box<Condition>),
}

impl Expression {
    /// Parses a complete expression.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when `text` is not a single
    /// path or literal.
    pub fn parse(text: &str) -> Result<Self, String> {
        let invalid = || format!("Invalid expression '{}'", text.trim());
        let (rest, expr) = delimited(multispace0, expression, multispace0)
            .parse(text)
            .map_err(|_: nom::Err<nom::error::Error<&str>>| invalid())?;
        match rest.chars().next() {
            None => Ok(expr),
            Some('|') => Err(format!("Filters are not supported in '{}'", text.trim())),
            Some(_) => Err(invalid()),
        }
    }

    /// Evaluates against `ctx`. Missing merge fields evaluate to `null`.
    pub fn evaluate(&self, ctx: &RenderContext) -> Value {
        match self {
            Expression::Literal(value) => value.clone(),
            Expression::Path(segments) => ctx.get_value_path(segments).cloned().unwrap_or(Value::Null),
            Expression::Empty => Value::String(String::new()),
        }
    }
}

impl Condition {
    /// Parses a condition such as `a == 'x' or b contains 2`.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem for malformed conditions.
    pub fn parse(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Err("Missing condition".to_string());
        }
        all_consuming(terminated(condition, multispace0))
            .parse(text)
            .map(|(_, cond)| cond)
            .map_err(|_| format!("Invalid condition '{}'", text.trim()))
    }

    /// Evaluates against `ctx`.
    pub fn evaluate(&self, ctx: &RenderContext) -> bool {
        match self {
            Condition::Truthy(expr) => is_truthy(&expr.evaluate(ctx)),
            Condition::Compare { left, op, right } => compare(left, *op, right, ctx),
            Condition::And(a, b) => a.evaluate(ctx) && b.evaluate(ctx),
            Condition::Or(a, b) => a.evaluate(ctx) || b.evaluate(ctx),
            Condition::Not(inner) => !inner.evaluate(ctx),
        }
    }
}

/// Liquid truthiness: only `null` and `false` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// Converts a value to its rendered text.
///
/// Strings render raw, `null` renders empty, arrays concatenate their items
/// and objects render as JSON.
pub fn to_output(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(to_output).collect(),
        Value::Object(_) => value.to_string(),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare(left: &Expression, op: Comparison, right: &Expression, ctx: &RenderContext) -> bool {
    if matches!(op, Comparison::Equal | Comparison::NotEqual)
        && (*left == Expression::Empty || *right == Expression::Empty)
    {
        let other = if *left == Expression::Empty { right } else { left };
        let empty = is_empty_value(&other.evaluate(ctx));
        return if op == Comparison::Equal { empty } else { !empty };
    }

    let a = left.evaluate(ctx);
    let b = right.evaluate(ctx);

    match op {
        Comparison::Equal => values_equal(&a, &b),
        Comparison::NotEqual => !values_equal(&a, &b),
        Comparison::Less => order(&a, &b) == Some(Ordering::Less),
        Comparison::Greater => order(&a, &b) == Some(Ordering::Greater),
        Comparison::LessOrEqual => matches!(order(&a, &b), Some(Ordering::Less | Ordering::Equal)),
        Comparison::GreaterOrEqual => {
            matches!(order(&a, &b), Some(Ordering::Greater | Ordering::Equal))
        }
        Comparison::Contains => match (&a, &b) {
            (Value::String(hay), needle) => hay.contains(to_output(needle).as_str()),
            (Value::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
            (Value::Object(map), Value::String(key)) => map.contains_key(key),
            _ => false,
        },
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_"), tag("?")))),
    ))
    .parse(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
    ))
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, Expression> {
    quoted
        .map(|s: &str| Expression::Literal(Value::String(s.to_string())))
        .parse(input)
}

fn number_literal(input: &str) -> IResult<&str, Expression> {
    let (rest, text) = recognize((opt(char('-')), digit1, opt(pair(char('.'), digit1)))).parse(input)?;

    if rest.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        )));
    }

    let value = match text.parse::<i64>() {
        Ok(i) => Value::from(i),
        Err(_) => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    };
    Ok((rest, Expression::Literal(value)))
}

fn path_segment(input: &str) -> IResult<&str, String> {
    alt((
        preceded(char('.'), identifier).map(str::to_string),
        preceded(char('.'), digit1).map(str::to_string),
        delimited(
            char('['),
            delimited(multispace0, alt((digit1, quoted)), multispace0),
            char(']'),
        )
        .map(str::to_string),
    ))
    .parse(input)
}

fn path_or_keyword(input: &str) -> IResult<&str, Expression> {
    let (rest, (head, tail)) = pair(identifier, many0(path_segment)).parse(input)?;

    if tail.is_empty() {
        let keyword = match head {
            "true" => Some(Expression::Literal(Value::Bool(true))),
            "false" => Some(Expression::Literal(Value::Bool(false))),
            "nil" | "null" => Some(Expression::Literal(Value::Null)),
            "empty" | "blank" => Some(Expression::Empty),
            _ => None,
        };
        if let Some(expr) = keyword {
            return Ok((rest, expr));
        }
    }

    let mut segments = Vec::with_capacity(tail.len() + 1);
    segments.push(head.to_string());
    segments.extend(tail);
    Ok((rest, Expression::Path(segments)))
}

fn expression(input: &str) -> IResult<&str, Expression> {
    alt((string_literal, number_literal, path_or_keyword)).parse(input)
}

fn operator(input: &str) -> IResult<&str, Comparison> {
    alt((
        tag("==").map(|_| Comparison::Equal),
        tag("!=").map(|_| Comparison::NotEqual),
        tag("<>").map(|_| Comparison::NotEqual),
        tag(">=").map(|_| Comparison::GreaterOrEqual),
        tag("<=").map(|_| Comparison::LessOrEqual),
        tag(">").map(|_| Comparison::Greater),
        tag("<").map(|_| Comparison::Less),
        terminated(tag("contains"), multispace1).map(|_| Comparison::Contains),
    ))
    .parse(input)
}

fn comparison(input: &str) -> IResult<&str, Condition> {
    let (input, left) = preceded(multispace0, expression).parse(input)?;
    let (input, op) = opt(preceded(multispace0, operator)).parse(input)?;

    match op {
        Some(op) => {
            let (input, right) = preceded(multispace0, expression).parse(input)?;
            Ok((input, Condition::Compare { left, op, right }))
        }
        None => Ok((input, Condition::Truthy(left))),
    }
}

#[derive(Clone, Copy)]
enum Joiner {
    And,
    Or,
}

fn joiner(input: &str) -> IResult<&str, Joiner> {
    delimited(
        multispace1,
        alt((tag("and").map(|_| Joiner::And), tag("or").map(|_| Joiner::Or))),
        multispace1,
    )
    .parse(input)
}

fn condition(input: &str) -> IResult<&str, Condition> {
    let (input, first) = comparison(input)?;
    let (input, rest) = many0(pair(joiner, comparison)).parse(input)?;

    // Liquid groups right to left: `a or b and c` is `a or (b and c)`.
    let mut pending = Vec::with_capacity(rest.len());
    let mut current = first;
    for (join, cond) in rest {
        pending.push((current, join));
        current = cond;
    }

    let mut result = current;
    while let Some((left, join)) = pending.pop() {
        result = match join {
            Joiner::And => Condition::And(Box::new(left), Box::new(result)),
            Joiner::Or => Condition::Or(Box::new(left), Box::new(result)),
        };
    }

    Ok((input, result))
}
