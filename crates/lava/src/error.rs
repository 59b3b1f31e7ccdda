// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the Lava templating core.
//!
//! This module defines [`LavaError`], the error enum returned by the host
//! engine, and [`SourceContext`] for rich compile error reporting.
//!
//! # Error Categories
//!
//! - **Parse errors**: the rewritten template is not valid for the engine
//! - **Render errors**: an expression or tag failed while rendering
//! - **Script errors**: a Lua-backed block could not be loaded
//! - **Configuration errors**: invalid engine options or registrations
//!
//! Most problems a template author can cause never surface here. Bad tag
//! markup degrades silently, denied commands and domain failures are written
//! into the output or the `Error` merge field. Only a template that cannot be
//! compiled propagates as a hard failure.

use std::fmt;
use thiserror::Error;

/// Source context for compile error messages.
///
/// Captures a snippet of source code around an error location,
/// enabling messages with line numbers and a caret under the column.
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// All lines from the source.
    pub lines: Vec<String>,
    /// The line number where the error occurred (1-indexed).
    pub error_line: usize,
    /// The column number where the error occurred (1-indexed).
    pub error_column: usize,
    /// First line number of the snippet (1-indexed).
    pub snippet_start: usize,
    /// Last line number of the snippet (1-indexed).
    pub snippet_end: usize,
}

impl SourceContext {
    /// Creates a source context from source text and an error location.
    ///
    /// Captures up to 2 lines before and after the error line.
    pub fn from_source(source: &str, line: usize, column: usize) -> Self {
        let lines: Vec<String> = source.lines().map(|l| l.to_string()).collect();
        let snippet_start = line.saturating_sub(2).max(1);
        let snippet_end = (line + 2).min(lines.len());

        Self {
            lines,
            error_line: line,
            error_column: column,
            snippet_start,
            snippet_end,
        }
    }

    /// Formats the snippet with line numbers and an error indicator.
    ///
    /// ```text
    ///    1 | {% if x %}
    ///    2 | {% endfor %}
    ///      | ^
    /// ```
    pub fn format_snippet(&self) -> String {
        let mut result = String::new();

        for line_num in self.snippet_start..=self.snippet_end {
            if line_num == 0 || line_num > self.lines.len() {
                break;
            }

            let line = &self.lines[line_num - 1];
            result.push_str(&format!("{:4} | {}\n", line_num, line));

            if line_num == self.error_line {
                result.push_str(&format!(
                    "     | {}^\n",
                    " ".repeat(self.error_column.saturating_sub(1))
                ));
            }
        }

        result
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_snippet())
    }
}

/// Displays an optional [`SourceContext`], rendering nothing for `None`.
pub struct OptSourceContextDisplay<'a>(pub &'a Option<SourceContext>);

impl fmt::Display for OptSourceContextDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ctx) => write!(f, "{}", ctx),
            None => Ok(()),
        }
    }
}

/// Helper trait for formatting optional source context.
pub trait AsDisplay<'a> {
    /// Wraps self for Display formatting.
    fn as_display(&'a self) -> OptSourceContextDisplay<'a>;
}

impl<'a> AsDisplay<'a> for Option<SourceContext> {
    fn as_display(&'a self) -> OptSourceContextDisplay<'a> {
        OptSourceContextDisplay(self)
    }
}

/// The main error type for Lava operations.
#[derive(Error, Debug)]
pub enum LavaError {
    /// The template could not be compiled.
    #[error("Parse error: {message} at line {line}, column {column}\n{}", source_context.as_display())]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Line number where the error occurred.
        line: usize,
        /// Column number where the error occurred.
        column: usize,
        /// Source context for rich error display.
        source_context: Option<SourceContext>,
    },

    /// An expression or tag failed while rendering.
    #[error("Render error: {0}")]
    RenderError(String),

    /// A Lua-backed block could not be loaded or executed.
    #[error("Script error in '{tag}': {message}")]
    ScriptError {
        /// The tag whose script failed.
        tag: String,
        /// The Lua error message.
        message: String,
    },

    /// Engine options or a tag registration are invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A compiled template cache operation failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Merge field data could not be converted.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LavaError {
    /// Builds a parse error with a snippet of the offending source.
    pub fn parse(source: &str, message: impl Into<String>, line: usize, column: usize) -> Self {
        LavaError::ParseError {
            message: message.into(),
            line,
            column,
            source_context: Some(SourceContext::from_source(source, line, column)),
        }
    }
}

/// Convenience type alias for Results with [`LavaError`].
pub type Result<T> = std::result::Result<T, LavaError>;
