// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Tag parameter markup parsing.
//!
//! Custom tags take their parameters as a single line of `key:value` pairs:
//!
//! ```text
//! {% calendarevents calendarid:'Internal' audienceids:'Men,Women' maxoccurrences:2 %}
//! ```
//!
//! [`ElementAttributes::parse`] turns the markup after the tag name into an
//! ordered, case-insensitive parameter map. Values may be quoted with `'` or
//! `"`, and a quoted value may embed output expressions that contain quotes
//! of their own:
//!
//! ```text
//! where:'Title == "{{ 'Blog Posts' }}"' iterator:'items'
//! ```
//!
//! Quote characters inside a `{{ }}` or `{% %}` span never terminate the
//! surrounding value.
//!
//! # Recovery
//!
//! Parsing never fails. Tokens that are not `key:value` pairs are skipped and
//! an unterminated quote captures the rest of the markup. Template authors
//! are not programmers, and one typo should not blank a page.

use tracing::trace;

/// Parameters parsed from a tag's markup.
///
/// Names are stored lower-cased and compared case-insensitively; values keep
/// their original case. A repeated name replaces the earlier value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementAttributes {
    entries: Vec<(String, String)>,
}

impl ElementAttributes {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses tag markup into a parameter set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lava::ElementAttributes;
    ///
    /// let attrs = ElementAttributes::parse("param1:'1' PARAM2:'2' flag:");
    /// assert_eq!(attrs.get_string("param2"), "2");
    /// assert_eq!(attrs.get_string_or_null("flag"), Some(""));
    /// assert_eq!(attrs.get_string_or_null("missing"), None);
    /// ```
    pub fn parse(markup: &str) -> Self {
        let chars: Vec<char> = markup.chars().collect();
        let mut attributes = Self::new();
        let mut pos = 0;

        while pos < chars.len() {
            while pos < chars.len() && chars[pos].is_whitespace() {
                pos += 1;
            }
            if pos >= chars.len() {
                break;
            }

            let key_start = pos;
            while pos < chars.len() && is_key_char(chars[pos]) {
                pos += 1;
            }

            if pos == key_start || pos >= chars.len() || chars[pos] != ':' {
                let end = skip_token(&chars, pos.max(key_start + 1));
                trace!(
                    token = %chars[key_start..end].iter().collect::<String>(),
                    "Skipping markup token without a parameter name"
                );
                pos = end;
                continue;
            }

            let key: String = chars[key_start..pos].iter().collect();
            let (value, next) = read_value(&chars, pos + 1);
            attributes.set(&key, value);
            pos = next;
        }

        attributes
    }

    /// Sets a parameter, replacing any existing value for the same name.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = normalize_key(key);
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Returns the value for `key`, or an empty string when it is missing.
    pub fn get_string(&self, key: &str) -> &str {
        self.get_string_or_null(key).unwrap_or("")
    }

    /// Returns the value for `key`, or `None` when it is missing.
    pub fn get_string_or_null(&self, key: &str) -> Option<&str> {
        let key = normalize_key(key);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value for `key` parsed as an integer, or `default`.
    pub fn get_integer(&self, key: &str, default: i64) -> i64 {
        self.get_string_or_null(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Returns the value for `key` interpreted as a boolean, or `default`.
    ///
    /// Accepts `true/false`, `yes/no`, `y/n`, `t/f` and `1/0` in any case.
    pub fn get_boolean(&self, key: &str, default: bool) -> bool {
        match self.get_string_or_null(key).map(|v| v.trim().to_lowercase()) {
            Some(v) if matches!(v.as_str(), "true" | "yes" | "y" | "t" | "1") => true,
            Some(v) if matches!(v.as_str(), "false" | "no" | "n" | "f" | "0") => false,
            _ => default,
        }
    }

    /// Returns true when `key` was supplied, even with an empty value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get_string_or_null(key).is_some()
    }

    /// Removes the given keys (case-insensitively) and returns `self` for
    /// chaining.
    ///
    /// Tags use this on a clone to separate their own parameters from the
    /// pass-through ones:
    ///
    /// ```rust
    /// use lava::ElementAttributes;
    ///
    /// let attrs = ElementAttributes::parse("workflowtype:'Intake' FirstName:'Ted'");
    /// let mut extra = attrs.clone();
    /// extra.remove(["WorkflowType"]);
    /// assert_eq!(extra.keys().collect::<Vec<_>>(), vec!["firstname"]);
    /// assert!(attrs.contains_key("workflowtype"));
    /// ```
    pub fn remove<I>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let keys: Vec<String> = keys.into_iter().map(|k| normalize_key(k.as_ref())).collect();
        self.entries.retain(|(k, _)| !keys.contains(k));
        self
    }

    /// Iterates over the lower-cased parameter names in markup order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Iterates over `(name, value)` pairs in markup order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no parameters were parsed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrites every value that contains Lava syntax through `render`.
    ///
    /// `render` returns `None` when the value could not be evaluated; the raw
    /// value is kept in that case.
    pub fn resolve_values<F>(&mut self, mut render: F)
    where
        F: FnMut(&str) -> Option<String>,
    {
        for (key, value) in self.entries.iter_mut() {
            if !contains_lava_syntax(value) {
                continue;
            }
            match render(value) {
                Some(resolved) => *value = resolved,
                None => trace!(parameter = %key, "Keeping unresolved parameter value"),
            }
        }
    }
}

/// Returns true when `text` contains an output or tag opener.
pub fn contains_lava_syntax(text: &str) -> bool {
    text.contains("{{") || text.contains("{%")
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Tracks `{{ }}` / `{% %}` nesting while scanning a value.
///
/// Returns how many characters the delimiter at `pos` occupies, if any.
fn step_expression(chars: &[char], pos: usize, depth: &mut usize) -> usize {
    let next = chars.get(pos + 1).copied();
    match (chars[pos], next) {
        ('{', Some('{')) | ('{', Some('%')) => {
            *depth += 1;
            2
        }
        ('}', Some('}')) | ('%', Some('}')) if *depth > 0 => {
            *depth -= 1;
            2
        }
        _ => 0,
    }
}

/// Reads a value starting just after the colon.
///
/// Returns the value and the position after it.
fn read_value(chars: &[char], start: usize) -> (String, usize) {
    let Some(&first) = chars.get(start) else {
        return (String::new(), start);
    };
    if first.is_whitespace() {
        return (String::new(), start);
    }

    let mut depth = 0;

    if first == '\'' || first == '"' {
        let mut pos = start + 1;
        while pos < chars.len() {
            let width = step_expression(chars, pos, &mut depth);
            if width > 0 {
                pos += width;
                continue;
            }
            if depth == 0 && chars[pos] == first {
                return (chars[start + 1..pos].iter().collect(), pos + 1);
            }
            pos += 1;
        }
        trace!("Unterminated quoted parameter value; using the remainder of the markup");
        return (chars[start + 1..].iter().collect(), chars.len());
    }

    let mut pos = start;
    while pos < chars.len() {
        let width = step_expression(chars, pos, &mut depth);
        if width > 0 {
            pos += width;
            continue;
        }
        if depth == 0 && chars[pos].is_whitespace() {
            break;
        }
        pos += 1;
    }
    let end = pos.min(chars.len());
    (chars[start..end].iter().collect(), end)
}

fn skip_token(chars: &[char], start: usize) -> usize {
    let mut depth = 0;
    let mut pos = start;
    while pos < chars.len() {
        let width = step_expression(chars, pos, &mut depth);
        if width > 0 {
            pos += width;
            continue;
        }
        if depth == 0 && chars[pos].is_whitespace() {
            break;
        }
        pos += 1;
    }
    pos.min(chars.len())
}
