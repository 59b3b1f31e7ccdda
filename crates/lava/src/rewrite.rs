// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Lava to Liquid source rewriting.
//!
//! Lava extends Liquid with two pieces of surface syntax that the host engine
//! does not understand. Both are rewritten on the raw text before compiling:
//!
//! 1. **`elseif`**: `{% elseif cond %}` becomes `{% elsif cond %}`.
//! 2. **Shortcodes**: `{[ name params ]}...{[ endname ]}` becomes
//!    `{% name_ params %}...{% endname_ %}`. The suffix keeps a shortcode
//!    from colliding with a built-in tag of the same name.
//!
//! # Scanning
//!
//! The source is split by a small state scanner into text, output
//! (`{{ }}`), tag (`{% %}`), shortcode (`{[ ]}`) and verbatim
//! (`raw`/`comment` bodies) segments. Quote characters are tracked inside
//! delimiters, and quotes nested in an inner `{{ }}` span are ignored, so
//! parameters like `fontsize:'{{ 'x' | append:']}' }}'` survive unchanged.
//!
//! # Failure Mode
//!
//! Rewriting never fails. An unterminated `{[` or an end marker without a
//! matching open is left exactly as written; the engine then reports an
//! ordinary syntax error for that region, or renders it as text.

use tracing::trace;

/// Suffix appended to shortcode tag names when rewriting.
pub const DEFAULT_SHORTCODE_SUFFIX: &str = "_";

/// A slice of template source classified by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    /// Literal text.
    Text(&'a str),
    /// An output expression including its delimiters.
    Output(&'a str),
    /// A tag including its delimiters; `inner` excludes them.
    Tag { full: &'a str, inner: &'a str },
    /// A shortcode marker including its delimiters; `inner` excludes them.
    Shortcode { full: &'a str, inner: &'a str },
    /// A `raw` or `comment` block, opening and closing tags included.
    Verbatim(&'a str),
}

/// Applies every Lava-to-Liquid rewrite: shortcodes, then `elseif`.
///
/// # Examples
///
/// ```rust
/// use lava::rewrite::rewrite_source;
///
/// let liquid = rewrite_source("{[ note ]}hi{[ endnote ]}{% if a %}{% elseif b %}{% endif %}", "_");
/// assert_eq!(liquid, "{% note_ %}hi{% endnote_ %}{% if a %}{% elsif b %}{% endif %}");
/// ```
pub fn rewrite_source(source: &str, shortcode_suffix: &str) -> String {
    normalize_elseif(&rewrite_shortcodes(source, shortcode_suffix))
}

/// Replaces the `elseif` tag keyword with `elsif`.
///
/// Only the keyword position of a `{% %}` tag is changed; text, output
/// expressions, string literals and `raw`/`comment` bodies are untouched.
pub fn normalize_elseif(source: &str) -> String {
    let mut out = String::with_capacity(source.len());

    for segment in scan(source) {
        match segment {
            Segment::Tag { full, inner } => {
                let (lead, keyword, rest) = split_keyword(inner);
                if keyword == "elseif" {
                    out.push_str("{%");
                    out.push_str(lead);
                    out.push_str("elsif");
                    out.push_str(rest);
                    out.push_str("%}");
                } else {
                    out.push_str(full);
                }
            }
            other => out.push_str(segment_text(other)),
        }
    }

    out
}

/// Rewrites `{[ ]}` shortcode markers into block tags named `name + suffix`.
///
/// Everything after the shortcode name, including nested `{{ }}`
/// expressions and the original spacing, is preserved verbatim.
pub fn rewrite_shortcodes(source: &str, suffix: &str) -> String {
    let mut out = String::with_capacity(source.len() + 16);
    let mut open: Vec<&str> = Vec::new();

    for segment in scan(source) {
        let Segment::Shortcode { full, inner } = segment else {
            out.push_str(segment_text(segment));
            continue;
        };

        let (lead, name, rest) = split_keyword(inner);
        if name.is_empty() || !name.starts_with(|c: char| c.is_alphabetic() || c == '_') {
            out.push_str(full);
            continue;
        }

        if let Some(target) = name.strip_prefix("end") {
            match open.iter().rposition(|n| *n == target) {
                Some(index) => {
                    open.truncate(index);
                }
                None => {
                    trace!(marker = %name, "Leaving unmatched shortcode end marker as written");
                    out.push_str(full);
                    continue;
                }
            }
        } else {
            open.push(name);
        }

        out.push_str("{%");
        out.push_str(lead);
        out.push_str(name);
        out.push_str(suffix);
        out.push_str(rest);
        out.push_str("%}");
    }

    out
}

fn segment_text(segment: Segment<'_>) -> &str {
    match segment {
        Segment::Text(s) | Segment::Output(s) | Segment::Verbatim(s) => s,
        Segment::Tag { full, .. } | Segment::Shortcode { full, .. } => full,
    }
}

/// Splits delimiter contents into leading whitespace (with an optional `-`
/// trim marker), the keyword, and the remainder.
fn split_keyword(inner: &str) -> (&str, &str, &str) {
    let after_trim = inner.strip_prefix('-').unwrap_or(inner);
    let ws = after_trim.len() - after_trim.trim_start().len();
    let lead_len = (inner.len() - after_trim.len()) + ws;
    let body = &inner[lead_len..];
    let keyword_len = body
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    (&inner[..lead_len], &body[..keyword_len], &body[keyword_len..])
}

fn scan(source: &str) -> Vec<Segment<'_>> {
    let bytes = source.as_bytes();
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while pos + 1 < bytes.len() {
        if bytes[pos] != b'{' {
            pos += 1;
            continue;
        }

        let close: &[u8; 2] = match bytes[pos + 1] {
            b'{' => b"}}",
            b'%' => b"%}",
            b'[' => b"]}",
            _ => {
                pos += 1;
                continue;
            }
        };

        let Some(end) = find_close(bytes, pos + 2, close) else {
            if close == b"]}" {
                trace!(offset = pos, "Unterminated shortcode marker left as text");
                pos += 2;
                continue;
            }
            break;
        };

        if text_start < pos {
            segments.push(Segment::Text(&source[text_start..pos]));
        }

        let full = &source[pos..end + 2];
        let inner = &source[pos + 2..end];
        let mut next = end + 2;

        match close {
            b"}}" => segments.push(Segment::Output(full)),
            b"]}" => segments.push(Segment::Shortcode { full, inner }),
            _ => {
                let (_, keyword, _) = split_keyword(inner);
                if keyword == "raw" || keyword == "comment" {
                    next = find_block_end(source, next, keyword).unwrap_or(source.len());
                    segments.push(Segment::Verbatim(&source[pos..next]));
                } else {
                    segments.push(Segment::Tag { full, inner });
                }
            }
        }

        pos = next;
        text_start = next;
    }

    if text_start < source.len() {
        segments.push(Segment::Text(&source[text_start..]));
    }

    segments
}

/// Finds the closing delimiter of the token whose contents start at `start`.
///
/// Quoted strings and nested `{{ }}` / `{% %}` spans are skipped, and quote
/// characters inside a nested span are ignored. A quote only opens a string
/// at the start of a word, so `O'Brien` is plain text. When no balanced close
/// exists, `{{ }}` and `{% %}` fall back to the first raw closer; `{[ ]}`
/// markers stay unterminated.
pub(crate) fn find_close(bytes: &[u8], start: usize, close: &[u8; 2]) -> Option<usize> {
    find_balanced_close(bytes, start, close).or_else(|| {
        if close == b"]}" {
            return None;
        }
        let found = bytes
            .get(start..)?
            .windows(2)
            .position(|pair| pair == close)
            .map(|offset| start + offset);
        if found.is_some() {
            trace!(offset = start, "Unbalanced quotes in delimiter; using the first closer");
        }
        found
    })
}

fn starts_word(bytes: &[u8], pos: usize) -> bool {
    match pos.checked_sub(1).map(|prev| bytes[prev]) {
        None => true,
        Some(prev) => !(prev.is_ascii_alphanumeric() || prev == b'_' || prev >= 0x80),
    }
}

fn find_balanced_close(bytes: &[u8], start: usize, close: &[u8; 2]) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut pos = start;

    while pos < bytes.len() {
        let b = bytes[pos];
        let next = bytes.get(pos + 1).copied();
        let opens_expression = b == b'{' && matches!(next, Some(b'{') | Some(b'%'));

        if opens_expression {
            depth += 1;
            pos += 2;
            continue;
        }

        if depth > 0 {
            if (b == b'}' || b == b'%') && next == Some(b'}') {
                depth -= 1;
                pos += 2;
            } else {
                pos += 1;
            }
            continue;
        }

        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            pos += 1;
            continue;
        }

        if b == close[0] && next == Some(close[1]) {
            return Some(pos);
        }
        if close == b"]}" && b == b'{' && next == Some(b'[') {
            // A second opener before the close means this marker never ended.
            return None;
        }
        if (b == b'\'' || b == b'"') && starts_word(bytes, pos) {
            quote = Some(b);
        }
        pos += 1;
    }

    None
}

/// Returns the offset just past `{% end<keyword> %}`, searching from `from`.
fn find_block_end(source: &str, from: usize, keyword: &str) -> Option<usize> {
    let end_keyword = format!("end{}", keyword);
    let mut search = from;

    while let Some(offset) = source[search..].find("{%") {
        let open = search + offset;
        let close = open + 2 + source[open + 2..].find("%}")?;
        let (_, found, _) = split_keyword(&source[open + 2..close]);
        if found == end_keyword {
            return Some(close + 2);
        }
        search = close + 2;
    }

    None
}
