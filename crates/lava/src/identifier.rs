// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Entity identifier classification.
//!
//! Tags that reference external entities accept a GUID, an integer id or a
//! name in the same parameter. The value is classified in that fixed order:
//! a GUID-shaped value is a GUID even if a name happens to match it, and an
//! integer-shaped value is an id even if an entity is named `"42"`.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref GUID_PATTERN: Regex = Regex::new(concat!(
        r"^(?:\{[0-9a-fA-F]{8}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{12}\}",
        r"|[0-9a-fA-F]{8}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{12})$"
    ))
    .expect("GUID pattern is valid");
}

/// How a parameter value identifies an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityIdentifier {
    /// A GUID, normalized to lower-case hyphenated form.
    Guid(String),
    /// An integer primary key.
    Id(i64),
    /// Anything else, matched against the entity's name.
    Name(String),
}

impl EntityIdentifier {
    /// Classifies `value` as GUID, then integer, then name.
    ///
    /// Surrounding whitespace is ignored. Returns `None` for blank input.
    ///
    /// ```rust
    /// use lava::EntityIdentifier;
    ///
    /// assert_eq!(EntityIdentifier::parse("42"), Some(EntityIdentifier::Id(42)));
    /// assert_eq!(
    ///     EntityIdentifier::parse("New Member Intake"),
    ///     Some(EntityIdentifier::Name("New Member Intake".to_string()))
    /// );
    /// ```
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        if GUID_PATTERN.is_match(value) {
            return Some(EntityIdentifier::Guid(normalize_guid(value)));
        }

        if let Ok(id) = value.parse::<i64>() {
            return Some(EntityIdentifier::Id(id));
        }

        Some(EntityIdentifier::Name(value.to_string()))
    }

    /// Checks this identifier against an entity's id, GUID and name.
    ///
    /// GUIDs compare after normalization; names compare ignoring case.
    pub fn matches(&self, id: i64, guid: &str, name: &str) -> bool {
        match self {
            EntityIdentifier::Guid(g) => *g == normalize_guid(guid),
            EntityIdentifier::Id(i) => *i == id,
            EntityIdentifier::Name(n) => n.to_lowercase() == name.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for EntityIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityIdentifier::Guid(g) => write!(f, "{}", g),
            EntityIdentifier::Id(i) => write!(f, "{}", i),
            EntityIdentifier::Name(n) => write!(f, "{}", n),
        }
    }
}

/// Lower-cases a GUID and puts the hyphens in canonical positions.
pub fn normalize_guid(value: &str) -> String {
    let hex: String = value
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if hex.len() != 32 {
        return value.trim().to_lowercase();
    }
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
