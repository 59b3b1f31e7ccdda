// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Dynamic shortcodes: custom tags whose behavior is itself Lava markup.
//!
//! A shortcode definition names its parameters with defaults and carries a
//! Lava template. Using `{[ alert type:'danger' ]}Careful{[ endalert ]}`:
//!
//! 1. parameters are the defaults overlaid by the markup attributes, each
//!    set as a local merge field;
//! 2. for block shortcodes the body renders first, into `blockContent`;
//! 3. the shortcode's own markup renders in place of the tag.
//!
//! Shortcodes register under their name plus the engine's shortcode suffix,
//! which is what the rewriter turns `{[ name ]}` into.

use crate::block::{BlockBody, BlockOutcome, BodyRenderer};
use crate::context::{RenderContext, Visibility};
use crate::error::Result;
use crate::markup::ElementAttributes;
use crate::registry::TagRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Merge field holding a block shortcode's rendered body.
pub const BLOCK_CONTENT_FIELD: &str = "blockContent";

/// Whether a shortcode wraps content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortcodeKind {
    /// `{[ name ]}`
    Inline,
    /// `{[ name ]}...{[ endname ]}`
    #[default]
    Block,
}

/// A shortcode as declared in `lava.toml`.
///
/// ```toml
/// [[shortcodes]]
/// name = "alert"
/// kind = "block"
/// markup = "<div class='alert alert-{{ type }}'>{{ blockContent }}</div>"
/// parameters = { type = "info" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcodeDefinition {
    /// Name without the suffix.
    pub name: String,

    /// Inline or block.
    #[serde(default)]
    pub kind: ShortcodeKind,

    /// Lava template rendered in place of the shortcode.
    pub markup: String,

    /// Parameter defaults.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,

    /// Commands enabled while the markup renders, replacing the caller's.
    #[serde(default)]
    pub enabled_commands: Option<Vec<String>>,
}

impl ShortcodeDefinition {
    /// Creates a block shortcode with no parameters.
    pub fn new(name: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ShortcodeKind::Block,
            markup: markup.into(),
            parameters: BTreeMap::new(),
            enabled_commands: None,
        }
    }

    /// Sets the kind.
    pub fn with_kind(mut self, kind: ShortcodeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Adds a parameter default.
    pub fn with_parameter(mut self, name: impl Into<String>, default: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), default.into());
        self
    }

    /// Registers the shortcode as `name + suffix`.
    pub fn register(self, registry: &mut TagRegistry, suffix: &str) -> Result<()> {
        let tag_name = format!("{}{}", self.name, suffix);
        let kind = self.kind;
        let body = Arc::new(ShortcodeBlock::new(self));
        match kind {
            ShortcodeKind::Inline => registry.register_inline(&tag_name, body),
            ShortcodeKind::Block => registry.register_block(&tag_name, body),
        }
    }
}

/// Block implementation of a [`ShortcodeDefinition`].
#[derive(Debug, Clone)]
pub struct ShortcodeBlock {
    definition: ShortcodeDefinition,
}

impl ShortcodeBlock {
    /// Wraps a definition. Parameter names are matched ignoring case.
    pub fn new(mut definition: ShortcodeDefinition) -> Self {
        definition.parameters = definition
            .parameters
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self { definition }
    }

    /// The wrapped definition.
    pub fn definition(&self) -> &ShortcodeDefinition {
        &self.definition
    }

    fn render_markup(&self, ctx: &mut RenderContext, renderer: &dyn BodyRenderer, out: &mut String) -> Result<()> {
        let Some(commands) = &self.definition.enabled_commands else {
            return renderer.render_source(&self.definition.markup, ctx, out);
        };

        let previous = ctx.enabled_commands().to_vec();
        ctx.set_enabled_commands(commands.iter().cloned());
        let result = renderer.render_source(&self.definition.markup, ctx, out);
        ctx.set_enabled_commands(previous);
        result
    }
}

impl BlockBody for ShortcodeBlock {
    fn display_name(&self) -> &str {
        &self.definition.name
    }

    fn requires_authorization(&self) -> bool {
        false
    }

    fn execute(&self, attributes: &ElementAttributes, _ctx: &RenderContext) -> BlockOutcome {
        let mut parameters: BTreeMap<&str, &str> = self
            .definition
            .parameters
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        for (key, value) in attributes.iter() {
            parameters.insert(key, value);
        }

        parameters
            .into_iter()
            .fold(BlockOutcome::completed(), |outcome, (key, value)| {
                outcome.with_output(key, Value::String(value.to_string()))
            })
    }

    fn render(&self, ctx: &mut RenderContext, renderer: &dyn BodyRenderer, out: &mut String) -> Result<()> {
        if self.definition.kind == ShortcodeKind::Block {
            let mut content = String::new();
            renderer.render_body(ctx, &mut content)?;
            ctx.set_merge_field(BLOCK_CONTENT_FIELD, Value::String(content), Visibility::Local);
        }
        self.render_markup(ctx, renderer, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TagKind;
    use serde_json::json;

    #[test]
    fn test_parameters_overlay_defaults() {
        let block = ShortcodeBlock::new(
            ShortcodeDefinition::new("alert", "")
                .with_parameter("Type", "info")
                .with_parameter("title", "Note"),
        );
        let outcome = block.execute(&ElementAttributes::parse("type:'danger' extra:1"), &RenderContext::new());

        let BlockOutcome::Completed(outputs) = outcome else {
            panic!("Expected Completed");
        };
        assert_eq!(outputs.get("type"), Some(&json!("danger")));
        assert_eq!(outputs.get("title"), Some(&json!("Note")));
        assert_eq!(outputs.get("extra"), Some(&json!("1")));
    }

    #[test]
    fn test_register_uses_suffix_and_kind() {
        let mut registry = TagRegistry::new();
        ShortcodeDefinition::new("badge", "<b>{{ text }}</b>")
            .with_kind(ShortcodeKind::Inline)
            .register(&mut registry, "_")
            .unwrap();

        let tag = registry.get("badge_").unwrap();
        assert_eq!(tag.kind, TagKind::Inline);
        assert!(!tag.body.requires_authorization());
    }

    #[test]
    fn test_definition_deserializes_with_defaults() {
        let definition: ShortcodeDefinition = serde_json::from_value(json!({
            "name": "alert",
            "markup": "{{ blockContent }}",
            "parameters": { "type": "info" }
        }))
        .unwrap();
        assert_eq!(definition.kind, ShortcodeKind::Block);
        assert_eq!(definition.parameters.get("type").map(String::as_str), Some("info"));
        assert!(definition.enabled_commands.is_none());
    }
}
