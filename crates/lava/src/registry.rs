// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Custom tag registration.
//!
//! Tags are registered explicitly at startup in a [`TagRegistry`]: a map from
//! tag name to the [`BlockBody`] that implements it. The engine's compiler
//! consults the registry to decide whether `{% name %}` opens a block (and
//! therefore needs a matching `{% endname %}`) or is a standalone tag.

use crate::block::BlockBody;
use crate::error::{LavaError, Result};
use crate::workflow::{WorkflowActivateBlock, WorkflowService, TAG_NAME};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Tag names the engine implements itself.
pub const BUILTIN_TAGS: &[&str] = &[
    "if", "elsif", "else", "endif", "unless", "endunless", "assign", "raw", "endraw", "comment",
    "endcomment",
];

/// Whether a tag has a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `{% name params %}` with no end tag.
    Inline,
    /// `{% name params %}...{% endname %}`.
    Block,
}

/// A registered custom tag.
#[derive(Clone)]
pub struct RegisteredTag {
    /// Lower-cased tag name.
    pub name: String,
    /// Inline or block.
    pub kind: TagKind,
    /// The tag's behavior.
    pub body: Arc<dyn BlockBody>,
}

impl fmt::Debug for RegisteredTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTag")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("display_name", &self.body.display_name())
            .finish()
    }
}

/// Name to tag lookup table. Names are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    tags: HashMap<String, RegisteredTag>,
}

impl TagRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the bundled tags: `workflowactivate`, backed
    /// by `workflows`.
    pub fn with_defaults(workflows: Arc<dyn WorkflowService>) -> Self {
        let mut registry = Self::new();
        registry.tags.insert(
            TAG_NAME.to_string(),
            RegisteredTag {
                name: TAG_NAME.to_string(),
                kind: TagKind::Block,
                body: Arc::new(WorkflowActivateBlock::new(workflows)),
            },
        );
        registry
    }

    /// Registers a block tag.
    pub fn register_block(&mut self, name: &str, body: Arc<dyn BlockBody>) -> Result<()> {
        self.register(name, TagKind::Block, body)
    }

    /// Registers an inline tag.
    pub fn register_inline(&mut self, name: &str, body: Arc<dyn BlockBody>) -> Result<()> {
        self.register(name, TagKind::Inline, body)
    }

    /// Registers a tag, replacing any previous registration of the name.
    ///
    /// # Errors
    ///
    /// Returns [`LavaError::ConfigError`] when the name is not an identifier,
    /// starts with `end`, or belongs to a built-in tag.
    pub fn register(&mut self, name: &str, kind: TagKind, body: Arc<dyn BlockBody>) -> Result<()> {
        let key = name.trim().to_lowercase();

        let valid = key.starts_with(|c: char| c.is_alphabetic() || c == '_')
            && key.chars().all(|c| c.is_alphanumeric() || c == '_');
        if !valid {
            return Err(LavaError::ConfigError(format!("Invalid tag name '{}'", name)));
        }
        if key.starts_with("end") || BUILTIN_TAGS.contains(&key.as_str()) {
            return Err(LavaError::ConfigError(format!(
                "Tag name '{}' is reserved",
                name
            )));
        }

        if self.tags.contains_key(&key) {
            tracing::warn!(tag = %key, "Replacing existing tag registration");
        }
        self.tags.insert(key.clone(), RegisteredTag { name: key, kind, body });
        Ok(())
    }

    /// Looks a tag up by name.
    pub fn get(&self, name: &str) -> Option<&RegisteredTag> {
        self.tags.get(&name.to_lowercase())
    }

    /// Returns true when `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tags.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns true when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockOutcome;
    use crate::context::RenderContext;
    use crate::markup::ElementAttributes;
    use crate::workflow::MemoryWorkflowService;

    struct Noop;

    impl BlockBody for Noop {
        fn display_name(&self) -> &str {
            "Noop"
        }

        fn execute(&self, _attributes: &ElementAttributes, _ctx: &RenderContext) -> BlockOutcome {
            BlockOutcome::completed()
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut registry = TagRegistry::new();
        registry.register_block("MyBlock", Arc::new(Noop)).unwrap();

        let tag = registry.get("myblock").unwrap();
        assert_eq!(tag.name, "myblock");
        assert_eq!(tag.kind, TagKind::Block);
        assert!(registry.contains("MYBLOCK"));
    }

    #[test]
    fn test_reserved_and_invalid_names() {
        let mut registry = TagRegistry::new();
        assert!(registry.register_block("if", Arc::new(Noop)).is_err());
        assert!(registry.register_block("endthing", Arc::new(Noop)).is_err());
        assert!(registry.register_inline("has space", Arc::new(Noop)).is_err());
        assert!(registry.register_inline("9lives", Arc::new(Noop)).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_defaults_include_workflowactivate() {
        let registry = TagRegistry::with_defaults(Arc::new(MemoryWorkflowService::new()));
        let tag = registry.get("WorkflowActivate").unwrap();
        assert_eq!(tag.kind, TagKind::Block);
        assert_eq!(tag.body.permission_key(), "WorkflowActivate");
    }

    #[test]
    fn test_names_sorted() {
        let mut registry = TagRegistry::new();
        registry.register_inline("zeta", Arc::new(Noop)).unwrap();
        registry.register_block("alpha_", Arc::new(Noop)).unwrap();
        assert_eq!(registry.names(), vec!["alpha_", "zeta"]);
        assert_eq!(registry.len(), 2);
    }
}
