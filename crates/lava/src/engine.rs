// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The host engine: compiles Lava source and renders it against a
//! [`RenderContext`].
//!
//! Compilation runs the rewriter (shortcodes, `elseif`), parses the result
//! into a node tree and caches it by source hash. Rendering walks the tree
//! depth-first, writing output in document order. Custom tags are handed to
//! the [`BlockExecutionEngine`], which gates, scopes and runs them.
//!
//! # Examples
//!
//! ```rust
//! use lava::{Engine, EngineOptions, RenderContext};
//! use serde_json::json;
//!
//! let engine = Engine::new(EngineOptions::default());
//! let mut ctx = RenderContext::from_json(json!({ "Name": "Ted" })).unwrap();
//!
//! let out = engine
//!     .render_source("{% if Name == 'Ted' %}Hi {{ Name }}{% elseif x %}?{% endif %}", &mut ctx)
//!     .unwrap();
//! assert_eq!(out, "Hi Ted");
//! ```

use crate::block::{BlockExecutionEngine, BlockInvocation, BodyRenderer, DEFAULT_MAX_DEPTH};
use crate::cache::{cache_for_capacity, TemplateCache};
use crate::context::{RenderContext, Visibility};
use crate::error::{LavaError, Result};
use crate::expression::to_output;
use crate::registry::TagRegistry;
use crate::rewrite::{rewrite_source, DEFAULT_SHORTCODE_SUFFIX};
use crate::security::{EnabledCommandsGate, SecurityGate};
use crate::template::{Node, Template};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

fn default_shortcode_suffix() -> String {
    DEFAULT_SHORTCODE_SUFFIX.to_string()
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_cache_capacity() -> usize {
    128
}

/// Engine settings, usually read from the `[engine]` table of `lava.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Appended to shortcode names when rewriting `{[ name ]}`.
    #[serde(default = "default_shortcode_suffix")]
    pub shortcode_suffix: String,

    /// Scope depth past which custom blocks refuse to run.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Compiled templates kept in the LRU cache; `0` disables caching.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            shortcode_suffix: default_shortcode_suffix(),
            max_depth: default_max_depth(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// Compiles and renders Lava templates.
///
/// An engine is `Send + Sync`; concurrent renders each bring their own
/// [`RenderContext`].
pub struct Engine {
    options: EngineOptions,
    registry: Arc<TagRegistry>,
    blocks: BlockExecutionEngine,
    cache: Box<dyn TemplateCache>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.options)
            .field("tags", &self.registry.names())
            .field("cache", &self.cache)
            .finish()
    }
}

impl Engine {
    /// Creates an engine with no custom tags.
    pub fn new(options: EngineOptions) -> Self {
        Self::with_registry(TagRegistry::new(), options)
    }

    /// Creates an engine with the given custom tags, gated by the context's
    /// enabled commands.
    pub fn with_registry(registry: TagRegistry, options: EngineOptions) -> Self {
        let blocks = BlockExecutionEngine::new(Arc::new(EnabledCommandsGate))
            .with_max_depth(options.max_depth);
        Self {
            cache: cache_for_capacity(options.cache_capacity),
            registry: Arc::new(registry),
            blocks,
            options,
        }
    }

    /// Replaces the security gate.
    pub fn with_security_gate(mut self, gate: Arc<dyn SecurityGate>) -> Self {
        self.blocks = BlockExecutionEngine::new(gate).with_max_depth(self.options.max_depth);
        self
    }

    /// The engine's options.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// The registered custom tags.
    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// Compiles `source`, returning the cached template when the same source
    /// was compiled before. Entries are keyed by the exact source text.
    ///
    /// # Errors
    ///
    /// Returns [`LavaError::ParseError`] for malformed templates. Positions
    /// refer to the rewritten source.
    pub fn compile(&self, source: &str) -> Result<Arc<Template>> {
        if let Some(template) = self.cache.get(source)? {
            trace!(bytes = source.len(), "Template cache hit");
            return Ok(template);
        }

        let rewritten = rewrite_source(source, &self.options.shortcode_suffix);
        let template = Arc::new(Template::parse(&rewritten, &self.registry)?);
        self.cache.set(source, Arc::clone(&template))?;
        debug!(bytes = source.len(), nodes = template.nodes().len(), "Compiled template");
        Ok(template)
    }

    /// Renders a compiled template.
    pub fn render(&self, template: &Template, ctx: &mut RenderContext) -> Result<String> {
        let mut out = String::new();
        self.render_nodes(template.nodes(), ctx, &mut out)?;
        Ok(out)
    }

    /// Compiles (or fetches) and renders `source`.
    pub fn render_source(&self, source: &str, ctx: &mut RenderContext) -> Result<String> {
        let template = self.compile(source)?;
        self.render(&template, ctx)
    }

    /// Drops all compiled templates.
    pub fn clear_cache(&self) -> Result<()> {
        self.cache.clear()
    }

    /// Number of compiled templates currently cached.
    pub fn cached_templates(&self) -> usize {
        self.cache.len()
    }

    fn render_nodes(&self, nodes: &[Node], ctx: &mut RenderContext, out: &mut String) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Output(expr) => out.push_str(&to_output(&expr.evaluate(ctx))),
                Node::If { branches, otherwise } => {
                    let chosen = branches
                        .iter()
                        .find(|(condition, _)| condition.evaluate(ctx))
                        .map(|(_, body)| body)
                        .or(otherwise.as_ref());
                    if let Some(body) = chosen {
                        self.render_nodes(body, ctx, out)?;
                    }
                }
                Node::Assign { name, value } => {
                    let value = value.evaluate(ctx);
                    ctx.set_merge_field(name.clone(), value, Visibility::Local);
                }
                Node::Custom { name, markup, body } => {
                    self.render_custom(name, markup, body.as_deref(), ctx, out)?;
                }
            }
        }
        Ok(())
    }

    fn render_custom(
        &self,
        name: &str,
        markup: &str,
        body: Option<&[Node]>,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        let registered = self
            .registry
            .get(name)
            .ok_or_else(|| LavaError::RenderError(format!("Tag '{}' is not registered", name)))?;

        let renderer = NodeRenderer {
            engine: self,
            nodes: body.unwrap_or(&[]),
        };
        let invocation = BlockInvocation {
            tag_name: &registered.name,
            raw_markup: markup,
            body: &renderer,
        };

        let state = self.blocks.execute(registered.body.as_ref(), &invocation, ctx, out)?;
        trace!(tag = %name, ?state, "Custom tag finished");
        Ok(())
    }
}

/// Renders the body of one custom tag occurrence.
struct NodeRenderer<'a> {
    engine: &'a Engine,
    nodes: &'a [Node],
}

impl BodyRenderer for NodeRenderer<'_> {
    fn render_body(&self, ctx: &mut RenderContext, out: &mut String) -> Result<()> {
        self.engine.render_nodes(self.nodes, ctx, out)
    }

    fn render_source(&self, source: &str, ctx: &mut RenderContext, out: &mut String) -> Result<()> {
        let template = self.engine.compile(source)?;
        self.engine.render_nodes(template.nodes(), ctx, out)
    }
}
