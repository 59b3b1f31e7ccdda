// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]
// LavaError carries source snippets for parse errors.
#![allow(clippy::result_large_err)]

//! # Lava
//!
//! A Liquid-dialect templating core with scoped merge fields and
//! security-gated custom blocks.
//!
//! ## Features
//!
//! - Parameter markup parsing for custom tags (`key:'value' other:{{ x }}`)
//! - Lava to Liquid rewriting (`{[ shortcode ]}`, `elseif`)
//! - Scoped merge fields with local and root visibility
//! - A block execution engine that authorizes, scopes and runs custom tags
//! - Bundled `workflowactivate` tag, dynamic shortcodes and Lua script tags
//! - A host engine with a compiled template LRU cache
//!
//! ## Quick Start
//!
//! ```rust
//! use lava::{Engine, EngineOptions, MemoryWorkflowService, RenderContext, TagRegistry, WorkflowTypeInfo};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let workflows = Arc::new(
//!     MemoryWorkflowService::new().with_workflow_type(WorkflowTypeInfo::new(1, "", "Intake")),
//! );
//! let engine = Engine::with_registry(TagRegistry::with_defaults(workflows), EngineOptions::default());
//!
//! let template = "{% workflowactivate workflowtype:'Intake' %}{{ Workflow.Name }}{% endworkflowactivate %}";
//!
//! let mut ctx = RenderContext::from_json(json!({})).unwrap();
//! assert_eq!(
//!     engine.render_source(template, &mut ctx).unwrap(),
//!     "The Lava command 'WorkflowActivate' is not configured for this template."
//! );
//!
//! let mut ctx = RenderContext::new().with_enabled_commands(["WorkflowActivate"]);
//! assert_eq!(engine.render_source(template, &mut ctx).unwrap(), "Intake");
//! ```

/// Custom block execution.
pub mod block;
/// Compiled template caching.
pub mod cache;
/// Scoped merge fields.
pub mod context;
/// Host engine.
pub mod engine;
/// Error types and reporting.
pub mod error;
/// Output expressions and conditions.
pub mod expression;
/// Entity identifier classification.
pub mod identifier;
/// Tag parameter markup.
pub mod markup;
/// Custom tag registration.
pub mod registry;
/// Lava to Liquid rewriting.
pub mod rewrite;
/// Lua-backed custom tags.
#[cfg(feature = "scripting")]
pub mod script;
/// Command authorization.
pub mod security;
/// Dynamic shortcodes.
pub mod shortcode;
/// Template compilation.
pub mod template;
/// The `workflowactivate` tag.
pub mod workflow;

pub use block::{BlockBody, BlockExecutionEngine, BlockInvocation, BlockOutcome, BlockState, BodyRenderer};
pub use cache::{MemoryCache, NoOpCache, TemplateCache};
pub use context::{RenderContext, Visibility};
pub use engine::{Engine, EngineOptions};
pub use error::{LavaError, Result, SourceContext};
pub use identifier::EntityIdentifier;
pub use markup::ElementAttributes;
pub use registry::{RegisteredTag, TagKind, TagRegistry};
pub use rewrite::{normalize_elseif, rewrite_shortcodes, rewrite_source};
#[cfg(feature = "scripting")]
pub use script::{ScriptBlock, ScriptDefinition, ScriptKind};
pub use security::{AllowAll, DenyAll, EnabledCommandsGate, SecurityDecision, SecurityGate};
pub use shortcode::{ShortcodeBlock, ShortcodeDefinition, ShortcodeKind};
pub use template::{Node, Template};
pub use workflow::{
    MemoryWorkflowService, WorkflowActivateBlock, WorkflowInstance, WorkflowService, WorkflowTypeInfo,
};

#[cfg(test)]
mod tests;
