// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Custom block execution.
//!
//! Every occurrence of a custom tag in a template runs through
//! [`BlockExecutionEngine::execute`], a small state machine:
//!
//! ```text
//! Init -> AuthorizationCheck -> Denied
//!                            -> ParseMarkup -> CreateScope -> RunCallback
//!                               -> MergeResults -> RenderBody -> Done
//! ```
//!
//! The tag's own behavior lives in a [`BlockBody`]. The engine handles the
//! parts every tag shares: the security gate, parameter parsing, the child
//! scope, and publishing the callback's result as merge fields.
//!
//! A denied tag writes the not-authorized message in place of its output.
//! Nothing else happens: no scope, no callback, no body.

use crate::context::{RenderContext, Visibility};
use crate::error::Result;
use crate::markup::ElementAttributes;
use crate::security::{not_authorized_message, SecurityDecision, SecurityGate};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, trace};

/// Merge field that receives a block's error message.
pub const ERROR_MERGE_FIELD: &str = "Error";

/// Default limit on nested scopes before a block refuses to run.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// What a block's domain callback produced.
///
/// Exactly one of these is published per invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    /// The callback failed; the message becomes the `Error` merge field.
    Failed(String),
    /// The callback succeeded; each entry becomes a merge field.
    Completed(Map<String, Value>),
}

impl BlockOutcome {
    /// A successful outcome with no outputs.
    pub fn completed() -> Self {
        BlockOutcome::Completed(Map::new())
    }

    /// A failed outcome.
    pub fn failed(message: impl Into<String>) -> Self {
        BlockOutcome::Failed(message.into())
    }

    /// Adds an output to a successful outcome. No-op on a failure.
    pub fn with_output(mut self, name: impl Into<String>, value: Value) -> Self {
        if let BlockOutcome::Completed(outputs) = &mut self {
            outputs.insert(name.into(), value);
        }
        self
    }
}

/// Renders template content on behalf of a block.
///
/// Implemented by the host engine for each tag occurrence. The body tokens
/// stay owned by the engine; a block only asks for them to be rendered.
pub trait BodyRenderer {
    /// Renders the tag's body into `out` against `ctx`.
    fn render_body(&self, ctx: &mut RenderContext, out: &mut String) -> Result<()>;

    /// Compiles and renders arbitrary Lava source with the same engine.
    fn render_source(&self, source: &str, ctx: &mut RenderContext, out: &mut String) -> Result<()>;
}

/// The domain logic of a custom tag.
pub trait BlockBody: Send + Sync {
    /// Name used in messages, such as the not-authorized text.
    fn display_name(&self) -> &str;

    /// The command the security gate is asked about.
    fn permission_key(&self) -> &str {
        self.display_name()
    }

    /// Whether the security gate is consulted before the tag runs.
    fn requires_authorization(&self) -> bool {
        true
    }

    /// Runs the tag's logic with its parsed parameters.
    ///
    /// Domain failures are returned as [`BlockOutcome::Failed`], never as
    /// panics or errors.
    fn execute(&self, attributes: &ElementAttributes, ctx: &RenderContext) -> BlockOutcome;

    /// Produces the tag's output once the results are in scope.
    ///
    /// The default renders the body.
    fn render(&self, ctx: &mut RenderContext, renderer: &dyn BodyRenderer, out: &mut String) -> Result<()> {
        renderer.render_body(ctx, out)
    }
}

/// One occurrence of a custom tag being rendered.
pub struct BlockInvocation<'a> {
    /// The tag name as registered.
    pub tag_name: &'a str,
    /// Markup after the tag name, captured when the template was compiled.
    pub raw_markup: &'a str,
    /// Renderer for the tag's body.
    pub body: &'a dyn BodyRenderer,
}

/// States of a block invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Nothing has happened yet.
    Init,
    /// Asking the security gate.
    AuthorizationCheck,
    /// The gate refused; terminal.
    Denied,
    /// Nesting went past the configured maximum; terminal.
    NestingLimit,
    /// Parsing the tag markup.
    ParseMarkup,
    /// Entering the child scope.
    CreateScope,
    /// Running the domain callback.
    RunCallback,
    /// Publishing outputs or the error.
    MergeResults,
    /// Rendering the body.
    RenderBody,
    /// Finished; terminal.
    Done,
}

/// Drives custom tags through authorization, scoping and rendering.
#[derive(Clone)]
pub struct BlockExecutionEngine {
    gate: Arc<dyn SecurityGate>,
    max_depth: usize,
}

impl BlockExecutionEngine {
    /// Creates an engine that consults `gate`.
    pub fn new(gate: Arc<dyn SecurityGate>) -> Self {
        Self {
            gate,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets the maximum scope depth a block may start at.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Runs one tag occurrence and returns its terminal state.
    ///
    /// # Errors
    ///
    /// Only rendering failures from the body propagate. Denials, domain
    /// errors and malformed markup are contained in the output.
    pub fn execute(
        &self,
        body: &dyn BlockBody,
        invocation: &BlockInvocation<'_>,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<BlockState> {
        let tag = invocation.tag_name;
        let mut state = BlockState::Init;

        state = transition(tag, state, BlockState::AuthorizationCheck);
        let decision = if body.requires_authorization() {
            self.gate.authorize(body.permission_key(), ctx)
        } else {
            SecurityDecision::allow()
        };
        if !decision.allowed {
            debug!(tag = %tag, permission = %body.permission_key(), "Lava command denied");
            let message = decision
                .message
                .unwrap_or_else(|| not_authorized_message(body.display_name()));
            out.push_str(&message);
            return Ok(transition(tag, state, BlockState::Denied));
        }

        state = transition(tag, state, BlockState::ParseMarkup);
        let mut attributes = ElementAttributes::parse(invocation.raw_markup);
        attributes.resolve_values(|value| {
            let mut resolved = String::new();
            match invocation.body.render_source(value, ctx, &mut resolved) {
                Ok(()) => Some(resolved),
                Err(err) => {
                    debug!(tag = %tag, error = %err, "Could not resolve parameter value");
                    None
                }
            }
        });

        if ctx.depth() > self.max_depth {
            debug!(tag = %tag, depth = ctx.depth(), "Block nesting limit reached");
            out.push_str(&format!(
                "Lava error: '{}' exceeded the maximum nesting depth of {}.",
                body.display_name(),
                self.max_depth
            ));
            return Ok(transition(tag, state, BlockState::NestingLimit));
        }

        state = transition(tag, state, BlockState::CreateScope);
        ctx.execute_in_child_scope(|child| {
            let state = transition(tag, state, BlockState::RunCallback);
            let outcome = body.execute(&attributes, child);

            let state = transition(tag, state, BlockState::MergeResults);
            match outcome {
                BlockOutcome::Failed(message) => {
                    debug!(tag = %tag, error = %message, "Block reported an error");
                    child.set_merge_field(ERROR_MERGE_FIELD, Value::String(message), Visibility::Local);
                }
                BlockOutcome::Completed(outputs) => {
                    for (name, value) in outputs {
                        child.set_merge_field(name, value, Visibility::Local);
                    }
                }
            }

            let state = transition(tag, state, BlockState::RenderBody);
            body.render(child, invocation.body, out)?;
            Ok(transition(tag, state, BlockState::Done))
        })
    }
}

fn transition(tag: &str, from: BlockState, to: BlockState) -> BlockState {
    trace!(tag = %tag, ?from, ?to, "Block state transition");
    to
}
