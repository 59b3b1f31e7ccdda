// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Command authorization for custom tags.
//!
//! Every custom tag names a permission key (its "command"). Before a tag does
//! any work the block engine asks a [`SecurityGate`] whether that key is
//! allowed for the current render pass. How that is decided is up to the
//! host; [`EnabledCommandsGate`] implements the usual rule of checking the
//! context's enabled commands list.

use crate::context::RenderContext;

/// Command name that enables every permission key.
pub const ALL_COMMANDS: &str = "All";

/// The result of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDecision {
    /// Whether the command may run.
    pub allowed: bool,
    /// Optional message to show instead of the default denial text.
    pub message: Option<String>,
}

impl SecurityDecision {
    /// An approving decision.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            message: None,
        }
    }

    /// A denying decision with the default message.
    pub fn deny() -> Self {
        Self {
            allowed: false,
            message: None,
        }
    }

    /// A denying decision with a custom message.
    pub fn deny_with(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: Some(message.into()),
        }
    }
}

/// Decides whether a permission key may be used in a render context.
pub trait SecurityGate: Send + Sync {
    /// Checks `permission_key` against `ctx`.
    fn authorize(&self, permission_key: &str, ctx: &RenderContext) -> SecurityDecision;
}

/// Allows a command when the context's enabled commands contain it or
/// [`ALL_COMMANDS`]. Comparison ignores case.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnabledCommandsGate;

impl SecurityGate for EnabledCommandsGate {
    fn authorize(&self, permission_key: &str, ctx: &RenderContext) -> SecurityDecision {
        let allowed = ctx.enabled_commands().iter().any(|command| {
            let command = command.trim();
            command.eq_ignore_ascii_case(ALL_COMMANDS) || command.eq_ignore_ascii_case(permission_key)
        });

        if allowed {
            SecurityDecision::allow()
        } else {
            SecurityDecision::deny()
        }
    }
}

/// Allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl SecurityGate for AllowAll {
    fn authorize(&self, _permission_key: &str, _ctx: &RenderContext) -> SecurityDecision {
        SecurityDecision::allow()
    }
}

/// Denies everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl SecurityGate for DenyAll {
    fn authorize(&self, _permission_key: &str, _ctx: &RenderContext) -> SecurityDecision {
        SecurityDecision::deny()
    }
}

/// The inline message written when a tag is denied.
pub fn not_authorized_message(display_name: &str) -> String {
    format!(
        "The Lava command '{}' is not configured for this template.",
        display_name
    )
}
