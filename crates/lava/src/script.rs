// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Lua-backed custom tags.
//!
//! A script tag's domain logic is a Lua chunk defining
//! `execute(attributes, context)`:
//!
//! ```lua
//! function execute(attributes, context)
//!   if attributes.name == nil then
//!     return { error = "name is required" }
//!   end
//!   return { Greeting = "Hello " .. attributes.name, Visits = context.Visits }
//! end
//! ```
//!
//! - `attributes` is a table of the tag's parameters (lower-cased names).
//! - `context` is a snapshot of the merge fields visible at the tag.
//! - Returning a table with an `error` field fails the block; any other table
//!   becomes the block's outputs; `nil` produces no outputs.
//!
//! Every invocation runs in a fresh, sandboxed Lua state: `io`, `debug`,
//! `load`, `loadstring`, `loadfile` and `dofile` are removed and `os` is cut
//! down to `date`, `time`, `clock` and `difftime`. Script tags are gated by
//! the `Execute` command unless configured otherwise.

use crate::block::{BlockBody, BlockOutcome};
use crate::context::RenderContext;
use crate::error::{LavaError, Result};
use crate::markup::ElementAttributes;
use crate::registry::{TagKind, TagRegistry};
use mlua::{Lua, LuaSerdeExt, Table};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Default command gating script tags.
pub const SCRIPT_PERMISSION_KEY: &str = "Execute";

/// Name of the Lua entry point.
const ENTRY_POINT: &str = "execute";

fn default_permission_key() -> String {
    SCRIPT_PERMISSION_KEY.to_string()
}

fn default_kind() -> ScriptKind {
    ScriptKind::Block
}

/// Whether a script tag has a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    /// No end tag; renders nothing.
    Inline,
    /// Renders its body with the outputs in scope.
    Block,
}

/// A script tag as declared in `lava.toml`.
///
/// ```toml
/// [[scripts]]
/// name = "greet"
/// source = "function execute(a, c) return { Greeting = 'Hi ' .. a.name } end"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDefinition {
    /// Tag name.
    pub name: String,

    /// Lua source defining `execute`.
    pub source: String,

    /// Inline or block.
    #[serde(default = "default_kind")]
    pub kind: ScriptKind,

    /// Command that must be enabled for the tag to run.
    #[serde(default = "default_permission_key")]
    pub permission_key: String,
}

impl ScriptDefinition {
    /// Compiles and registers the script tag.
    ///
    /// # Errors
    ///
    /// Returns [`LavaError::ScriptError`] when the source does not load, and
    /// [`LavaError::ConfigError`] when the name cannot be registered.
    pub fn register(self, registry: &mut TagRegistry) -> Result<()> {
        let kind = match self.kind {
            ScriptKind::Inline => TagKind::Inline,
            ScriptKind::Block => TagKind::Block,
        };
        let name = self.name.clone();
        let block = ScriptBlock::new(self.name, self.source)?.with_permission_key(self.permission_key);
        registry.register(&name, kind, Arc::new(block))
    }
}

/// A custom tag implemented in Lua.
#[derive(Debug, Clone)]
pub struct ScriptBlock {
    name: String,
    source: String,
    permission_key: String,
}

impl ScriptBlock {
    /// Creates a script tag, checking that `source` loads and defines
    /// `execute`.
    ///
    /// # Errors
    ///
    /// Returns [`LavaError::ScriptError`] for syntax errors or a missing
    /// entry point.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let block = Self {
            name: name.into(),
            source: source.into(),
            permission_key: default_permission_key(),
        };

        let lua = block.load().map_err(|e| block.script_error(e))?;
        let entry: mlua::Value = lua.globals().get(ENTRY_POINT).map_err(|e| block.script_error(e))?;
        if !entry.is_function() {
            return Err(block.script_error(format!("the script must define function '{}'", ENTRY_POINT)));
        }

        Ok(block)
    }

    /// Sets the command the tag is gated by.
    pub fn with_permission_key(mut self, permission_key: impl Into<String>) -> Self {
        self.permission_key = permission_key.into();
        self
    }

    fn script_error(&self, err: impl std::fmt::Display) -> LavaError {
        LavaError::ScriptError {
            tag: self.name.clone(),
            message: err.to_string(),
        }
    }

    /// Creates a sandboxed state with the script loaded.
    fn load(&self) -> mlua::Result<Lua> {
        let lua = Lua::new();
        sandbox(&lua, &lua.globals())?;
        lua.load(self.source.as_str()).set_name(self.name.as_str()).exec()?;
        Ok(lua)
    }

    fn run(&self, attributes: &ElementAttributes, ctx: &RenderContext) -> mlua::Result<BlockOutcome> {
        let lua = self.load()?;
        let entry: mlua::Function = lua.globals().get(ENTRY_POINT)?;

        let attributes: BTreeMap<&str, &str> = attributes.iter().collect();
        let context = Value::Object(ctx.visible_merge_fields());

        let returned: mlua::Value = entry.call((lua.to_value(&attributes)?, lua.to_value(&context)?))?;

        let table = match returned {
            mlua::Value::Nil => return Ok(BlockOutcome::completed()),
            mlua::Value::Table(table) => table,
            other => {
                return Ok(BlockOutcome::failed(format!(
                    "Script '{}' must return a table or nil, got {}",
                    self.name,
                    other.type_name()
                )))
            }
        };

        if let Some(message) = error_message(&table)? {
            return Ok(BlockOutcome::Failed(message));
        }

        match lua.from_value::<Value>(mlua::Value::Table(table))? {
            Value::Object(outputs) => Ok(BlockOutcome::Completed(outputs)),
            Value::Array(items) if items.is_empty() => Ok(BlockOutcome::completed()),
            _ => Ok(BlockOutcome::failed(format!(
                "Script '{}' must return a table of named outputs",
                self.name
            ))),
        }
    }
}

fn error_message(table: &Table) -> mlua::Result<Option<String>> {
    let error: mlua::Value = table.get("error")?;
    Ok(match error {
        mlua::Value::Nil => None,
        mlua::Value::String(s) => Some(s.to_string_lossy().to_string()),
        other => Some(format!("{:?}", other)),
    })
}

/// Removes everything that reaches outside the process or loads new code.
fn sandbox(lua: &Lua, globals: &Table) -> mlua::Result<()> {
    let os_table: Table = globals.get("os")?;
    let safe_os = lua.create_table()?;
    for name in ["date", "time", "clock", "difftime"] {
        let f: mlua::Function = os_table.get(name)?;
        safe_os.set(name, f)?;
    }

    for name in ["io", "debug", "load", "loadstring", "loadfile", "dofile", "require", "package"] {
        globals.set(name, mlua::Value::Nil)?;
    }
    globals.set("os", safe_os)?;

    Ok(())
}

impl BlockBody for ScriptBlock {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn permission_key(&self) -> &str {
        &self.permission_key
    }

    fn execute(&self, attributes: &ElementAttributes, ctx: &RenderContext) -> BlockOutcome {
        self.run(attributes, ctx).unwrap_or_else(|err| {
            debug!(tag = %self.name, error = %err, "Script failed");
            BlockOutcome::Failed(err.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GREET: &str = r#"
        function execute(attributes, context)
          if attributes.name == nil then
            return { error = "name is required" }
          end
          return { Greeting = "Hello " .. attributes.name, Visits = context.Visits }
        end
    "#;

    fn run(source: &str, markup: &str, ctx: &RenderContext) -> BlockOutcome {
        ScriptBlock::new("greet", source)
            .unwrap()
            .execute(&ElementAttributes::parse(markup), ctx)
    }

    #[test]
    fn test_outputs_from_table() {
        let ctx = RenderContext::from_json(json!({ "Visits": 3 })).unwrap();
        let outcome = run(GREET, "name:'Ted'", &ctx);
        assert_eq!(
            outcome,
            BlockOutcome::completed()
                .with_output("Greeting", json!("Hello Ted"))
                .with_output("Visits", json!(3))
        );
    }

    #[test]
    fn test_error_field_fails() {
        let outcome = run(GREET, "", &RenderContext::new());
        assert_eq!(outcome, BlockOutcome::failed("name is required"));
    }

    #[test]
    fn test_nil_means_no_outputs() {
        let outcome = run("function execute() return nil end", "", &RenderContext::new());
        assert_eq!(outcome, BlockOutcome::completed());
    }

    #[test]
    fn test_runtime_error_becomes_failure() {
        let outcome = run("function execute() error('boom') end", "", &RenderContext::new());
        match outcome {
            BlockOutcome::Failed(message) => assert!(message.contains("boom"), "{}", message),
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_sandbox_blocks_io() {
        let outcome = run(
            "function execute() return { Io = io == nil, Os = os.execute == nil, Time = os.time() > 0 } end",
            "",
            &RenderContext::new(),
        );
        assert_eq!(
            outcome,
            BlockOutcome::completed()
                .with_output("Io", json!(true))
                .with_output("Os", json!(true))
                .with_output("Time", json!(true))
        );
    }

    #[test]
    fn test_invalid_scripts_rejected() {
        assert!(matches!(
            ScriptBlock::new("bad", "function execute("),
            Err(LavaError::ScriptError { .. })
        ));
        assert!(matches!(
            ScriptBlock::new("noentry", "x = 1"),
            Err(LavaError::ScriptError { .. })
        ));
    }

    #[test]
    fn test_default_permission_key() {
        let block = ScriptBlock::new("greet", GREET).unwrap();
        assert_eq!(block.permission_key(), "Execute");
        let block = block.with_permission_key("Greet");
        assert_eq!(block.permission_key(), "Greet");
    }
}
