// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Scoped merge field storage.
//!
//! A [`RenderContext`] is a stack of scopes. Output expressions read merge
//! fields from the innermost scope outwards; custom tags write into either
//! the innermost scope ([`Visibility::Local`]) or the root scope
//! ([`Visibility::Root`]).
//!
//! Child scopes only exist for the duration of
//! [`RenderContext::execute_in_child_scope`]. The scope is popped by a drop
//! guard, so it is removed on normal return, on an early `Err` return from
//! the callback, and while unwinding.
//!
//! ```rust
//! use lava::{RenderContext, Visibility};
//! use serde_json::json;
//!
//! let mut ctx = RenderContext::new();
//! ctx.set_merge_field("X", json!(1), Visibility::Local);
//!
//! ctx.execute_in_child_scope(|child| {
//!     child.set_merge_field("X", json!(2), Visibility::Local);
//!     child.set_merge_field("Y", json!(5), Visibility::Root);
//!     assert_eq!(child.get_merge_field("X"), Some(&json!(2)));
//! });
//!
//! assert_eq!(ctx.get_merge_field("X"), Some(&json!(1)));
//! assert_eq!(ctx.get_merge_field("Y"), Some(&json!(5)));
//! ```

use crate::error::{LavaError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

/// Where a merge field write lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// The innermost scope: visible to the current block and its children.
    Local,
    /// The outermost scope: visible to the rest of the template.
    Root,
}

#[derive(Debug, Clone)]
struct MergeField {
    value: Value,
    visibility: Visibility,
}

type Scope = HashMap<String, MergeField>;

/// Hierarchical merge field environment for one render pass.
#[derive(Debug, Clone)]
pub struct RenderContext {
    scopes: Vec<Scope>,
    enabled_commands: Vec<String>,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContext {
    /// Creates a context with an empty root scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
            enabled_commands: Vec::new(),
        }
    }

    /// Creates a context whose root scope holds the given merge fields.
    pub fn with_merge_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut ctx = Self::new();
        for (name, value) in fields {
            ctx.set_merge_field(name, value, Visibility::Root);
        }
        ctx
    }

    /// Creates a context from a JSON object; each top-level key becomes a
    /// root merge field.
    ///
    /// # Errors
    ///
    /// Returns [`LavaError::RenderError`] when `data` is not an object or null.
    pub fn from_json(data: Value) -> Result<Self> {
        match data {
            Value::Object(map) => Ok(Self::with_merge_fields(map)),
            Value::Null => Ok(Self::new()),
            other => Err(LavaError::RenderError(format!(
                "Merge field data must be an object, found {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Sets the commands this render pass is allowed to use.
    pub fn with_enabled_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_enabled_commands(commands);
        self
    }

    /// Replaces the enabled commands list.
    pub fn set_enabled_commands<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled_commands = commands.into_iter().map(Into::into).collect();
    }

    /// The commands enabled for this render pass.
    pub fn enabled_commands(&self) -> &[String] {
        &self.enabled_commands
    }

    /// Writes a merge field into the innermost or the root scope.
    pub fn set_merge_field(&mut self, name: impl Into<String>, value: Value, visibility: Visibility) {
        let scope = match visibility {
            Visibility::Local => self.scopes.len() - 1,
            Visibility::Root => 0,
        };
        self.scopes[scope].insert(name.into(), MergeField { value, visibility });
    }

    /// Looks a merge field up from the innermost scope outwards.
    ///
    /// `None` means the name is not defined anywhere; a stored JSON `null`
    /// is returned as `Some(&Value::Null)`.
    pub fn get_merge_field(&self, name: &str) -> Option<&Value> {
        self.find(name).map(|field| &field.value)
    }

    /// The visibility the visible binding of `name` was written with.
    pub fn merge_field_visibility(&self, name: &str) -> Option<Visibility> {
        self.find(name).map(|field| field.visibility)
    }

    /// Resolves a dotted path such as `Person.Emails.0.Address`.
    ///
    /// The first segment is a merge field; later segments index objects by
    /// key and arrays by position.
    pub fn get_value_path<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Value> {
        let (first, rest) = segments.split_first()?;
        let mut current = self.get_merge_field(first.as_ref())?;

        for segment in rest {
            let segment = segment.as_ref();
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => match segment {
                    "first" => items.first()?,
                    "last" => items.last()?,
                    _ => items.get(segment.parse::<usize>().ok()?)?,
                },
                _ => return None,
            };
        }

        Some(current)
    }

    /// Runs `callback` inside a new, empty scope.
    ///
    /// The scope is popped when the callback returns or unwinds. `Local`
    /// writes made inside the callback disappear with it; `Root` writes
    /// target scope 0 directly and remain visible.
    pub fn execute_in_child_scope<T, F>(&mut self, callback: F) -> T
    where
        F: FnOnce(&mut RenderContext) -> T,
    {
        self.scopes.push(Scope::new());
        let mut guard = ScopeGuard { ctx: self };
        callback(&mut *guard)
    }

    /// Number of scopes currently on the stack (1 at the root).
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// A flattened snapshot of every visible merge field.
    ///
    /// Inner scopes shadow outer ones.
    pub fn visible_merge_fields(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for scope in &self.scopes {
            for (name, field) in scope {
                map.insert(name.clone(), field.value.clone());
            }
        }
        map
    }

    fn find(&self, name: &str) -> Option<&MergeField> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}

/// Pops the innermost scope when dropped.
struct ScopeGuard<'a> {
    ctx: &'a mut RenderContext,
}

impl Deref for ScopeGuard<'_> {
    type Target = RenderContext;

    fn deref(&self) -> &RenderContext {
        &*self.ctx
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut RenderContext {
        &mut *self.ctx
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if self.ctx.scopes.len() > 1 {
            self.ctx.scopes.pop();
        }
    }
}

/// Short JSON type name for messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn test_local_write_is_contained() {
        let mut ctx = RenderContext::with_merge_fields([("X", json!(1))]);

        ctx.execute_in_child_scope(|child| {
            child.set_merge_field("X", json!(2), Visibility::Local);
            assert_eq!(child.get_merge_field("X"), Some(&json!(2)));
        });

        assert_eq!(ctx.get_merge_field("X"), Some(&json!(1)));
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn test_root_write_survives_scope_exit() {
        let mut ctx = RenderContext::new();

        ctx.execute_in_child_scope(|child| {
            child.execute_in_child_scope(|grandchild| {
                grandchild.set_merge_field("Y", json!(5), Visibility::Root);
                assert_eq!(grandchild.depth(), 3);
            });
        });

        assert_eq!(ctx.get_merge_field("Y"), Some(&json!(5)));
        assert_eq!(ctx.merge_field_visibility("Y"), Some(Visibility::Root));
    }

    #[test]
    fn test_missing_is_distinct_from_null() {
        let ctx = RenderContext::with_merge_fields([("Nothing", Value::Null)]);
        assert_eq!(ctx.get_merge_field("Nothing"), Some(&Value::Null));
        assert_eq!(ctx.get_merge_field("Missing"), None);
    }

    #[test]
    fn test_scope_popped_on_error_return() {
        let mut ctx = RenderContext::new();
        let result: std::result::Result<(), &str> = ctx.execute_in_child_scope(|child| {
            child.set_merge_field("Temp", json!(true), Visibility::Local);
            Err("failed")
        });

        assert!(result.is_err());
        assert_eq!(ctx.depth(), 1);
        assert_eq!(ctx.get_merge_field("Temp"), None);
    }

    #[test]
    fn test_scope_popped_on_panic() {
        let mut ctx = RenderContext::new();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            ctx.execute_in_child_scope(|child| {
                child.set_merge_field("Temp", json!(1), Visibility::Local);
                panic!("tag blew up");
            })
        }));

        assert!(outcome.is_err());
        assert_eq!(ctx.depth(), 1);
        assert_eq!(ctx.get_merge_field("Temp"), None);
    }

    #[test]
    fn test_reentrant_scopes_shadow_and_restore() {
        let mut ctx = RenderContext::with_merge_fields([("Level", json!(0))]);

        ctx.execute_in_child_scope(|outer| {
            outer.set_merge_field("Level", json!(1), Visibility::Local);
            outer.execute_in_child_scope(|inner| {
                inner.set_merge_field("Level", json!(2), Visibility::Local);
                assert_eq!(inner.get_merge_field("Level"), Some(&json!(2)));
            });
            assert_eq!(outer.get_merge_field("Level"), Some(&json!(1)));
        });

        assert_eq!(ctx.get_merge_field("Level"), Some(&json!(0)));
    }

    #[test]
    fn test_value_path() {
        let ctx = RenderContext::from_json(json!({
            "Person": { "NickName": "Ted", "Emails": [ { "Address": "ted@example.com" } ] }
        }))
        .unwrap();

        assert_eq!(ctx.get_value_path(&["Person", "NickName"]), Some(&json!("Ted")));
        assert_eq!(
            ctx.get_value_path(&["Person", "Emails", "0", "Address"]),
            Some(&json!("ted@example.com"))
        );
        assert_eq!(
            ctx.get_value_path(&["Person", "Emails", "first", "Address"]),
            Some(&json!("ted@example.com"))
        );
        assert_eq!(ctx.get_value_path(&["Person", "Missing"]), None);
        assert_eq!(ctx.get_value_path::<&str>(&[]), None);
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(RenderContext::from_json(json!([1, 2])).is_err());
        assert_eq!(RenderContext::from_json(Value::Null).unwrap().depth(), 1);
    }

    #[test]
    fn test_visible_merge_fields_inner_shadows_outer() {
        let mut ctx = RenderContext::with_merge_fields([("A", json!(1)), ("B", json!(1))]);
        ctx.execute_in_child_scope(|child| {
            child.set_merge_field("B", json!(2), Visibility::Local);
            let visible = child.visible_merge_fields();
            assert_eq!(visible.get("A"), Some(&json!(1)));
            assert_eq!(visible.get("B"), Some(&json!(2)));
        });
    }

    #[test]
    fn test_enabled_commands() {
        let ctx = RenderContext::new().with_enabled_commands(["WorkflowActivate", "Execute"]);
        assert_eq!(ctx.enabled_commands(), &["WorkflowActivate".to_string(), "Execute".to_string()]);
    }
}
