// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Type definitions for workflow activation.
//!
//! Everything serializes with PascalCase keys so templates read them the way
//! authors expect: `{{ Workflow.Id }}`, `{{ Activity.Name }}`. Type
//! definitions deserialize from snake_case, as written in `lava.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type for workflow service calls.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// A failure reported by a workflow service. The message is shown to the
/// template author as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct WorkflowError(pub String);

/// An activity definition within a workflow type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "PascalCase"))]
pub struct ActivityTypeInfo {
    /// Primary key.
    pub id: i64,
    /// Unique identifier.
    pub guid: String,
    /// Display name.
    pub name: String,
    /// Attribute keys an activity of this type accepts.
    #[serde(default)]
    pub attribute_keys: Vec<String>,
}

impl ActivityTypeInfo {
    /// Creates an activity type with no attributes.
    pub fn new(id: i64, guid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            guid: guid.into(),
            name: name.into(),
            attribute_keys: Vec::new(),
        }
    }

    /// Sets the attribute keys.
    pub fn with_attribute_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// A workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "PascalCase"))]
pub struct WorkflowTypeInfo {
    /// Primary key.
    pub id: i64,
    /// Unique identifier.
    pub guid: String,
    /// Display name.
    pub name: String,
    /// Attribute keys a workflow of this type accepts.
    #[serde(default)]
    pub attribute_keys: Vec<String>,
    /// Activities defined by this type.
    #[serde(default)]
    pub activity_types: Vec<ActivityTypeInfo>,
}

impl WorkflowTypeInfo {
    /// Creates a workflow type with no attributes or activities.
    pub fn new(id: i64, guid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            guid: guid.into(),
            name: name.into(),
            attribute_keys: Vec::new(),
            activity_types: Vec::new(),
        }
    }

    /// Sets the attribute keys.
    pub fn with_attribute_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an activity type.
    pub fn with_activity(mut self, activity: ActivityTypeInfo) -> Self {
        self.activity_types.push(activity);
        self
    }
}

/// A running activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivityInstance {
    /// Primary key.
    pub id: i64,
    /// The activity's type.
    pub activity_type_id: i64,
    /// Display name.
    pub name: String,
    /// Attribute values by key.
    pub attributes: BTreeMap<String, String>,
}

/// A running workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkflowInstance {
    /// Primary key.
    pub id: i64,
    /// Unique identifier.
    pub guid: String,
    /// Display name.
    pub name: String,
    /// The workflow's type.
    pub workflow_type_id: i64,
    /// Processing status, such as `Active`.
    pub status: String,
    /// Attribute values by key.
    pub attributes: BTreeMap<String, String>,
    /// Activities activated so far.
    pub activities: Vec<ActivityInstance>,
}

/// Which workflow an activation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowTarget {
    /// Start a new workflow of this type.
    New(WorkflowTypeInfo),
    /// Continue an existing workflow.
    Existing(WorkflowInstance),
}

/// Everything the service needs to activate a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRequest {
    /// The workflow to activate.
    pub target: WorkflowTarget,
    /// Name for a new workflow; defaults to the type name.
    pub workflow_name: Option<String>,
    /// Activity to activate, already resolved against the workflow type.
    pub activity_type: Option<ActivityTypeInfo>,
    /// Attribute values keyed by the target's actual attribute keys.
    pub attributes: BTreeMap<String, String>,
}

/// The outcome of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationResult {
    /// The workflow after activation.
    pub workflow: WorkflowInstance,
    /// The activated activity, when one was requested.
    pub activity: Option<ActivityInstance>,
}
