// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! In-memory workflow service for testing and the CLI.

use super::{
    ActivationRequest, ActivationResult, ActivityInstance, WorkflowError, WorkflowInstance,
    WorkflowResult, WorkflowService, WorkflowTarget, WorkflowTypeInfo,
};
use crate::identifier::EntityIdentifier;
use std::collections::BTreeMap;
use std::sync::RwLock;

#[derive(Default)]
struct State {
    types: Vec<WorkflowTypeInfo>,
    workflows: BTreeMap<i64, WorkflowInstance>,
    next_workflow_id: i64,
    next_activity_id: i64,
}

/// In-memory workflow service.
///
/// Workflow types are registered up front; activated workflows live until
/// the service is dropped.
pub struct MemoryWorkflowService {
    state: RwLock<State>,
}

impl MemoryWorkflowService {
    /// Creates an empty service.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                next_workflow_id: 1,
                next_activity_id: 1,
                ..State::default()
            }),
        }
    }

    /// Adds a workflow type.
    pub fn with_workflow_type(self, workflow_type: WorkflowTypeInfo) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.types.push(workflow_type);
        }
        self
    }

    /// Snapshot of every workflow activated so far, ordered by id.
    pub fn workflows(&self) -> Vec<WorkflowInstance> {
        self.state
            .read()
            .map(|state| state.workflows.values().cloned().collect())
            .unwrap_or_default()
    }

    fn storage_error<E: std::fmt::Display>(err: E) -> WorkflowError {
        WorkflowError(format!("Workflow storage error: {}", err))
    }
}

impl Default for MemoryWorkflowService {
    fn default() -> Self {
        Self::new()
    }
}

fn workflow_guid(id: i64) -> String {
    format!("00000000-0000-4000-8000-{:012x}", id)
}

impl WorkflowService for MemoryWorkflowService {
    fn workflow_type(&self, identifier: &EntityIdentifier) -> WorkflowResult<Option<WorkflowTypeInfo>> {
        let state = self.state.read().map_err(Self::storage_error)?;
        Ok(state
            .types
            .iter()
            .find(|t| identifier.matches(t.id, &t.guid, &t.name))
            .cloned())
    }

    fn workflow(&self, identifier: &EntityIdentifier) -> WorkflowResult<Option<WorkflowInstance>> {
        let state = self.state.read().map_err(Self::storage_error)?;
        Ok(state
            .workflows
            .values()
            .find(|w| identifier.matches(w.id, &w.guid, &w.name))
            .cloned())
    }

    fn activate(&self, request: ActivationRequest) -> WorkflowResult<ActivationResult> {
        let mut state = self.state.write().map_err(Self::storage_error)?;

        let mut workflow = match request.target {
            WorkflowTarget::New(workflow_type) => {
                let id = state.next_workflow_id;
                state.next_workflow_id += 1;
                WorkflowInstance {
                    id,
                    guid: workflow_guid(id),
                    name: request.workflow_name.unwrap_or_else(|| workflow_type.name.clone()),
                    workflow_type_id: workflow_type.id,
                    status: "Active".to_string(),
                    attributes: BTreeMap::new(),
                    activities: Vec::new(),
                }
            }
            WorkflowTarget::Existing(existing) => state
                .workflows
                .get(&existing.id)
                .cloned()
                .ok_or_else(|| WorkflowError("Workflow not found.".to_string()))?,
        };

        let activity = match request.activity_type {
            Some(activity_type) => {
                let id = state.next_activity_id;
                state.next_activity_id += 1;
                let activity = ActivityInstance {
                    id,
                    activity_type_id: activity_type.id,
                    name: activity_type.name,
                    attributes: request.attributes,
                };
                workflow.activities.push(activity.clone());
                Some(activity)
            }
            None => {
                workflow.attributes.extend(request.attributes);
                None
            }
        };

        state.workflows.insert(workflow.id, workflow.clone());
        Ok(ActivationResult { workflow, activity })
    }
}
