// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The `workflowactivate` block.
//!
//! ```text
//! {% workflowactivate workflowtype:'Intake' activitytype:'Review' Reason:'{{ Reason }}' %}
//!   Started {{ Workflow.Name }} ({{ Activity.Name }}){{ Error }}
//! {% endworkflowactivate %}
//! ```
//!
//! The tag starts a new workflow of `workflowtype`, or continues the
//! workflow named by `workflowid`, optionally activating `activitytype`.
//! Every other parameter is an attribute value for the activity (when one
//! is activated) or the workflow. Attribute names match the target's keys
//! ignoring case; names the target does not define are dropped.
//!
//! Inside the body, `Workflow` and `Activity` hold the results, or `Error`
//! holds the reason nothing happened.
//!
//! # Service
//!
//! Lookups and activation go through a [`WorkflowService`]. The crate ships
//! [`MemoryWorkflowService`]; hosts plug in their own persistence.

mod memory;
mod types;

pub use memory::MemoryWorkflowService;
pub use types::{
    ActivationRequest, ActivationResult, ActivityInstance, ActivityTypeInfo, WorkflowError,
    WorkflowInstance, WorkflowResult, WorkflowTarget, WorkflowTypeInfo,
};

use crate::block::{BlockBody, BlockOutcome};
use crate::context::RenderContext;
use crate::identifier::EntityIdentifier;
use crate::markup::ElementAttributes;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Name the tag is registered under.
pub const TAG_NAME: &str = "workflowactivate";

/// Command that must be enabled for the tag to run.
pub const PERMISSION_KEY: &str = "WorkflowActivate";

const WORKFLOW_TYPE: &str = "workflowtype";
const WORKFLOW_ID: &str = "workflowid";
const WORKFLOW_NAME: &str = "workflowname";
const ACTIVITY_TYPE: &str = "activitytype";

/// Looks up and activates workflows.
pub trait WorkflowService: Send + Sync {
    /// Finds a workflow type.
    fn workflow_type(&self, identifier: &EntityIdentifier) -> WorkflowResult<Option<WorkflowTypeInfo>>;

    /// Finds an existing workflow.
    fn workflow(&self, identifier: &EntityIdentifier) -> WorkflowResult<Option<WorkflowInstance>>;

    /// Starts or continues a workflow.
    fn activate(&self, request: ActivationRequest) -> WorkflowResult<ActivationResult>;
}

/// The `workflowactivate` block tag.
pub struct WorkflowActivateBlock {
    service: Arc<dyn WorkflowService>,
}

impl WorkflowActivateBlock {
    /// Creates the tag backed by `service`.
    pub fn new(service: Arc<dyn WorkflowService>) -> Self {
        Self { service }
    }

    fn activate(&self, attributes: &ElementAttributes) -> Result<ActivationResult, String> {
        let workflow_id = non_blank(attributes.get_string_or_null(WORKFLOW_ID));
        let workflow_type = non_blank(attributes.get_string_or_null(WORKFLOW_TYPE));

        let (target, workflow_type) = match (workflow_id, workflow_type) {
            (Some(id), _) => {
                let workflow = EntityIdentifier::parse(id)
                    .map(|id| self.service.workflow(&id))
                    .transpose()
                    .map_err(|e| e.to_string())?
                    .flatten()
                    .ok_or("Workflow not found.")?;
                let workflow_type = self
                    .service
                    .workflow_type(&EntityIdentifier::Id(workflow.workflow_type_id))
                    .map_err(|e| e.to_string())?
                    .ok_or("Workflow type not found.")?;
                (WorkflowTarget::Existing(workflow), workflow_type)
            }
            (None, Some(type_name)) => {
                let workflow_type = EntityIdentifier::parse(type_name)
                    .map(|id| self.service.workflow_type(&id))
                    .transpose()
                    .map_err(|e| e.to_string())?
                    .flatten()
                    .ok_or("Workflow type not found.")?;
                (WorkflowTarget::New(workflow_type.clone()), workflow_type)
            }
            (None, None) => return Err("Must specify one of WorkflowType or WorkflowId.".to_string()),
        };

        let activity_type = match non_blank(attributes.get_string_or_null(ACTIVITY_TYPE)) {
            Some(value) => {
                let identifier = EntityIdentifier::parse(value).ok_or("Activity type not found.")?;
                let activity = workflow_type
                    .activity_types
                    .iter()
                    .find(|a| identifier.matches(a.id, &a.guid, &a.name))
                    .cloned()
                    .ok_or("Activity type not found.")?;
                Some(activity)
            }
            None => None,
        };

        let mut passthrough = attributes.clone();
        passthrough.remove([WORKFLOW_TYPE, WORKFLOW_ID, WORKFLOW_NAME, ACTIVITY_TYPE]);

        let keys = match &activity_type {
            Some(activity) => &activity.attribute_keys,
            None => &workflow_type.attribute_keys,
        };
        let values = match_attribute_keys(&passthrough, keys);

        let request = ActivationRequest {
            target,
            workflow_name: non_blank(attributes.get_string_or_null(WORKFLOW_NAME)).map(str::to_string),
            activity_type,
            attributes: values,
        };

        self.service.activate(request).map_err(|e| e.to_string())
    }
}

impl BlockBody for WorkflowActivateBlock {
    fn display_name(&self) -> &str {
        "WorkflowActivate"
    }

    fn permission_key(&self) -> &str {
        PERMISSION_KEY
    }

    fn execute(&self, attributes: &ElementAttributes, _ctx: &RenderContext) -> BlockOutcome {
        let result = match self.activate(attributes) {
            Ok(result) => result,
            Err(message) => return BlockOutcome::failed(message),
        };

        debug!(
            workflow = result.workflow.id,
            activity = ?result.activity.as_ref().map(|a| a.id),
            "Workflow activated"
        );

        let mut outcome = match serde_json::to_value(&result.workflow) {
            Ok(workflow) => BlockOutcome::completed().with_output("Workflow", workflow),
            Err(e) => return BlockOutcome::failed(e.to_string()),
        };
        if let Some(activity) = &result.activity {
            match serde_json::to_value(activity) {
                Ok(activity) => outcome = outcome.with_output("Activity", activity),
                Err(e) => return BlockOutcome::failed(e.to_string()),
            }
        }
        outcome
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Maps parameter names onto the target's attribute keys, ignoring case.
/// Parameters with no matching key are dropped.
fn match_attribute_keys(parameters: &ElementAttributes, keys: &[String]) -> BTreeMap<String, String> {
    let lookup: HashMap<String, &String> = keys.iter().map(|k| (k.to_lowercase(), k)).collect();

    parameters
        .iter()
        .filter_map(|(name, value)| match lookup.get(name) {
            Some(actual) => Some(((*actual).clone(), value.to_string())),
            None => {
                debug!(attribute = %name, "Ignoring unknown workflow attribute");
                None
            }
        })
        .collect()
}
