use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Success,
    /// The phase completed but some items failed
    Partial,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub item: String,
    pub done: bool,
}

impl ChecklistItem {
    pub fn new(item: impl Into<String>, done: bool) -> Self {
        Self {
            item: item.into(),
            done,
        }
    }
}

/// What a phase call returns to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub status: PhaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub message: String,
    pub checklist: Vec<ChecklistItem>,
    pub data: Value,
    pub workflow_state: Value,
    pub next_phase: Option<u8>,
    pub next_steps: Vec<String>,
}

impl PhaseResult {
    /// A call-level failure. `state` is whatever the caller sent, returned as is.
    pub fn failure(err: &WorkflowError, state: Value) -> Self {
        let next_phase = match err {
            WorkflowError::PrerequisiteNotMet { required, .. } => Some(*required),
            _ => None,
        };
        let next_steps = match err {
            WorkflowError::PrerequisiteNotMet { required, .. } => vec![format!(
                "Run phase {} first, then retry with the workflow_state it returns",
                required
            )],
            WorkflowError::InvalidPhase(_) => {
                vec!["Call run_workflow_phase with a phase between 1 and 5".to_string()]
            }
            WorkflowError::InvalidState(_) => vec![
                "Pass back the workflow_state from the previous phase unmodified, \
or run phase 1 to start over"
                    .to_string(),
            ],
        };
        Self {
            status: PhaseStatus::Error,
            reason: Some(err.reason().to_string()),
            message: err.to_string(),
            checklist: Vec::new(),
            data: Value::Null,
            workflow_state: state,
            next_phase,
            next_steps,
        }
    }
}

/// Phase output before the updated state is attached.
pub(crate) struct PhaseOutcome {
    pub status: PhaseStatus,
    pub reason: Option<String>,
    pub message: String,
    pub checklist: Vec<ChecklistItem>,
    pub data: Value,
    pub next_phase: Option<u8>,
    pub next_steps: Vec<String>,
}

impl PhaseOutcome {
    pub fn into_result(self, workflow_state: Value) -> PhaseResult {
        PhaseResult {
            status: self.status,
            reason: self.reason,
            message: self.message,
            checklist: self.checklist,
            data: self.data,
            workflow_state,
            next_phase: self.next_phase,
            next_steps: self.next_steps,
        }
    }
}
