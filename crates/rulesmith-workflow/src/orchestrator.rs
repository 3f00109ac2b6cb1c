use std::sync::Arc;

use serde_json::Value;

use rulesmith_core::deploy::TaskRunner;
use rulesmith_core::{RepositoryProfile, Workspace};
use rulesmith_suggest::Analyzer;

use crate::error::WorkflowError;
use crate::phases;
use crate::result::PhaseResult;
use crate::state::WorkflowState;

/// One `run_workflow_phase` call.
#[derive(Debug, Clone, Default)]
pub struct PhaseRequest {
    /// Kept wide so out-of-range values can be reported instead of rejected by the decoder
    pub phase: i64,
    pub repository_profile: Option<RepositoryProfile>,
    /// The state returned by the previous call, passed back untouched
    pub workflow_state: Option<Value>,
    /// Analysis text the caller produced itself (phase 1 only)
    pub analysis: Option<String>,
}

/// Runs workflow phases against one workspace. Holds no per-run state.
pub struct Orchestrator {
    workspace: Workspace,
    analyzer: Box<dyn Analyzer>,
    runner: Arc<dyn TaskRunner>,
}

impl Orchestrator {
    pub fn new(workspace: Workspace, analyzer: Box<dyn Analyzer>, runner: Box<dyn TaskRunner>) -> Self {
        Self {
            workspace,
            analyzer,
            runner: Arc::from(runner),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub async fn execute_phase(&self, request: PhaseRequest) -> PhaseResult {
        let PhaseRequest {
            phase,
            repository_profile,
            workflow_state,
            analysis,
        } = request;
        let original = workflow_state.clone().unwrap_or(Value::Null);

        let phase = match u8::try_from(phase).ok().filter(|p| (1..=5).contains(p)) {
            Some(p) => p,
            None => return self.reject(WorkflowError::InvalidPhase(phase), original),
        };

        let mut state = match WorkflowState::from_value(workflow_state.as_ref()) {
            Ok(state) => state,
            Err(e) if phase == 1 => {
                let mut fresh = WorkflowState::default();
                fresh.record(1, e.reason(), None, format!("{}; started a new workflow", e));
                fresh
            }
            Err(e) => return self.reject(e, original),
        };
        if let Err(e) = state.check_prerequisite(phase) {
            return self.reject(e, original);
        }

        if let Some(profile) = repository_profile {
            if phase == 1 || state.repository_profile.is_empty() {
                state.repository_profile = profile;
            }
        }

        tracing::info!(phase, "running workflow phase");
        let outcome = match phase {
            1 => {
                phases::analysis(
                    &mut state,
                    &self.workspace,
                    self.analyzer.as_ref(),
                    analysis.as_deref(),
                )
                .await
            }
            2 => phases::recommendation(&mut state, &self.workspace),
            3 => phases::workspace_prep(&mut state, &self.workspace),
            4 => phases::content_creation(&mut state, &self.workspace),
            _ => phases::deployment(&mut state, &self.workspace, Arc::clone(&self.runner)).await,
        };

        match state.to_value() {
            Ok(value) => {
                tracing::info!(phase, status = ?outcome.status, "workflow phase finished");
                outcome.into_result(value)
            }
            Err(e) => self.reject(e, original),
        }
    }

    fn reject(&self, err: WorkflowError, original: Value) -> PhaseResult {
        tracing::warn!(reason = err.reason(), error = %err, "workflow phase rejected");
        PhaseResult::failure(&err, original)
    }
}
