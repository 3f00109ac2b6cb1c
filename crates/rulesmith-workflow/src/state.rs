use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use rulesmith_core::{AnalysisResults, RepositoryProfile, RuleCandidate, RuleError};

use crate::error::WorkflowError;

/// Bumped whenever the shape of [`WorkflowState`] changes incompatibly.
pub const STATE_VERSION: u32 = 1;

fn state_version() -> u32 {
    STATE_VERSION
}

/// One recorded failure. Nothing that goes wrong during a phase is only logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ErrorRecord {
    pub phase: u8,
    /// snake_case error class, e.g. "content_validation"
    pub kind: String,
    /// The candidate, file or operation the error concerns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

/// All progress of one workflow run. The caller holds it between calls and
/// passes it back unmodified; nothing is kept server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WorkflowState {
    #[serde(default = "state_version")]
    pub version: u32,
    #[serde(default)]
    pub repository_profile: RepositoryProfile,
    #[serde(default)]
    pub phase_1_complete: bool,
    #[serde(default)]
    pub phase_2_complete: bool,
    #[serde(default)]
    pub phase_3_complete: bool,
    #[serde(default)]
    pub phase_4_complete: bool,
    #[serde(default)]
    pub phase_5_complete: bool,
    #[serde(default)]
    pub workspace_prepared: bool,
    #[serde(default)]
    pub analysis_results: Option<AnalysisResults>,
    #[serde(default)]
    pub recommended_rules: Vec<RuleCandidate>,
    #[serde(default)]
    pub selected_rules: Vec<RuleCandidate>,
    /// Derived slug → draft file name, one entry per selected rule
    #[serde(default)]
    pub rule_file_names: BTreeMap<String, String>,
    #[serde(default)]
    pub created_rules: Vec<String>,
    #[serde(default)]
    pub deployed_rules: Vec<String>,
    #[serde(default)]
    pub errors: Vec<ErrorRecord>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            repository_profile: RepositoryProfile::default(),
            phase_1_complete: false,
            phase_2_complete: false,
            phase_3_complete: false,
            phase_4_complete: false,
            phase_5_complete: false,
            workspace_prepared: false,
            analysis_results: None,
            recommended_rules: Vec::new(),
            selected_rules: Vec::new(),
            rule_file_names: BTreeMap::new(),
            created_rules: Vec::new(),
            deployed_rules: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl WorkflowState {
    /// Decode a caller-supplied state. `None` and `null` give a fresh state.
    pub fn from_value(value: Option<&Value>) -> Result<Self, WorkflowError> {
        let value = match value {
            None | Some(Value::Null) => return Ok(Self::default()),
            Some(v) => v,
        };
        let state: WorkflowState = serde_json::from_value(value.clone())
            .map_err(|e| WorkflowError::InvalidState(e.to_string()))?;
        if state.version != STATE_VERSION {
            return Err(WorkflowError::InvalidState(format!(
                "unsupported state version {} (expected {})",
                state.version, STATE_VERSION
            )));
        }
        Ok(state)
    }

    pub fn to_value(&self) -> Result<Value, WorkflowError> {
        serde_json::to_value(self).map_err(|e| WorkflowError::InvalidState(e.to_string()))
    }

    pub fn is_complete(&self, phase: u8) -> bool {
        match phase {
            1 => self.phase_1_complete,
            2 => self.phase_2_complete,
            3 => self.phase_3_complete,
            4 => self.phase_4_complete,
            5 => self.phase_5_complete,
            _ => false,
        }
    }

    /// Completion flags only ever go from false to true.
    pub fn mark_complete(&mut self, phase: u8) {
        match phase {
            1 => self.phase_1_complete = true,
            2 => self.phase_2_complete = true,
            3 => self.phase_3_complete = true,
            4 => self.phase_4_complete = true,
            5 => self.phase_5_complete = true,
            _ => {}
        }
    }

    pub fn check_prerequisite(&self, phase: u8) -> Result<(), WorkflowError> {
        if phase > 1 && !self.is_complete(phase - 1) {
            return Err(WorkflowError::PrerequisiteNotMet {
                phase,
                required: phase - 1,
            });
        }
        Ok(())
    }

    pub fn record(&mut self, phase: u8, kind: &str, subject: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(phase, kind, subject = subject.unwrap_or(""), %message, "workflow error recorded");
        self.errors.push(ErrorRecord {
            phase,
            kind: kind.to_string(),
            subject: subject.map(str::to_string),
            message,
        });
    }

    pub fn record_rule_error(&mut self, phase: u8, subject: Option<&str>, err: &RuleError) {
        self.record(phase, err.kind(), subject, err.to_string());
    }

    /// Free-text summary of everything known about the repository, fed to the
    /// recommendation engine.
    pub fn repository_summary(&self) -> String {
        let mut parts = vec![self.repository_profile.summary()];
        if let Some(a) = &self.analysis_results {
            parts.push(a.repo_type.clone());
            parts.extend(a.common_patterns.iter().cloned());
            parts.extend(a.recommended_rule_hints.iter().cloned());
        }
        parts
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_state_is_fresh() {
        assert_eq!(WorkflowState::from_value(None).unwrap(), WorkflowState::default());
        assert_eq!(
            WorkflowState::from_value(Some(&Value::Null)).unwrap(),
            WorkflowState::default()
        );
    }

    #[test]
    fn sparse_state_fills_defaults() {
        let state = WorkflowState::from_value(Some(&json!({"phase_1_complete": true}))).unwrap();
        assert!(state.phase_1_complete);
        assert_eq!(state.version, STATE_VERSION);
        assert!(state.selected_rules.is_empty());
    }

    #[test]
    fn wrong_shape_or_version_is_invalid() {
        let err = WorkflowState::from_value(Some(&json!({"phase_1_complete": "yes"}))).unwrap_err();
        assert_eq!(err.reason(), "invalid_state");
        let err = WorkflowState::from_value(Some(&json!({"version": 99}))).unwrap_err();
        assert_eq!(err.reason(), "invalid_state");
        assert!(WorkflowState::from_value(Some(&json!([1, 2]))).is_err());
    }

    #[test]
    fn prerequisites_follow_phase_order() {
        let mut state = WorkflowState::default();
        assert!(state.check_prerequisite(1).is_ok());
        assert!(state.check_prerequisite(2).is_err());
        state.mark_complete(1);
        assert!(state.check_prerequisite(2).is_ok());
        assert!(state.check_prerequisite(3).is_err());
    }

    #[test]
    fn summary_includes_analysis() {
        let mut state = WorkflowState::default();
        state.repository_profile.description = "inventory service".into();
        state.analysis_results = Some(AnalysisResults {
            repo_type: "python web service".into(),
            common_patterns: vec![],
            recommended_rule_hints: vec!["pytest-testing".into()],
        });
        assert_eq!(
            state.repository_summary(),
            "inventory service python web service pytest-testing"
        );
    }
}
