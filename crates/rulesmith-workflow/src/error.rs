use thiserror::Error;

/// Call-level failures. Each one leaves the caller's state untouched.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("phase {phase} requires phase {required} to be complete")]
    PrerequisiteNotMet { phase: u8, required: u8 },

    #[error("invalid phase {0}; phases are numbered 1 to 5")]
    InvalidPhase(i64),

    #[error("invalid workflow state: {0}")]
    InvalidState(String),
}

impl WorkflowError {
    pub fn reason(&self) -> &'static str {
        match self {
            WorkflowError::PrerequisiteNotMet { .. } => "prerequisite_not_met",
            WorkflowError::InvalidPhase(_) => "invalid_phase",
            WorkflowError::InvalidState(_) => "invalid_state",
        }
    }
}
