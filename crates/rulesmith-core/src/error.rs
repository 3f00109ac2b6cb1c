use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("cannot derive a file name from candidate `{0}`")]
    NameDerivation(String),

    #[error("rule `{name}` failed validation: {reason}")]
    ContentValidation { name: String, reason: String },

    #[error("malformed rule artifact: {0}")]
    Parse(String),

    #[error("{action} {}: {source}", path.display())]
    Materialization {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Deployment(String),
}

impl RuleError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RuleError::Materialization {
            action,
            path: path.into(),
            source,
        }
    }

    /// Stable snake_case tag, used when errors are recorded into workflow state.
    pub fn kind(&self) -> &'static str {
        match self {
            RuleError::NameDerivation(_) => "name_derivation",
            RuleError::ContentValidation { .. } => "content_validation",
            RuleError::Parse(_) => "content_validation",
            RuleError::Materialization { .. } => "materialization",
            RuleError::Deployment(_) => "deployment",
        }
    }
}
