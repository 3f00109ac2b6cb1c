//! Five-phase rule generation workflow: analysis, recommendation, workspace
//! preparation, content creation, deployment.
//!
//! The caller owns the [`WorkflowState`] and threads it through each call; a
//! phase either advances it or, when it cannot run at all, hands the input
//! back unchanged.

pub mod error;
mod orchestrator;
mod phases;
pub mod result;
pub mod state;

pub use error::WorkflowError;
pub use orchestrator::{Orchestrator, PhaseRequest};
pub use result::{ChecklistItem, PhaseResult, PhaseStatus};
pub use state::{ErrorRecord, WorkflowState, STATE_VERSION};
