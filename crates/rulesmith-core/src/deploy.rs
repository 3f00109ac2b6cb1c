use std::path::Path;
use std::process::Command;

use crate::{RuleError, Workspace};

/// Runs the external build task that promotes staged rules.
pub trait TaskRunner: Send + Sync {
    /// Run `task` with `root` as the working directory and return its output.
    fn run_task(&self, root: &Path, task: &str) -> Result<String, RuleError>;
}

/// Runs `make <task>`.
#[derive(Debug, Clone)]
pub struct MakeRunner {
    program: String,
}

impl MakeRunner {
    pub fn new() -> Self {
        Self {
            program: "make".to_string(),
        }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for MakeRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRunner for MakeRunner {
    fn run_task(&self, root: &Path, task: &str) -> Result<String, RuleError> {
        tracing::info!(program = %self.program, task, root = %root.display(), "running deploy task");
        let output = Command::new(&self.program)
            .arg(task)
            .current_dir(root)
            .output()
            .map_err(|e| RuleError::Deployment(format!("failed to run {} {}: {}", self.program, task, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if output.status.success() {
            Ok(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(RuleError::Deployment(format!(
                "{} {} exited with {}: {}",
                self.program,
                task,
                output.status,
                stderr.trim()
            )))
        }
    }
}

/// What a deployment run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeployReport {
    pub output: String,
    /// Staged files that are now present in the production directory
    pub promoted: Vec<String>,
}

/// Run the copy task, then report which of `staged` now sit in the production
/// directory with exactly the draft's content.
pub fn deploy(
    workspace: &Workspace,
    runner: &dyn TaskRunner,
    staged: &[String],
) -> Result<DeployReport, RuleError> {
    let output = runner.run_task(&workspace.root, &workspace.config.build_task)?;
    let rules_dir = workspace.rules_dir();
    let promoted = staged
        .iter()
        .filter(|name| {
            // A stale production copy from an earlier run does not count.
            match (
                std::fs::read(workspace.draft_path(name)),
                std::fs::read(rules_dir.join(name.as_str())),
            ) {
                (Ok(draft), Ok(live)) => !live.is_empty() && live == draft,
                _ => false,
            }
        })
        .cloned()
        .collect();
    Ok(DeployReport { output, promoted })
}

/// Steps the caller should take to confirm the rules are live.
pub fn verification_instructions(workspace: &Workspace, promoted: &[String]) -> Vec<String> {
    let rules = &workspace.config.rules_dir;
    let mut steps = vec![format!("List `{}` and confirm each deployed rule file is present", rules)];
    for name in promoted {
        steps.push(format!("Open `{}/{}` and check the header and critical rules", rules, name));
    }
    steps.push("Reload the editor so the assistant picks up the new rules".to_string());
    steps.push(format!(
        "If a rule is missing, run `make {}` manually and inspect its output",
        workspace.config.build_task
    ));
    steps
}
