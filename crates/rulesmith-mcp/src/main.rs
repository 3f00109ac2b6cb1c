use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use rulesmith_core::deploy::MakeRunner;
use rulesmith_core::{library, materialize, recommend, template, RepositoryProfile, Workspace};
use rulesmith_workflow::{Orchestrator, PhaseRequest, PhaseStatus};
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod init;

/// Every tool the server must expose. Checked against the router at startup.
const TOOL_NAMES: &[&str] = &[
    "analyze_repository",
    "recommend_rules",
    "get_static_rule",
    "get_static_rules",
    "list_static_rules",
    "save_rule",
    "prepare_workspace",
    "run_workflow_phase",
];

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AnalyzeRepositoryRequest {
    /// Free-text description of what the repository is for
    repo_description: String,
    /// Primary languages, e.g. ["python", "typescript"]
    #[serde(default)]
    main_languages: Vec<String>,
    /// Globs for the files that matter, e.g. ["src/**/*.py", "tests/**/*.py"]
    #[serde(default)]
    file_patterns: Vec<String>,
    /// Frameworks, tools and notable features, e.g. ["fastapi", "docker", "pytest"]
    #[serde(default)]
    key_features: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RecommendRulesRequest {
    /// One paragraph describing the repository: languages, frameworks, tooling, workflow
    repository_summary: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetStaticRuleRequest {
    /// Name of a built-in rule, e.g. "python-best-practices". See list_static_rules.
    rule_name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetStaticRulesRequest {
    /// Names of built-in rules
    rule_names: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SaveRuleRequest {
    /// Human-readable rule name; the file name is derived from it
    rule_name: String,
    /// The full rule artifact: `---` header with description/globs/alwaysApply, then the markdown body
    content: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RunWorkflowPhaseRequest {
    /// Phase to run, 1 to 5: analysis, recommendation, workspace preparation, content creation, deployment
    phase: i64,
    /// Repository profile. Required for phase 1; later phases reuse the one stored in workflow_state.
    #[serde(default)]
    repository_profile: Option<RepositoryProfile>,
    /// The workflow_state returned by the previous phase, passed back unmodified. Omit for phase 1 of a new run.
    #[serde(default)]
    workflow_state: Option<serde_json::Value>,
    /// Phase 1 only: your own answer to the analyze_repository prompt. When omitted the server analyzes the profile itself.
    #[serde(default)]
    analysis: Option<String>,
}

// --- Server ---

#[derive(Clone)]
pub struct RulesmithServer {
    orchestrator: Arc<Orchestrator>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl RulesmithServer {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            tool_router: Self::tool_router(),
        }
    }

    fn workspace(&self) -> &Workspace {
        self.orchestrator.workspace()
    }

    /// Registered tool names that differ from [`TOOL_NAMES`], as (missing, undeclared).
    fn registry_mismatch(&self) -> Option<(Vec<String>, Vec<String>)> {
        let registered: BTreeSet<String> = self
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        let declared: BTreeSet<String> = TOOL_NAMES.iter().map(|n| n.to_string()).collect();
        if registered == declared {
            return None;
        }
        Some((
            declared.difference(&registered).cloned().collect(),
            registered.difference(&declared).cloned().collect(),
        ))
    }

    #[tool(
        description = "Build the repository analysis prompt. Answer it yourself and pass the answer to run_workflow_phase (phase 1) as `analysis`, or skip this and let phase 1 analyze the profile. The answer should be a JSON object {repo_type, common_patterns, recommended_rules}."
    )]
    fn analyze_repository(
        &self,
        Parameters(req): Parameters<AnalyzeRepositoryRequest>,
    ) -> Result<CallToolResult, McpError> {
        let profile = RepositoryProfile {
            description: req.repo_description,
            main_languages: req.main_languages,
            file_patterns: req.file_patterns,
            key_features: req.key_features,
        };
        Ok(CallToolResult::success(vec![Content::text(
            rulesmith_suggest::analysis_prompt(&profile),
        )]))
    }

    #[tool(
        description = "Recommend rules for a repository summary. Returns a JSON array of candidates [{name, category, description, globs, rule_type, priority, dependencies?, matched_keywords}] ordered by priority, highest first. An empty array means nothing matched."
    )]
    fn recommend_rules(
        &self,
        Parameters(req): Parameters<RecommendRulesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut candidates = recommend::recommend(&req.repository_summary);
        recommend::infer_dependencies(&mut candidates);
        tracing::debug!(count = candidates.len(), "recommend_rules");
        let json = serde_json::to_string_pretty(&candidates)
            .unwrap_or_else(|e| format!("Serialization error: {}", e));
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get one built-in rule, rendered as a complete rule file. Returns {rule_name, content}.")]
    fn get_static_rule(
        &self,
        Parameters(req): Parameters<GetStaticRuleRequest>,
    ) -> Result<CallToolResult, McpError> {
        match template::static_rule(&req.rule_name) {
            Some(content) => {
                let body = json!({ "rule_name": req.rule_name, "content": content });
                Ok(CallToolResult::success(vec![Content::text(body.to_string())]))
            }
            None => Ok(CallToolResult::error(vec![Content::text(format!(
                "Unknown rule '{}'. Available: {}",
                req.rule_name,
                library::names().join(", ")
            ))])),
        }
    }

    #[tool(
        description = "Get several built-in rules at once. Returns {rules: [{rule_name, content} | {rule_name, error}]}; unknown names get an error entry instead of failing the call."
    )]
    fn get_static_rules(
        &self,
        Parameters(req): Parameters<GetStaticRulesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let rules: Vec<serde_json::Value> = req
            .rule_names
            .iter()
            .map(|name| match template::static_rule(name) {
                Some(content) => json!({ "rule_name": name, "content": content }),
                None => json!({ "rule_name": name, "error": format!("unknown rule '{}'", name) }),
            })
            .collect();
        let json = serde_json::to_string_pretty(&json!({ "rules": rules }))
            .unwrap_or_else(|e| format!("Serialization error: {}", e));
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List the built-in rules with their descriptions")]
    fn list_static_rules(&self) -> Result<CallToolResult, McpError> {
        let text = library::BLUEPRINTS
            .iter()
            .map(|b| format!("{}: {}", b.name, b.description))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(
        description = "Validate a rule file and save it to the drafts directory. Deploy it with run_workflow_phase phase 5 or the build task."
    )]
    fn save_rule(
        &self,
        Parameters(req): Parameters<SaveRuleRequest>,
    ) -> Result<CallToolResult, McpError> {
        match materialize::save_rule(self.workspace(), &req.rule_name, &req.content) {
            Ok(path) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Saved rule '{}' to {}",
                req.rule_name,
                self.workspace().display_path(&path)
            ))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Failed to save rule '{}': {}",
                req.rule_name, e
            ))])),
        }
    }

    #[tool(
        description = "Create the drafts and production rule directories and return setup instructions for the build task and ignore file"
    )]
    fn prepare_workspace(&self) -> Result<CallToolResult, McpError> {
        match materialize::prepare_workspace(self.workspace()) {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text(
                materialize::workspace_instructions(self.workspace()),
            )])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    #[tool(
        description = "Run one workflow phase (1 to 5) and return {status, reason?, message, checklist, data, workflow_state, next_phase, next_steps}. Always pass back the workflow_state from the previous call unmodified. Phases must run in order; a phase whose predecessor is incomplete returns reason \"prerequisite_not_met\" and your state unchanged."
    )]
    async fn run_workflow_phase(
        &self,
        Parameters(req): Parameters<RunWorkflowPhaseRequest>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .orchestrator
            .execute_phase(PhaseRequest {
                phase: req.phase,
                repository_profile: req.repository_profile,
                workflow_state: req.workflow_state,
                analysis: req.analysis,
            })
            .await;
        let json = serde_json::to_string_pretty(&result)
            .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
        if result.status == PhaseStatus::Error {
            Ok(CallToolResult::error(vec![Content::text(json)]))
        } else {
            Ok(CallToolResult::success(vec![Content::text(json)]))
        }
    }
}

#[tool_handler]
impl ServerHandler for RulesmithServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

const INSTRUCTIONS: &str = r#"rulesmith generates rule files that steer AI coding assistants, stages them as drafts and deploys them into the editor's rules directory.

## Workflow

Call `run_workflow_phase` five times, in order, each time passing the `workflow_state` returned by the previous call:

1. Analysis: send `repository_profile` {description, main_languages, file_patterns, key_features}. Optionally pass your own `analysis` (see `analyze_repository`).
2. Recommendation: scores rules against the profile and selects the strongest ones.
3. Workspace preparation: derives file names, creates empty drafts, registers the copy task in the build file and excludes the drafts from container builds.
4. Content creation: renders each selected rule into its draft.
5. Deployment: runs the copy task and reports which rules are live.

The server keeps no state between calls. Never edit `workflow_state`; check its `errors` list after each phase.

## Single tools

- `recommend_rules`, `get_static_rule(s)`, `list_static_rules`: inspect without touching the repository.
- `save_rule`: stage a rule you wrote yourself.
- `prepare_workspace`: create the directories only."#;

// --- Startup ---

fn init_tracing() {
    // stdout carries the MCP transport
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn repository_root() -> std::io::Result<PathBuf> {
    match std::env::var_os("RULESMITH_ROOT") {
        Some(root) if !root.is_empty() => Ok(PathBuf::from(root)),
        _ => std::env::current_dir(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::args().nth(1).as_deref() == Some("init") {
        return init::init_project(&repository_root()?);
    }

    init_tracing();

    let workspace = Workspace::open(repository_root()?)?;
    let settings = rulesmith_core::config::read_settings();
    let analyzer = rulesmith_suggest::analyzer_for(&settings);
    tracing::info!(
        root = %workspace.root.display(),
        analyzer = analyzer.name(),
        "starting rulesmith MCP server"
    );

    let server = RulesmithServer::new(Orchestrator::new(
        workspace,
        analyzer,
        Box::new(MakeRunner::new()),
    ));
    if let Some((missing, undeclared)) = server.registry_mismatch() {
        return Err(format!(
            "tool registry mismatch: missing {:?}, undeclared {:?}",
            missing, undeclared
        )
        .into());
    }

    let service = server
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "MCP server error"))?;
    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rulesmith_core::WorkspaceConfig;
    use rulesmith_suggest::OfflineAnalyzer;

    fn server(root: &std::path::Path) -> RulesmithServer {
        RulesmithServer::new(Orchestrator::new(
            Workspace::new(root, WorkspaceConfig::default()),
            Box::new(OfflineAnalyzer),
            Box::new(MakeRunner::new()),
        ))
    }

    #[test]
    fn router_matches_declared_tools() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(server(dir.path()).registry_mismatch(), None);
    }
}
