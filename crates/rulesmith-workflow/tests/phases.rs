use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use async_trait::async_trait;
use serde_json::{json, Value};

use rulesmith_core::deploy::TaskRunner;
use rulesmith_core::{RepositoryProfile, RuleError, Workspace, WorkspaceConfig};
use rulesmith_suggest::Analyzer;
use rulesmith_workflow::{Orchestrator, PhaseRequest, PhaseResult, PhaseStatus, WorkflowState};

// --- Fakes ---

struct CannedAnalyzer(&'static str);

#[async_trait]
impl Analyzer for CannedAnalyzer {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn analyze(&self, _profile: &RepositoryProfile) -> Result<String, String> {
        Ok(self.0.to_string())
    }
}

struct FailingAnalyzer;

#[async_trait]
impl Analyzer for FailingAnalyzer {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn analyze(&self, _profile: &RepositoryProfile) -> Result<String, String> {
        Err("provider unreachable".into())
    }
}

/// Stands in for `make update-cursor-rules`: copies non-empty drafts.
struct CopyRunner;

impl TaskRunner for CopyRunner {
    fn run_task(&self, root: &Path, _task: &str) -> Result<String, RuleError> {
        let cfg = WorkspaceConfig::default();
        let rules = root.join(&cfg.rules_dir);
        fs::create_dir_all(&rules).unwrap();
        let mut copied = 0;
        for entry in fs::read_dir(root.join(&cfg.drafts_dir)).unwrap() {
            let entry = entry.unwrap();
            if entry.metadata().unwrap().len() > 0 {
                fs::copy(entry.path(), rules.join(entry.file_name())).unwrap();
                copied += 1;
            }
        }
        Ok(format!("copied {} files", copied))
    }
}

/// Records which thread the task ran on.
struct ThreadRecordingRunner(Arc<Mutex<Option<ThreadId>>>);

impl TaskRunner for ThreadRecordingRunner {
    fn run_task(&self, _root: &Path, _task: &str) -> Result<String, RuleError> {
        *self.0.lock().unwrap() = Some(thread::current().id());
        Ok(String::new())
    }
}

struct BrokenRunner;

impl TaskRunner for BrokenRunner {
    fn run_task(&self, _root: &Path, task: &str) -> Result<String, RuleError> {
        Err(RuleError::Deployment(format!(
            "make: *** No rule to make target '{}'.  Stop.",
            task
        )))
    }
}

const PYTHON_ANALYSIS: &str = r#"{
  "repo_type": "python web service",
  "common_patterns": ["FastAPI routers", "Pydantic models"],
  "recommended_rules": ["python-best-practices", "fastapi-conventions"]
}"#;

fn orchestrator(root: &Path, analyzer: impl Analyzer + 'static, runner: impl TaskRunner + 'static) -> Orchestrator {
    Orchestrator::new(
        Workspace::new(root, WorkspaceConfig::default()),
        Box::new(analyzer),
        Box::new(runner),
    )
}

fn python_profile() -> RepositoryProfile {
    RepositoryProfile {
        description: "Inventory REST API".into(),
        main_languages: vec!["python".into()],
        file_patterns: vec!["app/**/*.py".into()],
        key_features: vec!["fastapi".into(), "pytest".into()],
    }
}

fn request(phase: i64, state: Option<Value>) -> PhaseRequest {
    PhaseRequest {
        phase,
        workflow_state: state,
        ..Default::default()
    }
}

fn state_of(result: &PhaseResult) -> WorkflowState {
    serde_json::from_value(result.workflow_state.clone()).unwrap()
}

fn candidate(name: &str, description: &str, globs: &[&str], rule_type: &str) -> Value {
    json!({
        "name": name,
        "category": "workflow",
        "description": description,
        "globs": globs,
        "rule_type": rule_type,
        "priority": 4,
    })
}

// --- Call-level failures ---

#[tokio::test]
async fn prerequisite_failure_echoes_state_byte_for_byte() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), CannedAnalyzer(PYTHON_ANALYSIS), CopyRunner);

    for phase in 2..=5 {
        let raw = format!(
            r#"{{"phase_{}_complete":false,"version":1,"zz":true,"note":{{"z":1,"a":[3,2,1]}}}}"#,
            phase - 1
        );
        let input: Value = serde_json::from_str(&raw).unwrap();
        let result = orch.execute_phase(request(phase, Some(input))).await;

        assert_eq!(result.status, PhaseStatus::Error, "phase {phase}");
        assert_eq!(result.reason.as_deref(), Some("prerequisite_not_met"));
        assert_eq!(result.next_phase, Some(phase as u8 - 1));
        assert_eq!(serde_json::to_string(&result.workflow_state).unwrap(), raw);
    }
    assert!(!dir.path().join("Makefile").exists());
    assert!(!dir.path().join(".cursor").exists());
}

#[tokio::test]
async fn phase_outside_range_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), CannedAnalyzer(PYTHON_ANALYSIS), CopyRunner);

    for phase in [0, 6, -1, 300] {
        let state = json!({"phase_1_complete": true});
        let result = orch.execute_phase(request(phase, Some(state.clone()))).await;
        assert_eq!(result.status, PhaseStatus::Error);
        assert_eq!(result.reason.as_deref(), Some("invalid_phase"));
        assert_eq!(result.workflow_state, state);
    }
}

#[tokio::test]
async fn malformed_state_rejected_after_phase_one() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), CannedAnalyzer(PYTHON_ANALYSIS), CopyRunner);

    let bad = json!({"version": 7, "phase_1_complete": true});
    let result = orch.execute_phase(request(2, Some(bad.clone()))).await;
    assert_eq!(result.reason.as_deref(), Some("invalid_state"));
    assert_eq!(result.workflow_state, bad);
}

#[tokio::test]
async fn phase_one_restarts_from_malformed_state() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), CannedAnalyzer(PYTHON_ANALYSIS), CopyRunner);

    let result = orch
        .execute_phase(request(1, Some(json!({"selected_rules": "oops"}))))
        .await;
    assert_eq!(result.status, PhaseStatus::Success);
    let state = state_of(&result);
    assert!(state.phase_1_complete);
    assert_eq!(state.errors.len(), 1);
    assert_eq!(state.errors[0].kind, "invalid_state");
}

// --- Phase bodies ---

#[tokio::test]
async fn analyzer_failure_falls_back_to_offline() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), FailingAnalyzer, CopyRunner);

    let result = orch
        .execute_phase(PhaseRequest {
            phase: 1,
            repository_profile: Some(python_profile()),
            ..Default::default()
        })
        .await;
    assert_eq!(result.status, PhaseStatus::Success);
    assert_eq!(result.data["analysis_source"], "offline");
    assert!(result.data["analysis_prompt"].is_string());

    let state = state_of(&result);
    assert!(state.phase_1_complete);
    assert_eq!(state.errors[0].kind, "analysis");
    assert_eq!(state.errors[0].message, "provider unreachable");
    let analysis = state.analysis_results.unwrap();
    assert_eq!(analysis.repo_type, "python web service");
}

#[tokio::test]
async fn caller_supplied_analysis_wins() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), FailingAnalyzer, CopyRunner);

    let result = orch
        .execute_phase(PhaseRequest {
            phase: 1,
            repository_profile: Some(python_profile()),
            analysis: Some("Repository type: rust cli\nRecommended rules: rust-best-practices".into()),
            ..Default::default()
        })
        .await;
    assert_eq!(result.data["analysis_source"], "caller");
    let state = state_of(&result);
    assert!(state.errors.is_empty());
    assert_eq!(state.analysis_results.unwrap().repo_type, "rust cli");
}

#[tokio::test]
async fn phase_three_with_no_selected_rules_completes() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), CannedAnalyzer(PYTHON_ANALYSIS), CopyRunner);

    let state = json!({
        "version": 1,
        "phase_1_complete": true,
        "phase_2_complete": true,
        "selected_rules": [],
    });
    let result = orch.execute_phase(request(3, Some(state))).await;

    assert_eq!(result.status, PhaseStatus::Success);
    assert_eq!(result.workflow_state["rule_file_names"], json!({}));
    assert_eq!(result.workflow_state["phase_3_complete"], true);
    assert_eq!(result.next_phase, Some(4));
}

#[tokio::test]
async fn phase_three_needs_every_name() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), CannedAnalyzer(PYTHON_ANALYSIS), CopyRunner);

    let state = json!({
        "phase_1_complete": true,
        "phase_2_complete": true,
        "selected_rules": [
            candidate("Test Rule", "Testing conventions", &[], "agent_selected"),
            candidate("!!!", "Punctuation only", &[], "agent_selected"),
        ],
    });
    let result = orch.execute_phase(request(3, Some(state))).await;

    assert_eq!(result.status, PhaseStatus::Error);
    assert_eq!(result.reason.as_deref(), Some("name_derivation_failed"));
    let state = state_of(&result);
    assert!(!state.phase_3_complete);
    assert_eq!(state.rule_file_names.len(), 1);
    assert_eq!(state.rule_file_names["test-rule"], "test-rule.mdc");
    assert_eq!(state.errors[0].kind, "name_derivation");
    assert_eq!(state.errors[0].subject.as_deref(), Some("!!!"));
}

#[tokio::test]
async fn colliding_names_get_distinct_files() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), CannedAnalyzer(PYTHON_ANALYSIS), CopyRunner);

    let state = json!({
        "phase_1_complete": true,
        "phase_2_complete": true,
        "selected_rules": [
            candidate("Test Rule", "First", &[], "agent_selected"),
            candidate("test-rule", "Second", &[], "agent_selected"),
            candidate("Test Rule", "Third", &[], "agent_selected"),
        ],
    });
    let r3 = orch.execute_phase(request(3, Some(state))).await;
    assert_eq!(r3.status, PhaseStatus::Success);
    let s3 = state_of(&r3);
    assert!(s3.phase_3_complete);
    let files: Vec<&str> = s3.rule_file_names.values().map(String::as_str).collect();
    assert_eq!(files, vec!["test-rule.mdc", "test-rule-2.mdc", "test-rule-3.mdc"]);

    let r4 = orch.execute_phase(request(4, Some(r3.workflow_state))).await;
    assert_eq!(r4.status, PhaseStatus::Success);
    let s4 = state_of(&r4);
    assert_eq!(
        s4.created_rules,
        vec!["test-rule.mdc", "test-rule-2.mdc", "test-rule-3.mdc"]
    );
    let drafts = orch.workspace().drafts_dir();
    for (file, description) in [
        ("test-rule.mdc", "First"),
        ("test-rule-2.mdc", "Second"),
        ("test-rule-3.mdc", "Third"),
    ] {
        let written = fs::read_to_string(drafts.join(file)).unwrap();
        assert!(written.contains(&format!("description: {description}\n")), "{file}");
    }
}

#[tokio::test]
async fn phase_four_keeps_going_past_invalid_rule() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), CannedAnalyzer(PYTHON_ANALYSIS), CopyRunner);

    let state = json!({
        "phase_1_complete": true,
        "phase_2_complete": true,
        "phase_3_complete": true,
        "selected_rules": [
            candidate("api-naming", "Name endpoints after resources", &["app/api/**/*.py"], "auto_select_with_description"),
            candidate("broken-rule", "", &[], "agent_selected"),
            candidate("changelog", "Keep the changelog current", &[], "agent_selected"),
        ],
        "rule_file_names": {
            "api-naming": "api-naming.mdc",
            "broken-rule": "broken-rule.mdc",
            "changelog": "changelog.mdc",
        },
    });
    let result = orch.execute_phase(request(4, Some(state))).await;

    assert_eq!(result.status, PhaseStatus::Partial);
    let state = state_of(&result);
    assert!(state.phase_4_complete);
    assert_eq!(state.created_rules, vec!["api-naming.mdc", "changelog.mdc"]);
    assert_eq!(state.errors.len(), 1);
    assert_eq!(state.errors[0].kind, "content_validation");
    assert_eq!(state.errors[0].subject.as_deref(), Some("broken-rule"));

    let drafts = Workspace::new(dir.path(), WorkspaceConfig::default()).drafts_dir();
    let written = fs::read_to_string(drafts.join("api-naming.mdc")).unwrap();
    assert!(written.starts_with("---\ndescription: Name endpoints after resources\n"));
    assert!(written.contains("globs: app/api/**/*.py\n"));
    assert!(!drafts.join("broken-rule.mdc").exists());
}

#[tokio::test]
async fn phase_four_with_nothing_written_is_not_complete() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), CannedAnalyzer(PYTHON_ANALYSIS), CopyRunner);

    let state = json!({
        "phase_1_complete": true,
        "phase_2_complete": true,
        "phase_3_complete": true,
        "selected_rules": [candidate("broken-rule", "", &[], "agent_selected")],
        "rule_file_names": {"broken-rule": "broken-rule.mdc"},
    });
    let result = orch.execute_phase(request(4, Some(state))).await;

    assert_eq!(result.status, PhaseStatus::Error);
    assert_eq!(result.reason.as_deref(), Some("no_rules_created"));
    assert_eq!(result.workflow_state["phase_4_complete"], false);
}

#[tokio::test]
async fn deployment_failure_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), CannedAnalyzer(PYTHON_ANALYSIS), BrokenRunner);

    let state = json!({
        "phase_1_complete": true,
        "phase_2_complete": true,
        "phase_3_complete": true,
        "phase_4_complete": true,
        "created_rules": ["python-best-practices.mdc"],
    });
    let result = orch.execute_phase(request(5, Some(state))).await;

    assert_eq!(result.status, PhaseStatus::Partial);
    assert_eq!(
        result.message,
        "make: *** No rule to make target 'update-cursor-rules'.  Stop."
    );
    assert_eq!(result.next_phase, None);
    let state = state_of(&result);
    assert!(state.phase_5_complete);
    assert!(state.deployed_rules.is_empty());
    assert_eq!(state.errors[0].kind, "deployment");
    assert!(!result.next_steps.is_empty());
}

#[tokio::test]
async fn deploy_task_runs_off_the_async_thread() {
    let dir = tempfile::tempdir().unwrap();
    let seen = Arc::new(Mutex::new(None));
    let orch = orchestrator(
        dir.path(),
        CannedAnalyzer(PYTHON_ANALYSIS),
        ThreadRecordingRunner(Arc::clone(&seen)),
    );

    let state = json!({
        "phase_1_complete": true,
        "phase_2_complete": true,
        "phase_3_complete": true,
        "phase_4_complete": true,
        "created_rules": [],
    });
    let result = orch.execute_phase(request(5, Some(state))).await;
    assert!(state_of(&result).phase_5_complete);

    let ran_on = seen.lock().unwrap().expect("deploy task never ran");
    assert_ne!(ran_on, thread::current().id());
}

// --- End to end ---

#[tokio::test]
async fn full_workflow_generates_and_deploys_rules() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), CannedAnalyzer(PYTHON_ANALYSIS), CopyRunner);
    let ws = orch.workspace().clone();

    let r1 = orch
        .execute_phase(PhaseRequest {
            phase: 1,
            repository_profile: Some(python_profile()),
            ..Default::default()
        })
        .await;
    assert_eq!(r1.status, PhaseStatus::Success);
    assert!(ws.drafts_dir().is_dir());
    assert!(ws.rules_dir().is_dir());
    assert!(r1.data["workspace_instructions"].is_string());

    let r2 = orch
        .execute_phase(request(2, Some(r1.workflow_state)))
        .await;
    let s2 = state_of(&r2);
    let selected: Vec<&str> = s2.selected_rules.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(selected[0], "python-best-practices");
    assert!(selected.contains(&"fastapi-conventions"));
    assert!(selected.contains(&"pytest-testing"));
    let fastapi = s2
        .selected_rules
        .iter()
        .find(|c| c.name == "fastapi-conventions")
        .unwrap();
    assert_eq!(fastapi.dependencies, vec!["python-best-practices"]);

    let r3 = orch
        .execute_phase(request(3, Some(r2.workflow_state)))
        .await;
    assert_eq!(r3.status, PhaseStatus::Success);
    let s3 = state_of(&r3);
    assert_eq!(s3.rule_file_names.len(), selected.len());
    for file in s3.rule_file_names.values() {
        assert_eq!(fs::read_to_string(ws.draft_path(file)).unwrap(), "");
    }
    let makefile = fs::read_to_string(ws.build_file()).unwrap();
    assert!(makefile.contains("update-cursor-rules:"));
    let ignore = fs::read_to_string(ws.ignore_file()).unwrap();
    assert!(ignore.lines().any(|l| l == "hack/drafts/"));

    // Rerunning phase 3 leaves the patched files alone
    let again = orch
        .execute_phase(request(3, Some(r3.workflow_state.clone())))
        .await;
    assert_eq!(again.status, PhaseStatus::Success);
    assert_eq!(fs::read_to_string(ws.build_file()).unwrap(), makefile);
    assert_eq!(fs::read_to_string(ws.ignore_file()).unwrap(), ignore);

    let r4 = orch
        .execute_phase(request(4, Some(r3.workflow_state)))
        .await;
    assert_eq!(r4.status, PhaseStatus::Success);
    let s4 = state_of(&r4);
    assert_eq!(s4.created_rules.len(), selected.len());
    let python = fs::read_to_string(ws.draft_path("python-best-practices.mdc")).unwrap();
    assert!(python.contains("## Critical Rules"));

    let r5 = orch
        .execute_phase(request(5, Some(r4.workflow_state)))
        .await;
    assert_eq!(r5.status, PhaseStatus::Success);
    let s5 = state_of(&r5);
    assert!(s5.phase_5_complete);
    assert_eq!(s5.deployed_rules, s4.created_rules);
    assert!(ws.rules_dir().join("python-best-practices.mdc").is_file());
    assert!(s5.errors.is_empty());
}
