//! The five phase bodies. Each takes the decoded state, mutates it, and
//! describes what happened; prerequisite and state checks happen before any
//! of these run.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use rulesmith_core::{deploy, materialize, recommend, template, RuleError, Workspace};
use rulesmith_core::deploy::TaskRunner;
use rulesmith_core::materialize::{DraftOutcome, PatchOutcome};
use rulesmith_suggest::{analysis_prompt, offline, parse_analysis, Analyzer};

use crate::result::{ChecklistItem, PhaseOutcome, PhaseStatus};
use crate::state::WorkflowState;

fn next_step_for(phase: u8) -> String {
    format!(
        "Call run_workflow_phase with phase {} and the returned workflow_state",
        phase
    )
}

// --- Phase 1 ---

pub(crate) async fn analysis(
    state: &mut WorkflowState,
    workspace: &Workspace,
    analyzer: &dyn Analyzer,
    supplied: Option<&str>,
) -> PhaseOutcome {
    let mut instructions = None;
    if !state.workspace_prepared {
        match materialize::prepare_workspace(workspace) {
            Ok(()) => {
                state.workspace_prepared = true;
                instructions = Some(materialize::workspace_instructions(workspace));
            }
            Err(e) => state.record_rule_error(1, Some("prepare_workspace"), &e),
        }
    }

    let (raw, source) = match supplied.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => (text.to_string(), "caller"),
        None => match analyzer.analyze(&state.repository_profile).await {
            Ok(raw) => (raw, analyzer.name()),
            Err(e) => {
                state.record(1, "analysis", Some(analyzer.name()), e);
                (offline::analyze_profile(&state.repository_profile), "offline")
            }
        },
    };

    let results = parse_analysis(&raw);
    let understood = !results.repo_type.is_empty() || !results.recommended_rule_hints.is_empty();
    state.analysis_results = Some(results.clone());
    state.mark_complete(1);

    let mut data = json!({
        "analysis_source": source,
        "analysis_results": results,
    });
    if let Some(text) = instructions {
        data["workspace_instructions"] = json!(text);
    }
    if source == "offline" {
        // Lets the caller run the prompt itself and resubmit via `analysis`
        data["analysis_prompt"] = json!(analysis_prompt(&state.repository_profile));
    }

    let mut next_steps = vec![next_step_for(2)];
    if source == "offline" {
        next_steps.push(
            "Optionally answer analysis_prompt yourself and rerun phase 1 with it as `analysis`"
                .to_string(),
        );
    }

    PhaseOutcome {
        status: PhaseStatus::Success,
        reason: None,
        message: format!("Repository analyzed ({} analysis)", source),
        checklist: vec![
            ChecklistItem::new("Workspace directories prepared", state.workspace_prepared),
            ChecklistItem::new("Analysis obtained", true),
            ChecklistItem::new("Repository type identified", understood),
        ],
        data,
        next_phase: Some(2),
        next_steps,
    }
}

// --- Phase 2 ---

pub(crate) fn recommendation(state: &mut WorkflowState, workspace: &Workspace) -> PhaseOutcome {
    let summary = state.repository_summary();
    let mut recommended = recommend::recommend(&summary);
    recommend::infer_dependencies(&mut recommended);

    let cfg = &workspace.config;
    let selected: Vec<_> = recommended
        .iter()
        .filter(|c| c.priority >= cfg.min_selection_score)
        .take(cfg.max_selected_rules)
        .cloned()
        .collect();

    let mut by_category: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for c in &selected {
        by_category
            .entry(c.category.as_str())
            .or_default()
            .push(c.name.as_str());
    }
    let data = json!({
        "summary": summary,
        "recommended_count": recommended.len(),
        "selected": selected.iter().map(|c| json!({
            "name": c.name,
            "priority": c.priority,
            "dependencies": c.dependencies,
        })).collect::<Vec<_>>(),
        "by_category": by_category,
    });

    tracing::info!(
        recommended = recommended.len(),
        selected = selected.len(),
        "rules recommended"
    );

    let message = if selected.is_empty() {
        "No rule scored high enough to be selected".to_string()
    } else {
        format!(
            "Selected {} of {} recommended rules",
            selected.len(),
            recommended.len()
        )
    };
    let checklist = vec![
        ChecklistItem::new("Repository summary built", !summary.is_empty()),
        ChecklistItem::new("Rules recommended", !recommended.is_empty()),
        ChecklistItem::new("Rules selected", !selected.is_empty()),
    ];

    state.recommended_rules = recommended;
    state.selected_rules = selected;
    state.mark_complete(2);

    PhaseOutcome {
        status: PhaseStatus::Success,
        reason: None,
        message,
        checklist,
        data,
        next_phase: Some(3),
        next_steps: vec![next_step_for(3)],
    }
}

// --- Phase 3 ---

pub(crate) fn workspace_prep(state: &mut WorkflowState, workspace: &Workspace) -> PhaseOutcome {
    let names: Vec<String> = state.selected_rules.iter().map(|c| c.name.clone()).collect();
    let mut file_names = BTreeMap::new();
    let mut all_named = true;

    // Keyed by slug: derive_slugs makes repeated names unique within the batch.
    for (name, slug) in names.iter().zip(template::derive_slugs(&names)) {
        match slug {
            Ok(slug) => {
                let file = workspace.file_name_for(&slug);
                file_names.insert(slug, file);
            }
            Err(e) => {
                all_named = false;
                state.record_rule_error(3, Some(name.as_str()), &e);
            }
        }
    }

    let build_task = match materialize::ensure_build_task(workspace) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            state.record_rule_error(3, Some("build_task"), &e);
            None
        }
    };
    let ignore = match materialize::patch_ignore_file(
        &workspace.ignore_file(),
        &workspace.config.ignore_pattern,
    ) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            state.record_rule_error(3, Some("ignore_file"), &e);
            None
        }
    };

    let drafts_dir = workspace.drafts_dir();
    let mut created = Vec::new();
    let mut drafts_ok = true;
    for file in file_names.values() {
        match materialize::create_draft_file(&drafts_dir, file) {
            Ok(DraftOutcome::Created) => created.push(file.clone()),
            Ok(DraftOutcome::Existing) => {}
            Err(e) => {
                drafts_ok = false;
                state.record_rule_error(3, Some(file.as_str()), &e);
            }
        }
    }

    let describe = |o: Option<PatchOutcome>| match o {
        Some(PatchOutcome::Applied) => "applied",
        Some(PatchOutcome::AlreadyPresent) => "already_present",
        None => "failed",
    };
    let data = json!({
        "rule_file_names": file_names,
        "drafts_created": created,
        "drafts_dir": workspace.config.drafts_dir,
        "build_task": describe(build_task),
        "ignore_file": describe(ignore),
    });
    let checklist = vec![
        ChecklistItem::new("File names derived for every selected rule", all_named),
        ChecklistItem::new(
            format!(
                "`{}` task registered in {}",
                workspace.config.build_task, workspace.config.build_file
            ),
            build_task.is_some(),
        ),
        ChecklistItem::new(
            format!("Drafts excluded in {}", workspace.config.ignore_file),
            ignore.is_some(),
        ),
        ChecklistItem::new("Draft placeholders created", drafts_ok),
    ];
    let count = file_names.len();
    state.rule_file_names = file_names;

    if !all_named {
        return PhaseOutcome {
            status: PhaseStatus::Error,
            reason: Some("name_derivation_failed".to_string()),
            message: "Some selected rules have no usable file name; see errors".to_string(),
            checklist,
            data,
            next_phase: Some(3),
            next_steps: vec![
                "Rerun phase 2 with a profile that yields nameable rules, then phase 3".to_string(),
            ],
        };
    }

    state.mark_complete(3);
    let materialized = build_task.is_some() && ignore.is_some() && drafts_ok;
    PhaseOutcome {
        status: if materialized {
            PhaseStatus::Success
        } else {
            PhaseStatus::Partial
        },
        reason: None,
        message: format!("Prepared {} draft rule files", count),
        checklist,
        data,
        next_phase: Some(4),
        next_steps: vec![next_step_for(4)],
    }
}

// --- Phase 4 ---

pub(crate) fn content_creation(state: &mut WorkflowState, workspace: &Workspace) -> PhaseOutcome {
    let drafts_dir = workspace.drafts_dir();
    let mut written = Vec::new();
    let mut failed = Vec::new();

    let candidates = state.selected_rules.clone();
    let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
    for (candidate, slug) in candidates.iter().zip(template::derive_slugs(&names)) {
        let Some(file) = slug
            .ok()
            .and_then(|slug| state.rule_file_names.get(&slug).cloned())
        else {
            continue;
        };
        let mut meta = template::metadata_for(candidate);
        meta.name = candidate.name.clone();
        let result = template::render_validated(&meta)
            .and_then(|content| materialize::write_rule(&drafts_dir, &file, &content));
        match result {
            Ok(path) => {
                tracing::info!(rule = %candidate.name, path = %path.display(), "rule written");
                if !state.created_rules.contains(&file) {
                    state.created_rules.push(file.clone());
                }
                written.push(file);
            }
            Err(e) => {
                state.record_rule_error(4, Some(candidate.name.as_str()), &e);
                failed.push(candidate.name.clone());
            }
        }
    }

    let data = json!({
        "written": written,
        "failed": failed,
        "created_rules": state.created_rules,
    });
    let checklist = vec![
        ChecklistItem::new("Rule content rendered", !written.is_empty()),
        ChecklistItem::new("Every selected rule passed validation", failed.is_empty()),
    ];

    if state.created_rules.is_empty() {
        return PhaseOutcome {
            status: PhaseStatus::Error,
            reason: Some("no_rules_created".to_string()),
            message: "No rule file could be created; see errors".to_string(),
            checklist,
            data,
            next_phase: Some(4),
            next_steps: vec!["Fix the reported rules and rerun phase 4".to_string()],
        };
    }

    state.mark_complete(4);
    let status = if failed.is_empty() {
        PhaseStatus::Success
    } else {
        PhaseStatus::Partial
    };
    let message = if failed.is_empty() {
        format!("Wrote {} rule files", written.len())
    } else {
        format!("Wrote {} rule files, {} failed", written.len(), failed.len())
    };
    PhaseOutcome {
        status,
        reason: None,
        message,
        checklist,
        data,
        next_phase: Some(5),
        next_steps: vec![
            format!("Review the drafts in `{}`", workspace.config.drafts_dir),
            next_step_for(5),
        ],
    }
}

// --- Phase 5 ---

pub(crate) async fn deployment(
    state: &mut WorkflowState,
    workspace: &Workspace,
    runner: Arc<dyn TaskRunner>,
) -> PhaseOutcome {
    let staged = state.created_rules.clone();
    // The build task is a blocking child process; keep it off the async workers.
    let deployed = {
        let workspace = workspace.clone();
        let staged = staged.clone();
        tokio::task::spawn_blocking(move || deploy::deploy(&workspace, runner.as_ref(), &staged))
            .await
            .unwrap_or_else(|e| Err(RuleError::Deployment(format!("deploy task aborted: {e}"))))
    };
    let (status, message, output, ran) = match deployed {
        Ok(report) => {
            let message = format!(
                "Deployed {} of {} rules to {}",
                report.promoted.len(),
                staged.len(),
                workspace.config.rules_dir
            );
            let status = if report.promoted.len() == staged.len() {
                PhaseStatus::Success
            } else {
                PhaseStatus::Partial
            };
            state.deployed_rules = report.promoted;
            (status, message, report.output, true)
        }
        Err(e) => {
            let message = e.to_string();
            state.deployed_rules.clear();
            state.record_rule_error(5, Some(workspace.config.build_task.as_str()), &e);
            (PhaseStatus::Partial, message, String::new(), false)
        }
    };
    state.mark_complete(5);

    let missing: Vec<&String> = staged
        .iter()
        .filter(|f| !state.deployed_rules.contains(f))
        .collect();
    let data = json!({
        "deployed_rules": state.deployed_rules,
        "not_deployed": missing,
        "task_output": output,
    });
    let checklist = vec![
        ChecklistItem::new(format!("`{}` task ran", workspace.config.build_task), ran),
        ChecklistItem::new("All created rules deployed", missing.is_empty() && !staged.is_empty()),
    ];

    PhaseOutcome {
        status,
        reason: None,
        message,
        checklist,
        data,
        next_phase: None,
        next_steps: deploy::verification_instructions(workspace, &state.deployed_rules),
    }
}
