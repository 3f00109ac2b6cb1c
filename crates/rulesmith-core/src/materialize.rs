//! Idempotent edits to the host repository: draft files, the build-task
//! registration and the ignore-file entry.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{template, RuleError, Workspace};

/// A declarative "make sure this text is present" edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextPatch {
    /// `line` must appear as an exact line (surrounding whitespace ignored).
    EnsureLine { line: String },
    /// `signature` must appear somewhere in the file; if not, `block` is appended.
    EnsureBlock { signature: String, block: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    AlreadyPresent,
}

impl TextPatch {
    pub fn is_satisfied(&self, existing: &str) -> bool {
        match self {
            TextPatch::EnsureLine { line } => {
                existing.lines().any(|l| l.trim() == line.trim())
            }
            TextPatch::EnsureBlock { signature, .. } => existing.contains(signature.as_str()),
        }
    }

    /// New file content, or `None` when the patch is already satisfied.
    pub fn apply(&self, existing: &str) -> Option<String> {
        if self.is_satisfied(existing) {
            return None;
        }
        let addition = match self {
            TextPatch::EnsureLine { line } => format!("{}\n", line.trim()),
            TextPatch::EnsureBlock { block, .. } => format!("{}\n", block.trim_end()),
        };
        let mut out = existing.to_string();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        // Blocks get a blank line of separation from whatever precedes them.
        if matches!(self, TextPatch::EnsureBlock { .. }) && !out.is_empty() && !out.ends_with("\n\n") {
            out.push('\n');
        }
        out.push_str(&addition);
        Some(out)
    }

    /// Read-modify-write `path`, creating it if missing. No write happens when
    /// the patch is already satisfied.
    pub fn apply_to_file(&self, path: &Path) -> Result<PatchOutcome, RuleError> {
        let existing = if path.exists() {
            fs::read_to_string(path).map_err(|e| RuleError::io("read", path, e))?
        } else {
            String::new()
        };
        match self.apply(&existing) {
            None => Ok(PatchOutcome::AlreadyPresent),
            Some(updated) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent).map_err(|e| RuleError::io("create", parent, e))?;
                    }
                }
                fs::write(path, updated).map_err(|e| RuleError::io("write", path, e))?;
                Ok(PatchOutcome::Applied)
            }
        }
    }
}

/// The make target that copies staged rules into the production directory.
/// Recipe lines must be tab-indented.
pub fn build_task_patch(workspace: &Workspace) -> TextPatch {
    let cfg = &workspace.config;
    let task = &cfg.build_task;
    let block = format!(
        "# Promote staged rules from {drafts} into {rules}\n\
.PHONY: {task}\n\
{task}:\n\
\t@mkdir -p {rules}\n\
\t@for f in {drafts}/*.{ext}; do \\\n\
\t\tif [ -s \"$$f\" ]; then cp -f \"$$f\" {rules}/ || exit 1; fi; \\\n\
\tdone",
        drafts = cfg.drafts_dir,
        rules = cfg.rules_dir,
        ext = cfg.rule_extension,
        task = task,
    );
    TextPatch::EnsureBlock {
        signature: format!("\n{}:", task),
        block,
    }
}

/// Register the copy task in the build file. Re-running leaves the file byte-identical.
pub fn ensure_build_task(workspace: &Workspace) -> Result<PatchOutcome, RuleError> {
    let path = workspace.build_file();
    let patch = build_task_patch(workspace);
    // The signature anchors on a preceding newline; a task on the first line
    // of the file is matched separately.
    if path.exists() {
        let existing = fs::read_to_string(&path).map_err(|e| RuleError::io("read", &path, e))?;
        if existing.starts_with(&format!("{}:", workspace.config.build_task)) {
            return Ok(PatchOutcome::AlreadyPresent);
        }
    }
    let outcome = patch.apply_to_file(&path)?;
    if outcome == PatchOutcome::Applied {
        tracing::info!(file = %path.display(), task = %workspace.config.build_task, "registered build task");
    }
    Ok(outcome)
}

/// Append `pattern` to the ignore file unless it is already an exact line.
pub fn patch_ignore_file(path: &Path, pattern: &str) -> Result<PatchOutcome, RuleError> {
    let outcome = TextPatch::EnsureLine {
        line: pattern.to_string(),
    }
    .apply_to_file(path)?;
    if outcome == PatchOutcome::Applied {
        tracing::info!(file = %path.display(), pattern, "patched ignore file");
    }
    Ok(outcome)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftOutcome {
    Created,
    Existing,
}

/// Create an empty placeholder at `dir/file_name` if nothing is there.
/// Never truncates an existing file.
pub fn create_draft_file(dir: &Path, file_name: &str) -> Result<DraftOutcome, RuleError> {
    fs::create_dir_all(dir).map_err(|e| RuleError::io("create", dir, e))?;
    let path = dir.join(file_name);
    match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(_) => Ok(DraftOutcome::Created),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(DraftOutcome::Existing),
        Err(e) => Err(RuleError::io("create", path, e)),
    }
}

/// Overwrite `dir/file_name` with `content`, via a temp file and rename.
pub fn write_rule(dir: &Path, file_name: &str, content: &str) -> Result<PathBuf, RuleError> {
    fs::create_dir_all(dir).map_err(|e| RuleError::io("create", dir, e))?;
    let tmp = dir.join(format!(".{}.tmp", file_name));
    let path = dir.join(file_name);
    fs::write(&tmp, content).map_err(|e| RuleError::io("write", &tmp, e))?;
    fs::rename(&tmp, &path).map_err(|e| RuleError::io("rename", &path, e))?;
    Ok(path)
}

/// Stage a caller-authored artifact as a draft. The content must parse and
/// validate; the file name is derived from `rule_name`.
pub fn save_rule(workspace: &Workspace, rule_name: &str, content: &str) -> Result<PathBuf, RuleError> {
    let slug = template::slugify(rule_name)
        .ok_or_else(|| RuleError::NameDerivation(rule_name.to_string()))?;
    let mut meta = template::parse(content)?;
    meta.name = rule_name.to_string();
    template::validate(&meta)?;
    let path = write_rule(&workspace.drafts_dir(), &workspace.file_name_for(&slug), content)?;
    tracing::info!(rule = rule_name, path = %path.display(), "rule saved");
    Ok(path)
}

/// Create the drafts and production rule directories.
pub fn prepare_workspace(workspace: &Workspace) -> Result<(), RuleError> {
    for dir in [workspace.drafts_dir(), workspace.rules_dir()] {
        fs::create_dir_all(&dir).map_err(|e| RuleError::io("create", &dir, e))?;
    }
    Ok(())
}

/// Natural-language setup steps for a caller preparing the workspace by hand.
pub fn workspace_instructions(workspace: &Workspace) -> String {
    let cfg = &workspace.config;
    format!(
        "Workspace setup:\n\
1. Create the drafts directory `{drafts}` (staged rules are written here).\n\
2. Create the production rules directory `{rules}` (the assistant reads rules from here).\n\
3. Add a `{task}` target to `{build}` that copies `{drafts}/*.{ext}` into `{rules}/`.\n\
4. Add `{pattern}` to `{ignore}` so staged drafts stay out of builds.\n\
5. Run workflow phase 1 with the repository profile to start generating rules.",
        drafts = cfg.drafts_dir,
        rules = cfg.rules_dir,
        task = cfg.build_task,
        build = cfg.build_file,
        ext = cfg.rule_extension,
        pattern = cfg.ignore_pattern,
        ignore = cfg.ignore_file,
    )
}
