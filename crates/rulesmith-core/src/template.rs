//! Rule artifact format: a `---` fenced header with `description`, `globs` and
//! `alwaysApply`, followed by `# Title`, `## Context`, `## Critical Rules` and
//! `## Examples` in that order.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::library::{self, Blueprint};
use crate::{RuleCandidate, RuleError, RuleType};

const FENCE: &str = "---";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleExample {
    pub valid: bool,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMetadata {
    pub name: String,
    pub title: String,
    pub description: String,
    pub globs: Vec<String>,
    pub always_apply: bool,
    pub context: String,
    pub critical_rules: Vec<String>,
    pub examples: Vec<RuleExample>,
}

impl RuleMetadata {
    /// Adjust header fields to what each rule type means to the assistant:
    /// agent-selected rules are found by description alone, auto-select rules
    /// by globs alone, always-applied rules set the flag.
    pub fn apply_rule_type(&mut self, rule_type: RuleType) {
        match rule_type {
            RuleType::AgentSelected => {
                self.globs.clear();
                self.always_apply = false;
            }
            RuleType::AlwaysApplied => self.always_apply = true,
            RuleType::AutoSelect => {
                self.description.clear();
                self.always_apply = false;
            }
            RuleType::AutoSelectWithDescription | RuleType::Manual => self.always_apply = false,
        }
    }
}

impl From<&Blueprint> for RuleMetadata {
    fn from(bp: &Blueprint) -> Self {
        let mut meta = RuleMetadata {
            name: bp.name.to_string(),
            title: bp.title.to_string(),
            description: bp.description.to_string(),
            globs: bp.globs.iter().map(|g| g.to_string()).collect(),
            always_apply: false,
            context: bp.context.to_string(),
            critical_rules: bp.critical_rules.iter().map(|r| r.to_string()).collect(),
            examples: bp
                .examples
                .iter()
                .map(|e| RuleExample {
                    valid: e.valid,
                    body: e.body.to_string(),
                })
                .collect(),
        };
        meta.apply_rule_type(bp.rule_type);
        meta
    }
}

// --- Template store ---

/// Blueprint metadata when the candidate names one, otherwise metadata
/// synthesized from the candidate's own fields.
pub fn metadata_for(candidate: &RuleCandidate) -> RuleMetadata {
    if let Some(bp) = library::find(&candidate.name) {
        return RuleMetadata::from(bp);
    }

    let title = title_case(&candidate.name);
    let description = candidate.description.trim().to_string();
    let mut critical_rules = Vec::new();
    if !description.is_empty() {
        critical_rules.push(format!("Follow the {} conventions: {}", title, description));
    }
    if !candidate.globs.is_empty() && !description.is_empty() {
        critical_rules.push(format!(
            "Apply these conventions to files matching {}",
            candidate.globs.join(", ")
        ));
    }
    let context = if description.is_empty() {
        String::new()
    } else {
        format!(
            "{} ({} rule). {}",
            title,
            candidate.category.as_str(),
            description
        )
    };

    let mut meta = RuleMetadata {
        name: candidate.name.clone(),
        title,
        description,
        globs: candidate.globs.clone(),
        always_apply: false,
        context,
        critical_rules,
        examples: Vec::new(),
    };
    meta.apply_rule_type(candidate.rule_type);
    meta
}

/// Render a built-in rule by name.
pub fn static_rule(name: &str) -> Option<String> {
    library::find(name).map(|bp| render(&RuleMetadata::from(bp)))
}

fn title_case(name: &str) -> String {
    name.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// --- Validation ---

pub fn validate(meta: &RuleMetadata) -> Result<(), RuleError> {
    let fail = |reason: &str| RuleError::ContentValidation {
        name: meta.name.clone(),
        reason: reason.to_string(),
    };

    let has_globs = meta.globs.iter().any(|g| !g.trim().is_empty());
    if meta.description.trim().is_empty() && !has_globs {
        return Err(fail("needs a non-empty description or at least one glob"));
    }
    if !meta.critical_rules.iter().any(|r| !r.trim().is_empty()) {
        return Err(fail("needs at least one critical rule"));
    }
    for g in &meta.globs {
        // The header stores globs comma-joined on one line.
        if g.contains(',') {
            return Err(fail(&format!(
                "glob '{}' contains a comma, which the rule header cannot represent",
                g
            )));
        }
        if let Err(e) = glob::Pattern::new(g.trim()) {
            return Err(fail(&format!("invalid glob '{}': {}", g, e)));
        }
    }
    Ok(())
}

// --- Rendering ---

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn render(meta: &RuleMetadata) -> String {
    let mut out = String::with_capacity(1024);

    out.push_str(FENCE);
    out.push('\n');
    out.push_str(&format!("description: {}\n", single_line(&meta.description)));
    let globs: Vec<&str> = meta
        .globs
        .iter()
        .map(|g| g.trim())
        .filter(|g| !g.is_empty())
        .collect();
    out.push_str(&format!("globs: {}\n", globs.join(",")));
    out.push_str(&format!("alwaysApply: {}\n", meta.always_apply));
    out.push_str(FENCE);
    out.push('\n');

    let title = if meta.title.is_empty() {
        title_case(&meta.name)
    } else {
        meta.title.clone()
    };
    out.push_str(&format!("# {}\n", title));

    if !meta.context.trim().is_empty() {
        out.push_str("\n## Context\n\n");
        out.push_str(meta.context.trim());
        out.push('\n');
    }

    out.push_str("\n## Critical Rules\n\n");
    for rule in meta.critical_rules.iter().filter(|r| !r.trim().is_empty()) {
        out.push_str("- ");
        out.push_str(&single_line(rule));
        out.push('\n');
    }

    if !meta.examples.is_empty() {
        out.push_str("\n## Examples\n");
        for ex in &meta.examples {
            out.push('\n');
            out.push_str(if ex.valid {
                "<example>\n"
            } else {
                "<example type=\"invalid\">\n"
            });
            out.push_str(ex.body.trim_end());
            out.push_str("\n</example>\n");
        }
    }

    out
}

/// Validate, then render.
pub fn render_validated(meta: &RuleMetadata) -> Result<String, RuleError> {
    validate(meta)?;
    Ok(render(meta))
}

// --- Parsing ---

/// Parse a rendered artifact back into metadata. The rule name is not part of
/// the artifact and comes back empty.
pub fn parse(content: &str) -> Result<RuleMetadata, RuleError> {
    let mut lines = content.lines();
    match lines.next() {
        Some(l) if l.trim() == FENCE => {}
        _ => return Err(RuleError::Parse("missing opening '---' header fence".into())),
    }

    let mut meta = RuleMetadata::default();
    let mut closed = false;
    for line in lines.by_ref() {
        if line.trim() == FENCE {
            closed = true;
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| RuleError::Parse(format!("header line without a key: '{}'", line)))?;
        let value = value.trim();
        match key.trim() {
            "description" => meta.description = value.to_string(),
            "globs" => {
                meta.globs = value
                    .split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            "alwaysApply" => {
                meta.always_apply = match value {
                    "true" => true,
                    "false" | "" => false,
                    other => {
                        return Err(RuleError::Parse(format!(
                            "alwaysApply must be true or false, got '{}'",
                            other
                        )))
                    }
                }
            }
            _ => {}
        }
    }
    if !closed {
        return Err(RuleError::Parse("missing closing '---' header fence".into()));
    }

    parse_body(lines, &mut meta);
    Ok(meta)
}

#[derive(PartialEq)]
enum Section {
    None,
    Context,
    CriticalRules,
    Examples,
}

fn parse_body<'a>(lines: impl Iterator<Item = &'a str>, meta: &mut RuleMetadata) {
    let mut section = Section::None;
    let mut context: Vec<&str> = Vec::new();
    let mut example: Option<(bool, Vec<&str>)> = None;

    for line in lines {
        if let Some((valid, body)) = example.as_mut() {
            if line.trim() == "</example>" {
                meta.examples.push(RuleExample {
                    valid: *valid,
                    body: body.join("\n"),
                });
                example = None;
            } else {
                body.push(line);
            }
            continue;
        }

        let trimmed = line.trim();
        if let Some(h) = trimmed.strip_prefix("## ") {
            section = match h.trim().to_lowercase().as_str() {
                "context" => Section::Context,
                "critical rules" => Section::CriticalRules,
                "examples" => Section::Examples,
                _ => Section::None,
            };
            continue;
        }
        if let Some(t) = trimmed.strip_prefix("# ") {
            if meta.title.is_empty() {
                meta.title = t.trim().to_string();
            }
            continue;
        }

        match section {
            Section::Context => context.push(line),
            Section::CriticalRules => {
                if let Some(rule) = list_item(trimmed) {
                    meta.critical_rules.push(rule.to_string());
                }
            }
            Section::Examples => {
                if trimmed.starts_with("<example") {
                    example = Some((!trimmed.contains("invalid"), Vec::new()));
                }
            }
            Section::None => {}
        }
    }

    meta.context = context.join("\n").trim().to_string();
}

fn list_item(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Some(rest.trim());
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return Some(rest.trim());
        }
    }
    None
}

// --- Name derivation ---

/// Lower-case, collapse every run of non-alphanumeric characters into one hyphen,
/// trim hyphens from both ends. `None` when nothing usable is left.
pub fn slugify(name: &str) -> Option<String> {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

/// Derive one slug per name, unique within the batch. Later collisions get
/// `-2`, `-3`, … in input order. A name that yields no slug is an error for
/// that position only.
pub fn derive_slugs<S: AsRef<str>>(names: &[S]) -> Vec<Result<String, RuleError>> {
    let mut used: HashSet<String> = HashSet::new();
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            let base = slugify(name).ok_or_else(|| RuleError::NameDerivation(name.to_string()))?;
            let mut slug = base.clone();
            let mut n = 2;
            while used.contains(&slug) {
                slug = format!("{}-{}", base, n);
                n += 1;
            }
            used.insert(slug.clone());
            Ok(slug)
        })
        .collect()
}
