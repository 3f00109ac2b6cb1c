//! Deterministic analysis built from the profile alone, used when no LLM is
//! configured or the LLM call fails.

use rulesmith_core::{recommend, RepositoryProfile};

const MAX_HINTS: usize = 6;

const KIND_HINTS: &[(&str, &str)] = &[
    ("api", "web service"),
    ("rest", "web service"),
    ("server", "web service"),
    ("fastapi", "web service"),
    ("django", "web application"),
    ("flask", "web service"),
    ("react", "frontend application"),
    ("frontend", "frontend application"),
    ("cli", "command-line tool"),
    ("command-line", "command-line tool"),
    ("library", "library"),
    ("sdk", "library"),
];

fn repo_kind(profile: &RepositoryProfile) -> &'static str {
    let text = profile.summary().to_lowercase();
    let words: Vec<&str> = text
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|w| !w.is_empty())
        .collect();
    KIND_HINTS
        .iter()
        .find(|(hint, _)| words.contains(hint))
        .map(|(_, kind)| *kind)
        .unwrap_or("project")
}

/// Produce the same JSON shape the analysis prompt asks an LLM for.
pub fn analyze_profile(profile: &RepositoryProfile) -> String {
    let language = profile
        .main_languages
        .iter()
        .map(|l| l.trim().to_lowercase())
        .find(|l| !l.is_empty());
    let repo_type = match language {
        Some(lang) => format!("{} {}", lang, repo_kind(profile)),
        None => repo_kind(profile).to_string(),
    };

    let mut common_patterns: Vec<String> = profile
        .file_patterns
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("files matching {}", p.trim()))
        .collect();
    common_patterns.extend(
        profile
            .key_features
            .iter()
            .filter(|f| !f.trim().is_empty())
            .map(|f| f.trim().to_string()),
    );

    let recommended_rules: Vec<String> = recommend::recommend(&profile.summary())
        .into_iter()
        .take(MAX_HINTS)
        .map(|c| c.name)
        .collect();

    serde_json::json!({
        "repo_type": repo_type,
        "common_patterns": common_patterns,
        "recommended_rules": recommended_rules,
    })
    .to_string()
}
