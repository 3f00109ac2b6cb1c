use rulesmith_core::RepositoryProfile;

fn push_list(out: &mut String, label: &str, items: &[String]) {
    out.push_str(label);
    out.push_str(":\n");
    let items: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        out.push_str("  (none given)\n");
        return;
    }
    for item in items {
        out.push_str("  - ");
        out.push_str(item);
        out.push('\n');
    }
}

/// Compact text form of a profile for LLM consumption.
pub fn serialize_profile(profile: &RepositoryProfile) -> String {
    let mut out = String::with_capacity(512);
    out.push_str("DESCRIPTION:\n  ");
    if profile.description.trim().is_empty() {
        out.push_str("(none given)");
    } else {
        out.push_str(profile.description.trim());
    }
    out.push('\n');
    push_list(&mut out, "LANGUAGES", &profile.main_languages);
    push_list(&mut out, "FILE PATTERNS", &profile.file_patterns);
    push_list(&mut out, "KEY FEATURES", &profile.key_features);
    out
}

pub fn system_prompt() -> String {
    "You are a repository analyst preparing rules that steer an AI coding assistant. \
Given a short profile of a repository, identify what kind of repository it is, \
the conventions and patterns its code likely follows, and which rule files would help \
an assistant working in it.\n\n\
Focus on:\n\
- The repository type in a few words (e.g. \"python web service\", \"rust cli\", \"react frontend\")\n\
- Concrete, recurring patterns: frameworks, test layout, build tooling, deployment\n\
- Rules named in kebab-case after what they govern (e.g. \"python-best-practices\", \
\"pytest-testing\", \"docker-conventions\")\n\n\
Do NOT:\n\
- Invent frameworks or tools the profile gives no hint of\n\
- Give generic advice that applies to every repository\n\n\
Output ONLY a JSON object with exactly these keys: \
{\"repo_type\": \"<type>\", \"common_patterns\": [\"<pattern>\", ...], \
\"recommended_rules\": [\"<rule-name>\", ...]}. \
Use empty arrays when nothing applies. Output nothing else."
        .to_string()
}

pub fn user_message(profile: &RepositoryProfile) -> String {
    serialize_profile(profile)
}

/// System prompt and profile in one block, for callers that run the analysis
/// themselves and hand the result back to phase 1.
pub fn analysis_prompt(profile: &RepositoryProfile) -> String {
    format!(
        "{}\n\n## Repository profile\n{}",
        system_prompt(),
        user_message(profile)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_serializes_every_field() {
        let profile = RepositoryProfile {
            description: "Inventory API".into(),
            main_languages: vec!["python".into(), " ".into()],
            file_patterns: vec!["app/**/*.py".into()],
            key_features: vec![],
        };
        let text = serialize_profile(&profile);
        assert!(text.contains("DESCRIPTION:\n  Inventory API\n"));
        assert!(text.contains("LANGUAGES:\n  - python\n"));
        assert!(text.contains("FILE PATTERNS:\n  - app/**/*.py\n"));
        assert!(text.contains("KEY FEATURES:\n  (none given)\n"));
    }

    #[test]
    fn analysis_prompt_asks_for_json() {
        let prompt = analysis_prompt(&RepositoryProfile::default());
        assert!(prompt.contains("\"repo_type\""));
        assert!(prompt.contains("## Repository profile"));
    }
}
