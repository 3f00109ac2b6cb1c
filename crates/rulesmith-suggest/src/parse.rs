use rulesmith_core::AnalysisResults;

#[derive(serde::Deserialize)]
struct LlmAnalysis {
    #[serde(default, alias = "repository_type", alias = "repoType")]
    repo_type: String,
    #[serde(default, alias = "patterns", alias = "commonPatterns")]
    common_patterns: Vec<String>,
    #[serde(
        default,
        alias = "recommended_rule_hints",
        alias = "recommendedRules",
        alias = "rules"
    )]
    recommended_rules: Vec<String>,
}

/// Parse raw analysis text into structured results.
/// Tries a JSON object first, then a loose "key: value" / bullet-list layout.
/// Never fails: unparseable text yields empty results.
pub fn parse_analysis(raw: &str) -> AnalysisResults {
    if let Some(json_str) = extract_json_object(raw) {
        if let Ok(a) = serde_json::from_str::<LlmAnalysis>(&json_str) {
            return clean(AnalysisResults {
                repo_type: a.repo_type,
                common_patterns: a.common_patterns,
                recommended_rule_hints: a.recommended_rules,
            });
        }
    }
    clean(parse_line_by_line(raw))
}

/// Extract the outermost JSON object substring from raw LLM output.
fn extract_json_object(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(raw[start..=end].to_string())
}

#[derive(PartialEq)]
enum Field {
    None,
    RepoType,
    Patterns,
    Rules,
}

fn field_for(key: &str) -> Option<Field> {
    let key = key.trim().trim_matches(|c: char| c == '*' || c == '#').trim().to_lowercase();
    match key.as_str() {
        "repo_type" | "repo type" | "repository type" | "type" => Some(Field::RepoType),
        "common_patterns" | "common patterns" | "patterns" => Some(Field::Patterns),
        "recommended_rules" | "recommended rules" | "rules" | "recommended_rule_hints" => {
            Some(Field::Rules)
        }
        _ => None,
    }
}

/// Fallback for prose answers such as:
///
/// ```text
/// Repository type: python web service
/// Common patterns:
/// - FastAPI routers
/// Recommended rules: python-best-practices, pytest-testing
/// ```
fn parse_line_by_line(raw: &str) -> AnalysisResults {
    let mut out = AnalysisResults::default();
    let mut current = Field::None;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            match current {
                Field::Patterns => out.common_patterns.push(item.trim().to_string()),
                Field::Rules => out.recommended_rule_hints.push(item.trim().to_string()),
                Field::None | Field::RepoType => {}
            }
            continue;
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let Some(field) = field_for(key) else {
            continue;
        };
        let value = value.trim();
        match field {
            Field::RepoType | Field::None => {
                out.repo_type = value.to_string();
                current = Field::None;
            }
            Field::Patterns => {
                out.common_patterns.extend(split_inline(value));
                current = Field::Patterns;
            }
            Field::Rules => {
                out.recommended_rule_hints.extend(split_inline(value));
                current = Field::Rules;
            }
        }
    }

    out
}

fn split_inline(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn clean(mut a: AnalysisResults) -> AnalysisResults {
    a.repo_type = a.repo_type.trim().to_string();
    for list in [&mut a.common_patterns, &mut a.recommended_rule_hints] {
        let mut seen = std::collections::HashSet::new();
        list.retain(|s| !s.trim().is_empty() && seen.insert(s.trim().to_lowercase()));
        for s in list.iter_mut() {
            *s = s.trim().to_string();
        }
    }
    a
}
