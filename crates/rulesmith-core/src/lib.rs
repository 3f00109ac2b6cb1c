pub mod config;
pub mod deploy;
pub mod error;
pub mod library;
pub mod materialize;
pub mod recommend;
pub mod template;

pub use config::{AiSettings, Workspace, WorkspaceConfig};
pub use error::RuleError;

use serde::{Deserialize, Serialize};

// --- Types ---

/// What the caller knows about the repository. Supplied on every call, never derived here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RepositoryProfile {
    /// Free-text description of the repository
    #[serde(default)]
    pub description: String,
    /// Primary languages, e.g. ["python", "typescript"]
    #[serde(default)]
    pub main_languages: Vec<String>,
    /// File globs that matter in this repository, e.g. ["src/**/*.py"]
    #[serde(default)]
    pub file_patterns: Vec<String>,
    /// Notable features or frameworks, free text
    #[serde(default)]
    pub key_features: Vec<String>,
}

impl RepositoryProfile {
    pub fn is_empty(&self) -> bool {
        self.description.trim().is_empty()
            && self.main_languages.is_empty()
            && self.file_patterns.is_empty()
            && self.key_features.is_empty()
    }

    /// Flatten the profile into one line of text for keyword matching.
    pub fn summary(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        parts.push(self.description.as_str());
        parts.extend(self.main_languages.iter().map(String::as_str));
        parts.extend(self.file_patterns.iter().map(String::as_str));
        parts.extend(self.key_features.iter().map(String::as_str));
        parts
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Structured findings produced by the analysis phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AnalysisResults {
    #[serde(default)]
    pub repo_type: String,
    #[serde(default)]
    pub common_patterns: Vec<String>,
    #[serde(default, alias = "recommended_rules")]
    pub recommended_rule_hints: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    AgentSelected,
    AlwaysApplied,
    AutoSelect,
    AutoSelectWithDescription,
    Manual,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::AgentSelected => "agent_selected",
            RuleType::AlwaysApplied => "always_applied",
            RuleType::AutoSelect => "auto_select",
            RuleType::AutoSelectWithDescription => "auto_select_with_description",
            RuleType::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Language,
    Framework,
    Testing,
    Tooling,
    Workflow,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Language => "language",
            Category::Framework => "framework",
            Category::Testing => "testing",
            Category::Tooling => "tooling",
            Category::Workflow => "workflow",
        }
    }
}

/// A proposed rule, scored against a repository summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RuleCandidate {
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub globs: Vec<String>,
    pub rule_type: RuleType,
    #[serde(default)]
    pub priority: u32,
    /// Names of other candidates this one presumes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_keywords: Vec<String>,
}
