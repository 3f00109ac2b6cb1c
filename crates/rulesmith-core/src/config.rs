use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Per-repository config file, read from the repository root when present.
pub const WORKSPACE_CONFIG_FILE: &str = ".rulesmith.json";

/// Where the staged rules, the build task and the ignore patch live inside a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkspaceConfig {
    pub drafts_dir: String,
    pub rules_dir: String,
    pub rule_extension: String,
    pub build_file: String,
    pub build_task: String,
    pub ignore_file: String,
    pub ignore_pattern: String,
    /// Candidates scoring below this are recommended but not selected
    pub min_selection_score: u32,
    pub max_selected_rules: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            drafts_dir: "hack/drafts/cursor_rules".to_string(),
            rules_dir: ".cursor/rules".to_string(),
            rule_extension: "mdc".to_string(),
            build_file: "Makefile".to_string(),
            build_task: "update-cursor-rules".to_string(),
            ignore_file: ".dockerignore".to_string(),
            ignore_pattern: "hack/drafts/".to_string(),
            min_selection_score: 2,
            max_selected_rules: 10,
        }
    }
}

/// A repository root plus its resolved config.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: WorkspaceConfig,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, config: WorkspaceConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Open a workspace, reading `.rulesmith.json` from the root if it exists.
    /// A missing file gives the defaults; an unreadable one is an error.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, String> {
        let root = root.into();
        let path = root.join(WORKSPACE_CONFIG_FILE);
        let config = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| e.to_string())?;
            serde_json::from_str(&raw)
                .map_err(|e| format!("invalid {}: {}", path.display(), e))?
        } else {
            WorkspaceConfig::default()
        };
        Ok(Self { root, config })
    }

    pub fn drafts_dir(&self) -> PathBuf {
        self.root.join(&self.config.drafts_dir)
    }

    pub fn rules_dir(&self) -> PathBuf {
        self.root.join(&self.config.rules_dir)
    }

    pub fn build_file(&self) -> PathBuf {
        self.root.join(&self.config.build_file)
    }

    pub fn ignore_file(&self) -> PathBuf {
        self.root.join(&self.config.ignore_file)
    }

    /// Append the configured extension to a derived slug.
    pub fn file_name_for(&self, slug: &str) -> String {
        format!("{}.{}", slug, self.config.rule_extension)
    }

    pub fn draft_path(&self, file_name: &str) -> PathBuf {
        self.drafts_dir().join(file_name)
    }

    /// Path relative to the root, for messages shown to the caller.
    pub fn display_path<'a>(&self, path: &'a Path) -> std::borrow::Cow<'a, str> {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
    }
}

// --- AI settings ---

pub const SETTINGS_FILE: &str = "settings.json";
pub const ENV_AI_PROVIDER: &str = "RULESMITH_AI_PROVIDER";
pub const ENV_AI_MODEL: &str = "RULESMITH_AI_MODEL";
pub const ENV_AI_KEY: &str = "RULESMITH_AI_KEY";

/// Credentials for the LLM analyzer. Read from `~/.rulesmith/settings.json`,
/// with `RULESMITH_AI_*` environment variables taking precedence field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AiSettings {
    pub provider: String,
    pub api_key: String,
    pub model: String,
}

impl AiSettings {
    /// Replace fields with non-blank values from `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let fields = [
            (ENV_AI_PROVIDER, &mut self.provider),
            (ENV_AI_MODEL, &mut self.model),
            (ENV_AI_KEY, &mut self.api_key),
        ];
        for (var, field) in fields {
            if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
                *field = value.trim().to_string();
            }
        }
        self
    }

    /// A provider and model are set, plus a key for anything but a local Ollama.
    pub fn is_configured(&self) -> bool {
        let provider = self.provider.trim();
        !provider.is_empty()
            && !self.model.trim().is_empty()
            && (provider.eq_ignore_ascii_case("ollama") || !self.api_key.trim().is_empty())
    }
}

pub fn settings_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".rulesmith"))
}

/// A missing file gives empty settings; a malformed one is logged and ignored.
pub fn load_settings_file(path: &Path) -> AiSettings {
    let Ok(raw) = fs::read_to_string(path) else {
        return AiSettings::default();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(file = %path.display(), error = %e, "ignoring malformed AI settings");
        AiSettings::default()
    })
}

pub fn read_settings() -> AiSettings {
    settings_dir()
        .map(|dir| load_settings_file(&dir.join(SETTINGS_FILE)))
        .unwrap_or_default()
        .with_overrides(|var| std::env::var(var).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        assert_eq!(ws.config, WorkspaceConfig::default());
        assert_eq!(ws.file_name_for("python"), "python.mdc");
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(WORKSPACE_CONFIG_FILE),
            r#"{"rulesDir": ".rules", "maxSelectedRules": 3}"#,
        )
        .unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        assert_eq!(ws.config.rules_dir, ".rules");
        assert_eq!(ws.config.max_selected_rules, 3);
        assert_eq!(ws.config.build_task, "update-cursor-rules");
        assert_eq!(ws.rules_dir(), dir.path().join(".rules"));
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(WORKSPACE_CONFIG_FILE), "{not json").unwrap();
        assert!(Workspace::open(dir.path()).is_err());
    }

    #[test]
    fn ollama_needs_no_key() {
        let settings = AiSettings {
            provider: "Ollama".into(),
            api_key: String::new(),
            model: "llama3".into(),
        };
        assert!(settings.is_configured());
        let settings = AiSettings {
            provider: "openai".into(),
            ..settings
        };
        assert!(!settings.is_configured());
    }

    #[test]
    fn environment_overrides_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"provider": "openai", "apiKey": "file-key", "model": "gpt-4o"}"#).unwrap();

        let settings = load_settings_file(&path).with_overrides(|var| match var {
            ENV_AI_MODEL => Some("gpt-4o-mini".to_string()),
            ENV_AI_KEY => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(settings.provider, "openai");
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.api_key, "file-key");
    }

    #[test]
    fn unreadable_settings_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_settings_file(&dir.path().join("absent.json")), AiSettings::default());
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "provider = openai").unwrap();
        assert_eq!(load_settings_file(&path), AiSettings::default());
    }
}
