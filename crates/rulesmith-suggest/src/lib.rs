pub mod engine;
pub mod offline;
pub mod parse;
pub mod prompt;

use async_trait::async_trait;
use rulesmith_core::{AiSettings, RepositoryProfile};

pub use parse::parse_analysis;
pub use prompt::analysis_prompt;

/// Something that turns a repository profile into raw analysis text.
#[async_trait]
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze(&self, profile: &RepositoryProfile) -> Result<String, String>;
}

/// Sends the analysis prompt to the configured LLM provider.
pub struct LlmAnalyzer {
    settings: AiSettings,
}

impl LlmAnalyzer {
    pub fn new(settings: AiSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Analyzer for LlmAnalyzer {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn analyze(&self, profile: &RepositoryProfile) -> Result<String, String> {
        let system = prompt::system_prompt();
        let user_msg = prompt::user_message(profile);

        tracing::info!(
            provider = %self.settings.provider,
            model = %self.settings.model,
            "sending repository analysis"
        );

        let raw = engine::complete(&self.settings, &system, &user_msg).await?;
        tracing::debug!(%raw, "raw analysis output");
        Ok(raw)
    }
}

/// Derives the analysis from the profile without any network call.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineAnalyzer;

#[async_trait]
impl Analyzer for OfflineAnalyzer {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn analyze(&self, profile: &RepositoryProfile) -> Result<String, String> {
        Ok(offline::analyze_profile(profile))
    }
}

/// The LLM analyzer when AI settings are complete, otherwise the offline one.
pub fn analyzer_for(settings: &AiSettings) -> Box<dyn Analyzer> {
    if settings.is_configured() {
        Box::new(LlmAnalyzer::new(settings.clone()))
    } else {
        Box::new(OfflineAnalyzer)
    }
}
