//! Single-shot chat completion through the `llm` crate.

use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use rulesmith_core::AiSettings;

pub const PROVIDERS: &[&str] = &[
    "openai",
    "anthropic",
    "google",
    "ollama",
    "groq",
    "mistral",
    "deepseek",
];

// Analysis output is structured data; keep the model close to deterministic.
const TEMPERATURE: f32 = 0.2;
const MAX_TOKENS: u32 = 1500;

fn backend_for(provider: &str) -> Result<LLMBackend, String> {
    let backend = match provider.trim().to_ascii_lowercase().as_str() {
        "openai" => LLMBackend::OpenAI,
        "anthropic" | "claude" => LLMBackend::Anthropic,
        "google" | "gemini" => LLMBackend::Google,
        "ollama" => LLMBackend::Ollama,
        "groq" => LLMBackend::Groq,
        "mistral" => LLMBackend::Mistral,
        "deepseek" => LLMBackend::DeepSeek,
        other => {
            return Err(format!(
                "unsupported AI provider '{}' (expected one of: {})",
                other,
                PROVIDERS.join(", ")
            ))
        }
    };
    Ok(backend)
}

/// Send one system + user exchange and return the trimmed reply text.
pub async fn complete(settings: &AiSettings, system: &str, user_msg: &str) -> Result<String, String> {
    let backend = backend_for(&settings.provider)?;
    let key = settings.api_key.trim();
    if key.is_empty() && !matches!(backend, LLMBackend::Ollama) {
        return Err(format!("no API key configured for {}", settings.provider));
    }

    let mut builder = LLMBuilder::new()
        .backend(backend)
        .model(&settings.model)
        .system(system)
        .temperature(TEMPERATURE)
        .max_tokens(MAX_TOKENS);
    if !key.is_empty() {
        builder = builder.api_key(key);
    }
    let client = builder
        .build()
        .map_err(|e| format!("{} client setup failed: {e}", settings.provider))?;

    let reply = client
        .chat(&[ChatMessage::user().content(user_msg).build()])
        .await
        .map_err(|e| format!("{} request failed: {e}", settings.provider))?;

    reply
        .text()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| format!("{} returned an empty reply", settings.provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_resolve_with_aliases() {
        for p in PROVIDERS {
            assert!(backend_for(p).is_ok(), "{p}");
        }
        assert!(matches!(backend_for(" Claude "), Ok(LLMBackend::Anthropic)));
        assert!(matches!(backend_for("gemini"), Ok(LLMBackend::Google)));
        match backend_for("acme") {
            Err(e) => assert!(e.starts_with("unsupported AI provider 'acme'")),
            Ok(_) => panic!("acme accepted as a provider"),
        }
    }

    #[tokio::test]
    async fn hosted_provider_needs_a_key() {
        let settings = AiSettings {
            provider: "openai".into(),
            api_key: "  ".into(),
            model: "gpt-4o-mini".into(),
        };
        let err = complete(&settings, "system", "user").await.unwrap_err();
        assert_eq!(err, "no API key configured for openai");
    }
}
