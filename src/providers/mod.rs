//! LLM provider backends for deployment-time template generation.
//!
//! Providers run once at startup; a failure here is a degradation, not an
//! outage. The persona engine falls back to the built-in packs.

mod anthropic;
mod ollama;
mod openai;
mod traits;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use traits::TemplateProvider;

use crate::config::LlmConfig;

/// Uniform error shape for non-2xx provider responses.
pub(crate) async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    anyhow::anyhow!("{provider} API error ({status}): {body}")
}

/// Provider that always fails, pushing the engine into the pack fallback.
/// Selected when no provider is configured.
pub struct NullProvider;

#[async_trait::async_trait]
impl TemplateProvider for NullProvider {
    fn name(&self) -> &str {
        "none"
    }

    async fn generate(&self, _system: &str, _prompt: &str) -> anyhow::Result<String> {
        anyhow::bail!("no template provider configured")
    }
}

/// Resolve an API key: explicit config wins, then the provider's
/// environment variable.
fn resolve_api_key(explicit: Option<&str>, env_var: &str) -> Option<String> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    std::env::var(env_var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Build the provider selected by `llm.provider`. Unknown names map to the
/// null provider; the engine logs and falls back.
pub fn create_provider(llm: &LlmConfig) -> Box<dyn TemplateProvider> {
    match llm.provider.as_str() {
        "ollama" => Box::new(OllamaProvider::new(
            llm.base_url.as_deref(),
            &llm.model,
            llm.temperature,
            llm.max_tokens,
        )),
        "anthropic" => Box::new(AnthropicProvider::new(
            resolve_api_key(llm.api_key.as_deref(), "ANTHROPIC_API_KEY").as_deref(),
            llm.base_url.as_deref(),
            &llm.model,
            llm.temperature,
            llm.max_tokens,
        )),
        "openai" => Box::new(OpenAiProvider::new(
            resolve_api_key(llm.api_key.as_deref(), "OPENAI_API_KEY").as_deref(),
            llm.base_url.as_deref(),
            &llm.model,
            llm.temperature,
            llm.max_tokens,
        )),
        _ => Box::new(NullProvider),
    }
}
