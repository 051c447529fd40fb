use async_trait::async_trait;

/// A backend able to turn a persona description into raw template JSON.
///
/// Implementations are interchangeable at startup; the engine validates and
/// parses whatever text comes back, so providers only promise best-effort
/// generation.
#[async_trait]
pub trait TemplateProvider: Send + Sync {
    /// Short provider tag for logs.
    fn name(&self) -> &str;

    /// Generate the template payload for the given system + user prompt.
    async fn generate(&self, system: &str, prompt: &str) -> anyhow::Result<String>;
}
