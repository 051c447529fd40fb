use crate::providers::traits::TemplateProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub struct OllamaProvider {
    base_url: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    system: String,
    stream: bool,
    options: Options,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaProvider {
    pub fn new(base_url: Option<&str>, model: &str, temperature: f64, max_tokens: u32) -> Self {
        Self {
            base_url: base_url
                .unwrap_or("http://localhost:11434")
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            temperature,
            max_tokens,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

#[async_trait]
impl TemplateProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, system: &str, prompt: &str) -> anyhow::Result<String> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            system: system.to_string(),
            stream: false,
            options: Options {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };
        let url = format!("{}/api/generate", self.base_url);

        let response = self.client.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(super::api_error("Ollama", response).await);
        }

        let parsed: GenerateResponse = response.json().await?;
        Ok(parsed.response)
    }
}
