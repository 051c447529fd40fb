use crate::providers::traits::TemplateProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub struct AnthropicProvider {
    api_key: Option<String>,
    messages_url: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    client: Client,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Unsupported,
}

impl AnthropicProvider {
    pub fn new(
        api_key: Option<&str>,
        base_url: Option<&str>,
        model: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Self {
        let base = base_url
            .map_or("https://api.anthropic.com", |u| u.trim_end_matches('/'))
            .to_string();
        Self {
            api_key: api_key.map(str::trim).filter(|k| !k.is_empty()).map(String::from),
            messages_url: format!("{base}/v1/messages"),
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
impl TemplateProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, system: &str, prompt: &str) -> anyhow::Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            anyhow::bail!("Anthropic API key not configured");
        };

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: system.to_string(),
            messages: vec![Message {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.messages_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error("Anthropic", response).await);
        }

        let parsed: MessagesResponse = response.json().await?;
        let text = parsed
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Unsupported => None,
            })
            .ok_or_else(|| anyhow::anyhow!("Anthropic response had no text content"))?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate as MockResponse};

    #[test]
    fn missing_key_is_none() {
        let p = AnthropicProvider::new(Some("  "), None, "claude", 0.7, 2048);
        assert!(p.api_key.is_none());
    }

    #[test]
    fn messages_url_from_base() {
        let p = AnthropicProvider::new(Some("k"), Some("http://local:9/"), "claude", 0.7, 10);
        assert_eq!(p.messages_url, "http://local:9/v1/messages");
    }

    #[tokio::test]
    async fn generate_without_key_fails_fast() {
        let provider = AnthropicProvider::new(None, None, "claude", 0.7, 2048);
        let err = provider.generate("sys", "prompt").await.unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[tokio::test]
    async fn generate_extracts_first_text_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(MockResponse::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "[]"}]
            })))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new(Some("key"), Some(&server.uri()), "claude", 0.7, 64);
        assert_eq!(provider.generate("sys", "prompt").await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn generate_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(MockResponse::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new(Some("bad"), Some(&server.uri()), "claude", 0.7, 64);
        let err = provider.generate("sys", "prompt").await.unwrap_err();
        assert!(err.to_string().contains("Anthropic"));
    }
}
