use crate::providers::traits::TemplateProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub struct OpenAiProvider {
    api_key: Option<String>,
    completions_url: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(
        api_key: Option<&str>,
        base_url: Option<&str>,
        model: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Self {
        let base = base_url
            .map_or("https://api.openai.com", |u| u.trim_end_matches('/'))
            .to_string();
        Self {
            api_key: api_key.map(str::trim).filter(|k| !k.is_empty()).map(String::from),
            completions_url: format!("{base}/v1/chat/completions"),
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
impl TemplateProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, system: &str, prompt: &str) -> anyhow::Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            anyhow::bail!("OpenAI API key not configured");
        };

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: system.to_string(),
                },
                Message {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error("OpenAI", response).await);
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate as MockResponse};

    #[test]
    fn completions_url_from_base() {
        let p = OpenAiProvider::new(Some("k"), Some("http://local:9"), "gpt", 0.7, 10);
        assert_eq!(p.completions_url, "http://local:9/v1/chat/completions");
    }

    #[test]
    fn request_includes_both_roles() {
        let req = ChatRequest {
            model: "gpt".into(),
            messages: vec![
                Message {
                    role: "system",
                    content: "json only".into(),
                },
                Message {
                    role: "user",
                    content: "generate".into(),
                },
            ],
            temperature: 0.7,
            max_tokens: 128,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"role\":\"system\""));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[tokio::test]
    async fn generate_without_key_fails_fast() {
        let provider = OpenAiProvider::new(None, None, "gpt", 0.7, 64);
        assert!(provider.generate("sys", "prompt").await.is_err());
    }

    #[tokio::test]
    async fn generate_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(MockResponse::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "[]"}}]
            })))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(Some("key"), Some(&server.uri()), "gpt", 0.7, 64);
        assert_eq!(provider.generate("sys", "prompt").await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn empty_choices_yield_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(MockResponse::new(200).set_body_json(serde_json::json!({
                "choices": []
            })))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(Some("key"), Some(&server.uri()), "gpt", 0.7, 64);
        assert_eq!(provider.generate("sys", "prompt").await.unwrap(), "");
    }
}
