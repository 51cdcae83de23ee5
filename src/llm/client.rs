//! Client for OpenAI-compatible chat completion endpoints.

use crate::config::LlmConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};
use wreq::Client;

/// Errors talking to the completion API.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Completion request failed: {0}")]
    Http(#[from] wreq::Error),

    #[error("Completion API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Completion API returned no message content")]
    EmptyResponse,
}

/// Produces text from a system + user prompt pair - enables mocking for tests.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

/// Describes an image in words.
#[async_trait]
pub trait ImageCaptioner: Send + Sync {
    async fn caption(&self, image_url: &str, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageRef<'a> },
}

#[derive(Debug, Serialize)]
struct ImageRef<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
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

/// Chat completion client used for both text generation and captioning.
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    vision_model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatClient {
    /// Builds a client from the `[llm]` config section.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            vision_model: config.vision_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn complete(&self, model: &str, messages: Vec<ChatMessage<'_>>) -> Result<String, LlmError> {
        let endpoint = format!("{}/chat/completions", self.base_url);
        let payload = ChatCompletionRequest {
            model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        debug!("POST {} (model {})", endpoint, model);

        let mut request = self.client.post(&endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        trace!("Completion: {} characters", text.len());
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let messages = vec![
            ChatMessage { role: "system", content: MessageContent::Text(system) },
            ChatMessage { role: "user", content: MessageContent::Text(user) },
        ];
        self.complete(&self.model, messages).await
    }
}

#[async_trait]
impl ImageCaptioner for ChatClient {
    async fn caption(&self, image_url: &str, prompt: &str) -> Result<String, LlmError> {
        let messages = vec![ChatMessage {
            role: "user",
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: prompt },
                ContentPart::ImageUrl { image_url: ImageRef { url: image_url } },
            ]),
        }];
        self.complete(&self.vision_model, messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_config(base_url: &str) -> LlmConfig {
        LlmConfig {
            base_url: format!("{}/v1/", base_url),
            api_key: Some("sk-test".to_string()),
            model: "text-model".to_string(),
            vision_model: "vision-model".to_string(),
            ..Default::default()
        }
    }

    fn completion(text: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}]
        })
    }

    #[test]
    fn test_request_serialization() {
        let payload = ChatCompletionRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text { text: "describe" },
                    ContentPart::ImageUrl { image_url: ImageRef { url: "https://x/a.jpg" } },
                ]),
            }],
            temperature: 0.1,
            max_tokens: 10,
            stream: false,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["messages"][0]["content"][0]["type"], "text");
        assert_eq!(value["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(value["messages"][0]["content"][1]["image_url"]["url"], "https://x/a.jpg");
    }

    #[tokio::test]
    async fn test_generate_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "text-model",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hello"}
                ],
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"ok\":true}")))
            .mount(&mock_server)
            .await;

        let client = ChatClient::new(&make_config(&mock_server.uri())).unwrap();
        let text = client.generate("sys", "hello").await.unwrap();
        assert_eq!(text, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_caption_uses_vision_model() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"model": "vision-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("A red plastic brick")))
            .mount(&mock_server)
            .await;

        let client = ChatClient::new(&make_config(&mock_server.uri())).unwrap();
        let text = client.caption("https://x/brick.jpg", "Describe").await.unwrap();
        assert_eq!(text, "A red plastic brick");
    }

    #[tokio::test]
    async fn test_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&mock_server)
            .await;

        let client = ChatClient::new(&make_config(&mock_server.uri())).unwrap();
        let err = client.generate("sys", "hello").await.unwrap_err();
        assert!(matches!(err, LlmError::Status { status: 429, .. }));
        assert!(err.to_string().contains("slow down"));
    }

    #[tokio::test]
    async fn test_empty_choices() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&mock_server)
            .await;

        let client = ChatClient::new(&make_config(&mock_server.uri())).unwrap();
        let err = client.generate("sys", "hello").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }
}
