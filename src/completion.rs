use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::config::Config;
use crate::conversation::Turn;
use crate::error::{CompletionError, CompletionErrorKind};

/// Everything the provider needs for one reply: the fixed system prompt
/// followed by the session history, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub messages: Vec<Turn>,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, messages: Vec<Turn>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages,
        }
    }
}

/// A remote model that turns a conversation into raw reply text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

// Structures matching the OpenAI-compatible /chat/completions endpoint
#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Client for Groq's chat completions API (or anything speaking the same
/// OpenAI-style wire format).
pub struct GroqClient {
    http: Client,
    config: Config,
}

impl GroqClient {
    pub fn new(config: Config) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> ChatCompletionBody<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(WireMessage {
            role: "system",
            content: &request.system_prompt,
        });
        messages.extend(request.messages.iter().map(|turn| WireMessage {
            role: turn.role().as_str(),
            content: turn.content(),
        }));

        ChatCompletionBody {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            top_p: self.config.top_p,
            stream: false,
        }
    }
}

/// Prefer the provider's `{"error": {"message": ...}}` text over the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait]
impl CompletionClient for GroqClient {
    #[instrument(skip(self, request), fields(turns = request.messages.len()))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = self.body(request);
        debug!(url = %self.config.api_url, model = %self.config.model, "Sending chat completion request");

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Completion request could not be sent");
                CompletionError::new(CompletionErrorKind::Network, e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %error_body, "Completion API request failed");
            return Err(CompletionError::from_status(
                status.as_u16(),
                api_error_message(&error_body),
            ));
        }

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            CompletionError::new(
                CompletionErrorKind::InvalidResponse,
                format!("failed to parse completion response: {}", e),
            )
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                CompletionError::new(
                    CompletionErrorKind::InvalidResponse,
                    "response contained no message content",
                )
            })?;

        debug!(chars = content.len(), "Received completion");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GroqClient {
        GroqClient::new(Config {
            api_key: "key".to_string(),
            api_url: "http://localhost/v1/chat/completions".to_string(),
            model: "test-model".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            top_p: 1.0,
        })
    }

    #[test]
    fn test_body_prepends_system_prompt() {
        let client = client();
        let request = CompletionRequest::new(
            "be nice",
            vec![Turn::user("Hello"), Turn::assistant("Hi"), Turn::user("Bye")],
        );
        let json = serde_json::to_value(client.body(&request)).unwrap();

        assert_eq!(json["model"], "test-model");
        assert_eq!(json["max_tokens"], 2048);
        assert_eq!(json["stream"], false);
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], serde_json::json!({"role": "system", "content": "be nice"}));
        assert_eq!(messages[1], serde_json::json!({"role": "user", "content": "Hello"}));
        assert_eq!(messages[2], serde_json::json!({"role": "assistant", "content": "Hi"}));
        assert_eq!(messages[3], serde_json::json!({"role": "user", "content": "Bye"}));
    }

    #[test]
    fn test_api_error_message_extraction() {
        let body = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#;
        assert_eq!(api_error_message(body), "Invalid API Key");
        assert_eq!(api_error_message("  upstream timeout \n"), "upstream timeout");
    }
}
