//! Groq adapter
//!
//! Groq speaks the OpenAI chat-completions wire format, so translation
//! is limited to swapping the model name and filling in usage when the
//! upstream omits it.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use prism_core::config::ProviderConfig;
use prism_core::llm::{
    estimate_tokens, ChatChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    Usage,
};

use crate::provider::{Provider, ProviderError, ProviderResult, DEFAULT_COST_PER_TOKEN};
use crate::providers::DEFAULT_REQUEST_TIMEOUT_MS;

const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Groq provider
pub struct GroqProvider {
    name: String,
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    cost_per_token: f64,
}

impl GroqProvider {
    pub fn new(name: impl Into<String>, api_key: String, descriptor: &ProviderConfig) -> Self {
        let timeout = descriptor
            .request_timeout_ms
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
        Self {
            name: name.into(),
            client: Client::builder()
                .timeout(Duration::from_millis(timeout))
                .build()
                .expect("failed to build HTTP client"),
            api_key,
            api_base: descriptor
                .endpoint
                .clone()
                .unwrap_or_else(|| GROQ_API_BASE.to_string()),
            model: descriptor
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            cost_per_token: descriptor.cost_per_token.unwrap_or(DEFAULT_COST_PER_TOKEN),
        }
    }

    /// Clone the request with our upstream model and streaming stripped.
    fn upstream_request(&self, request: &ChatCompletionRequest) -> ChatCompletionRequest {
        let mut upstream = request.clone();
        upstream.model = self.model.clone();
        upstream.stream = None;
        upstream
    }

    fn normalize_response(
        &self,
        response: OpenAiWireResponse,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatCompletionResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("no choices in response".into()))?;

        let usage = match response.usage {
            Some(usage) => usage,
            None => {
                let prompt: u32 = request
                    .messages
                    .iter()
                    .map(|m| estimate_tokens(&m.content))
                    .sum();
                Usage::new(prompt, estimate_tokens(&choice.message.content))
            }
        };

        Ok(ChatCompletionResponse {
            id: response
                .id
                .unwrap_or_else(|| format!("chatcmpl-{}", uuid::Uuid::new_v4())),
            object: "chat.completion".to_string(),
            created: response
                .created
                .unwrap_or_else(|| chrono::Utc::now().timestamp()),
            model: response.model.unwrap_or_else(|| self.model.clone()),
            choices: vec![ChatChoice {
                index: 0,
                message: choice.message,
                finish_reason: choice.finish_reason,
            }],
            usage,
            routing_metadata: None,
        })
    }

    fn classify_error(status: u16, body: &str) -> ProviderError {
        let message = serde_json::from_str::<OpenAiWireError>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());
        ProviderError::from_status(status, message)
    }
}

#[async_trait]
impl Provider for GroqProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn cost_per_token(&self) -> f64 {
        self.cost_per_token
    }

    #[instrument(skip(self, request), fields(provider = %self.name, model = %self.model))]
    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatCompletionResponse> {
        debug!("Sending chat completion request to Groq");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.upstream_request(request))
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_error(status.as_u16(), &body));
        }

        let api_response: OpenAiWireResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        self.normalize_response(api_response, request)
    }

    async fn ping(&self) -> ProviderResult<u64> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user("ping")],
            max_tokens: Some(1),
            temperature: Some(0.0),
            top_p: None,
            stream: None,
        };
        let started = Instant::now();
        self.chat_completion(&request).await?;
        Ok(started.elapsed().as_millis() as u64)
    }
}

// OpenAI-compatible wire types. Upstream responses may omit fields the
// normalized shape requires, so these stay separate from the
// gateway-canonical types.

#[derive(Deserialize)]
pub(crate) struct OpenAiWireResponse {
    pub id: Option<String>,
    pub created: Option<i64>,
    pub model: Option<String>,
    pub choices: Vec<OpenAiWireChoice>,
    pub usage: Option<Usage>,
}

#[derive(Deserialize)]
pub(crate) struct OpenAiWireChoice {
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct OpenAiWireError {
    pub error: OpenAiWireErrorDetail,
}

#[derive(Deserialize)]
pub(crate) struct OpenAiWireErrorDetail {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::config::ProviderKind;

    fn provider() -> GroqProvider {
        let descriptor = ProviderConfig {
            kind: ProviderKind::Groq,
            endpoint: None,
            api_key_env: "GROQ_API_KEY".into(),
            enabled: true,
            model: None,
            cost_per_token: None,
            request_timeout_ms: None,
        };
        GroqProvider::new("groq", "gsk-test".into(), &descriptor)
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "gpt-3.5-turbo".into(),
            messages: vec![ChatMessage::user("Hello")],
            max_tokens: None,
            temperature: None,
            top_p: None,
            stream: Some(true),
        }
    }

    #[test]
    fn test_upstream_request_swaps_model_and_strips_stream() {
        let upstream = provider().upstream_request(&request());
        assert_eq!(upstream.model, DEFAULT_MODEL);
        assert_eq!(upstream.stream, None);
    }

    #[test]
    fn test_missing_usage_is_estimated() {
        let wire = OpenAiWireResponse {
            id: Some("chatcmpl-123".into()),
            created: Some(1_700_000_000),
            model: Some(DEFAULT_MODEL.into()),
            choices: vec![OpenAiWireChoice {
                message: ChatMessage::assistant("Hello there, how are you?"),
                finish_reason: Some("stop".into()),
            }],
            usage: None,
        };
        let normalized = provider().normalize_response(wire, &request()).unwrap();
        assert!(normalized.usage.prompt_tokens > 0);
        assert!(normalized.usage.completion_tokens > 0);
        assert_eq!(
            normalized.usage.total_tokens,
            normalized.usage.prompt_tokens + normalized.usage.completion_tokens
        );
    }

    #[test]
    fn test_rate_limit_classification() {
        let body = r#"{"error":{"message":"Rate limit reached","type":"tokens"}}"#;
        assert!(matches!(
            GroqProvider::classify_error(429, body),
            ProviderError::RateLimited
        ));
    }

    #[test]
    fn test_empty_choices_is_malformed() {
        let wire = OpenAiWireResponse {
            id: None,
            created: None,
            model: None,
            choices: vec![],
            usage: None,
        };
        assert!(matches!(
            provider().normalize_response(wire, &request()),
            Err(ProviderError::Malformed(_))
        ));
    }
}
