//! HuggingFace Inference adapter
//!
//! Uses the OpenAI-compatible router endpoint. The one HuggingFace
//! quirk worth handling specially is the model-loading 503, which must
//! surface as a retriable unavailability rather than a hard error.

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use prism_core::config::ProviderConfig;
use prism_core::llm::{
    estimate_tokens, ChatChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    Usage,
};

use crate::provider::{Provider, ProviderError, ProviderResult, DEFAULT_COST_PER_TOKEN};
use crate::providers::groq::{OpenAiWireError, OpenAiWireResponse};
use crate::providers::DEFAULT_REQUEST_TIMEOUT_MS;

const HF_API_BASE: &str = "https://router.huggingface.co/v1";
const DEFAULT_MODEL: &str = "meta-llama/Llama-3.1-8B-Instruct";

/// HuggingFace Inference provider
pub struct HuggingFaceProvider {
    name: String,
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    cost_per_token: f64,
}

impl HuggingFaceProvider {
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
                .unwrap_or_else(|| HF_API_BASE.to_string()),
            model: descriptor
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            cost_per_token: descriptor.cost_per_token.unwrap_or(DEFAULT_COST_PER_TOKEN),
        }
    }

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
        // A cold model returns 503 with an estimated_time field while it
        // is being loaded onto an inference worker.
        if status == 503 {
            return ProviderError::Unavailable(if body.contains("estimated_time") {
                "model is loading".to_string()
            } else {
                "upstream returned 503".to_string()
            });
        }
        let message = serde_json::from_str::<OpenAiWireError>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());
        ProviderError::from_status(status, message)
    }
}

#[async_trait]
impl Provider for HuggingFaceProvider {
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
        debug!("Sending chat completion request to HuggingFace");

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_loading_503_is_unavailable() {
        let body = r#"{"error":"Model meta-llama/Llama-3.1-8B-Instruct is currently loading","estimated_time":42.5}"#;
        match HuggingFaceProvider::classify_error(503, body) {
            ProviderError::Unavailable(msg) => assert!(msg.contains("loading")),
            other => panic!("unexpected classification: {other}"),
        }
    }

    #[test]
    fn test_unauthorized_is_invalid_credential() {
        assert!(matches!(
            HuggingFaceProvider::classify_error(401, "Unauthorized"),
            ProviderError::InvalidCredential
        ));
    }
}
