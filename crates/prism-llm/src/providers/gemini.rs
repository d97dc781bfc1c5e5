//! Google Gemini adapter

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use prism_core::config::ProviderConfig;
use prism_core::llm::{
    estimate_tokens, ChatChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    ChatRole, Usage,
};

use crate::provider::{Provider, ProviderError, ProviderResult, DEFAULT_COST_PER_TOKEN};
use crate::providers::DEFAULT_REQUEST_TIMEOUT_MS;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Google Gemini provider
pub struct GeminiProvider {
    name: String,
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    cost_per_token: f64,
}

impl GeminiProvider {
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
                .unwrap_or_else(|| GEMINI_API_BASE.to_string()),
            model: descriptor
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            cost_per_token: descriptor.cost_per_token.unwrap_or(DEFAULT_COST_PER_TOKEN),
        }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        )
    }

    /// Split out the system instruction and map roles; Gemini calls the
    /// assistant role "model".
    fn convert_messages(
        messages: &[ChatMessage],
    ) -> (Option<GeminiSystemInstruction>, Vec<GeminiContent>) {
        let system_instruction = messages
            .iter()
            .find(|m| m.role == ChatRole::System)
            .map(|m| GeminiSystemInstruction {
                parts: vec![GeminiPart {
                    text: m.content.clone(),
                }],
            });

        let contents = messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| GeminiContent {
                role: match m.role {
                    ChatRole::Assistant => "model".to_string(),
                    _ => "user".to_string(),
                },
                parts: vec![GeminiPart {
                    text: m.content.clone(),
                }],
            })
            .collect();

        (system_instruction, contents)
    }

    fn build_request(&self, request: &ChatCompletionRequest) -> GeminiRequest {
        let (system_instruction, contents) = Self::convert_messages(&request.messages);
        GeminiRequest {
            contents,
            system_instruction,
            generation_config: Some(GeminiGenerationConfig {
                temperature: request.temperature,
                top_p: request.top_p,
                max_output_tokens: request.max_tokens,
            }),
        }
    }

    fn normalize_response(
        &self,
        response: GeminiResponse,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatCompletionResponse> {
        let candidate = response
            .candidates
            .first()
            .ok_or_else(|| ProviderError::Malformed("no candidates in response".into()))?;

        let content = candidate
            .content
            .parts
            .iter()
            .map(|p| p.text.clone())
            .collect::<Vec<_>>()
            .join("");

        let finish_reason = match candidate.finish_reason.as_deref() {
            Some("MAX_TOKENS") => "length",
            _ => "stop",
        };

        let usage = match &response.usage_metadata {
            Some(u) => Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            },
            None => {
                let prompt: u32 = request
                    .messages
                    .iter()
                    .map(|m| estimate_tokens(&m.content))
                    .sum();
                Usage::new(prompt, estimate_tokens(&content))
            }
        };

        Ok(ChatCompletionResponse {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: self.model.clone(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage::assistant(content),
                finish_reason: Some(finish_reason.to_string()),
            }],
            usage,
            routing_metadata: None,
        })
    }

    fn classify_error(status: u16, body: &str) -> ProviderError {
        // Gemini reports a bad key as 400 with an API_KEY_INVALID reason.
        if status == 400 && body.contains("API_KEY_INVALID") {
            return ProviderError::InvalidCredential;
        }
        let message = serde_json::from_str::<GeminiErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());
        ProviderError::from_status(status, message)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
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
        debug!("Sending chat completion request to Gemini");

        let response = self
            .client
            .post(self.api_url())
            .header("content-type", "application/json")
            .json(&self.build_request(request))
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_error(status.as_u16(), &body));
        }

        let api_response: GeminiResponse = response
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

// Gemini API types

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: GeminiContent,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: u32,
    candidates_token_count: u32,
    total_token_count: u32,
}

#[derive(Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorDetail,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    message: String,
}
