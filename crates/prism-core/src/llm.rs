//! Chat types - OpenAI-compatible request/response shapes
//!
//! These are the gateway's canonical formats. Adapters translate between
//! them and vendor wire formats; everything else in the gateway speaks
//! only these types.

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Hard cap on `max_tokens` accepted from clients.
pub const MAX_TOKENS_LIMIT: u32 = 4000;

/// Chat completion request (OpenAI-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ChatCompletionRequest {
    /// Validate parameter ranges before any provider is contacted.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.model.is_empty() {
            return Err(GatewayError::Validation("model must not be empty".into()));
        }
        if self.messages.is_empty() {
            return Err(GatewayError::Validation(
                "messages must contain at least one entry".into(),
            ));
        }
        for (i, msg) in self.messages.iter().enumerate() {
            if msg.content.is_empty() {
                return Err(GatewayError::Validation(format!(
                    "messages[{i}].content must not be empty"
                )));
            }
        }
        if let Some(max_tokens) = self.max_tokens {
            if max_tokens == 0 || max_tokens > MAX_TOKENS_LIMIT {
                return Err(GatewayError::Validation(format!(
                    "max_tokens must be between 1 and {MAX_TOKENS_LIMIT}"
                )));
            }
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(GatewayError::Validation(
                    "temperature must be between 0 and 2".into(),
                ));
            }
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(GatewayError::Validation(
                    "top_p must be between 0 and 1".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Chat role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Chat completion response (OpenAI-compatible), plus the gateway's
/// routing metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_metadata: Option<RoutingMetadata>,
}

/// Chat choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

/// Token usage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Estimate a token count from raw text when the upstream does not report
/// one. Four characters per token, rounded up.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as u32).div_ceil(4)
}

/// Outcome of a single outbound provider call within one client request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub provider: String,
    pub status: AttemptStatus,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttemptRecord {
    pub fn success(provider: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            status: AttemptStatus::Success,
            duration_ms,
            error: None,
        }
    }

    pub fn failed(provider: impl Into<String>, duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            status: AttemptStatus::Failed,
            duration_ms,
            error: Some(error.into()),
        }
    }
}

/// Attempt status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Success,
    Failed,
}

/// How a request was routed, attached to every successful response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingMetadata {
    pub primary_provider: String,
    pub attempts: Vec<AttemptRecord>,
    /// Time spent inside the router (selection + all attempts), in ms.
    pub total_processing_time: u64,
    pub policy_used: String,
    /// Full HTTP handler time, in ms. Filled in by the API layer.
    pub api_processing_time: u64,
    /// ISO-8601 timestamp of the routing decision.
    pub timestamp: String,
    pub tenant_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "gpt-3.5-turbo".to_string(),
            messages: vec![ChatMessage::user("Hello")],
            max_tokens: None,
            temperature: None,
            top_p: None,
            stream: None,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_empty_messages_rejected() {
        let mut req = request();
        req.messages.clear();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_temperature_out_of_range_rejected() {
        let mut req = request();
        req.temperature = Some(2.5);
        assert!(req.validate().is_err());

        req.temperature = Some(2.0);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_max_tokens_bounds() {
        let mut req = request();
        req.max_tokens = Some(0);
        assert!(req.validate().is_err());

        req.max_tokens = Some(4001);
        assert!(req.validate().is_err());

        req.max_tokens = Some(4000);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::assistant("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
    }

    #[test]
    fn test_token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_attempt_record_wire_shape() {
        let attempt = AttemptRecord::failed("gemini", 120, "upstream_timeout");
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["duration"], 120);
        assert_eq!(json["error"], "upstream_timeout");
    }
}
