//! Provider abstraction
//!
//! A provider is an upstream LLM service with two capabilities: perform a
//! normalized chat completion, and answer a cheap health probe. Adapters
//! map vendor-specific error signals onto [`ProviderError`] so the router
//! never sees vendor detail.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use prism_core::config::{redact_key, ProviderConfig, ProviderKind};
use prism_core::llm::{ChatCompletionRequest, ChatCompletionResponse};

use crate::providers::{GeminiProvider, GroqProvider, HuggingFaceProvider};

/// Default cost per token when neither the descriptor nor a static table
/// provides one.
pub const DEFAULT_COST_PER_TOKEN: f64 = 0.002;

/// Provider error kinds. Adapters MUST classify every upstream failure
/// into one of these; they never retry on their own.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Upstream rejected our credential
    #[error("invalid credential")]
    InvalidCredential,

    /// Upstream returned 429
    #[error("upstream rate limited")]
    RateLimited,

    /// Upstream unreachable or temporarily down (e.g. model-loading 503)
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Adapter-internal or router deadline expired
    #[error("upstream timed out")]
    Timeout,

    /// Upstream responded with an unparseable body
    #[error("malformed upstream response: {0}")]
    Malformed(String),

    /// Anything else
    #[error("upstream error: {message}")]
    Other {
        status: Option<u16>,
        message: String,
    },
}

impl ProviderError {
    /// Stable machine-readable kind, recorded in attempt records and
    /// health samples.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCredential => "invalid_credential",
            Self::RateLimited => "upstream_rate_limited",
            Self::Unavailable(_) => "upstream_unavailable",
            Self::Timeout => "upstream_timeout",
            Self::Malformed(_) => "upstream_malformed",
            Self::Other { .. } => "upstream_other",
        }
    }

    /// Classify a transport-level reqwest failure.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Other {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }

    /// Classify a non-2xx upstream status that is not vendor-specific.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::InvalidCredential,
            429 => Self::RateLimited,
            502 | 503 | 504 => Self::Unavailable(format!("upstream returned {status}")),
            _ => Self::Other {
                status: Some(status),
                message: body,
            },
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Capability contract for upstream LLM services.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique provider name from the descriptor (e.g. "gemini-flash").
    fn name(&self) -> &str;

    /// USD per token for cost-aware policies.
    fn cost_per_token(&self) -> f64;

    /// Perform the upstream call. No retries; the router owns failover.
    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatCompletionResponse>;

    /// Minimal synthetic call for health probing. Returns measured
    /// latency in milliseconds.
    async fn ping(&self) -> ProviderResult<u64>;
}

/// Registry of loaded provider instances, keyed by descriptor name.
///
/// Built once at startup from enabled descriptors whose secret is
/// present; replaced wholesale on reload.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Instantiate adapters for every enabled descriptor whose API key
    /// environment variable is set. Descriptors with a missing secret
    /// are skipped with a warning.
    pub fn from_config(descriptors: &HashMap<String, ProviderConfig>) -> Self {
        let mut registry = Self::new();
        for (name, descriptor) in descriptors {
            if !descriptor.enabled {
                warn!(provider = %name, "Provider disabled in configuration, skipping");
                continue;
            }
            let api_key = match std::env::var(&descriptor.api_key_env) {
                Ok(key) if !key.is_empty() => key,
                _ => {
                    warn!(
                        provider = %name,
                        env = %descriptor.api_key_env,
                        "API key not set, skipping provider"
                    );
                    continue;
                }
            };
            tracing::debug!(
                provider = %name,
                key = %redact_key(&api_key),
                "Loaded provider credential"
            );
            let provider: Arc<dyn Provider> = match descriptor.kind {
                ProviderKind::Gemini => Arc::new(GeminiProvider::new(name, api_key, descriptor)),
                ProviderKind::Groq => Arc::new(GroqProvider::new(name, api_key, descriptor)),
                ProviderKind::HuggingFace => {
                    Arc::new(HuggingFaceProvider::new(name, api_key, descriptor))
                }
            };
            registry.register(provider);
        }
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.values()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(ProviderError::InvalidCredential.kind(), "invalid_credential");
        assert_eq!(ProviderError::RateLimited.kind(), "upstream_rate_limited");
        assert_eq!(ProviderError::Timeout.kind(), "upstream_timeout");
        assert_eq!(
            ProviderError::Unavailable("503".into()).kind(),
            "upstream_unavailable"
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ProviderError::from_status(401, String::new()),
            ProviderError::InvalidCredential
        ));
        assert!(matches!(
            ProviderError::from_status(429, String::new()),
            ProviderError::RateLimited
        ));
        assert!(matches!(
            ProviderError::from_status(503, String::new()),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            ProviderError::from_status(418, String::new()),
            ProviderError::Other {
                status: Some(418),
                ..
            }
        ));
    }
}
