//! Gateway error taxonomy
//!
//! Every non-2xx response the gateway produces maps to exactly one of
//! these variants. The HTTP layer renders them into the error envelope
//! `{error: {message, type, details?}}`.

use thiserror::Error;

use crate::llm::AttemptRecord;

/// Main gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed request body or out-of-range parameter
    #[error("{0}")]
    Validation(String),

    /// Missing, malformed, or unknown API key
    #[error("{0}")]
    Authentication(String),

    /// Tenant rate window exceeded
    #[error("rate limit of {limit} requests per window exceeded")]
    RateLimited {
        limit: u32,
        /// Epoch seconds at which the current window resets
        reset_epoch: u64,
    },

    /// Daily or monthly quota exhausted
    #[error("{kind} quota exceeded: {used} of {limit}")]
    QuotaExceeded { kind: String, used: u64, limit: u64 },

    /// Candidate list empty after tenant/breaker filtering
    #[error("no providers available for this request")]
    NoProvidersAvailable,

    /// Every ordered provider failed
    #[error("all providers failed: {last_error}")]
    AllProvidersFailed {
        attempts: Vec<AttemptRecord>,
        last_error: String,
    },

    /// Configuration error (startup only)
    #[error("configuration error: {0}")]
    Config(String),

    /// Unexpected failure in the gateway itself
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Lowercased taxonomy kind, used as `error.type` in the envelope.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Authentication(_) => "authentication_error",
            Self::RateLimited { .. } => "rate_limited",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::NoProvidersAvailable => "no_providers_available",
            Self::AllProvidersFailed { .. } => "all_providers_failed",
            Self::Config(_) => "internal_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Authentication(_) => 401,
            Self::RateLimited { .. } | Self::QuotaExceeded { .. } => 429,
            Self::NoProvidersAvailable => 503,
            Self::AllProvidersFailed { .. } => 502,
            Self::Config(_) | Self::Internal(_) => 500,
        }
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
