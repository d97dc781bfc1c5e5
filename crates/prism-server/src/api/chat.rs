//! Chat completion API

use axum::{body::Bytes, extract::State, Extension, Json};
use serde::Serialize;
use std::time::Instant;
use tracing::warn;

use prism_core::error::GatewayError;
use prism_core::llm::{ChatCompletionRequest, ChatCompletionResponse};
use prism_llm::router::{RouteContext, RouteError};
use prism_tenants::registry::{QuotaKind, UsageDelta};

use crate::error::ApiError;
use crate::middleware::auth::AuthedTenant;
use crate::state::AppState;

/// POST /v1/chat/completions
pub async fn chat_completions(
    State(state): State<AppState>,
    Extension(AuthedTenant(tenant)): Extension<AuthedTenant>,
    body: Bytes,
) -> Result<Json<ChatCompletionResponse>, ApiError> {
    let started = Instant::now();
    state.metrics.record_request();

    let request: ChatCompletionRequest = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::Validation(format!("invalid request body: {e}")))?;
    request.validate()?;

    if request.stream == Some(true) {
        warn!(
            tenant = %tenant.tenant_id(),
            "Streaming requested but not supported; returning a single completion"
        );
    }

    let decision = state.rate_limiter.check(
        tenant.tenant_id(),
        tenant.config().quotas.rate_limit_per_minute,
    );
    if !decision.allowed {
        state.metrics.record_rate_limited();
        return Err(GatewayError::RateLimited {
            limit: decision.limit,
            reset_epoch: decision.reset_epoch,
        }
        .into());
    }

    for kind in [QuotaKind::DailyRequests, QuotaKind::MonthlyRequests] {
        let check = tenant.check_quota(kind);
        if !check.allowed {
            state.metrics.record_quota_exceeded();
            return Err(GatewayError::QuotaExceeded {
                kind: kind.as_str().to_string(),
                used: check.used,
                limit: check.limit,
            }
            .into());
        }
    }

    let ctx = RouteContext {
        tenant_id: tenant.tenant_id().to_string(),
        allowed_providers: tenant.config().allowed_providers.clone(),
        policy: tenant.config().routing_policy,
    };

    let mut response = state.router.route(&request, &ctx).await.map_err(|err| {
        state.metrics.record_outcome(false);
        match err {
            RouteError::NoProvidersAvailable => GatewayError::NoProvidersAvailable,
            RouteError::AllProvidersFailed {
                attempts,
                last_error_kind,
            } => {
                state.metrics.record_attempts(&attempts);
                GatewayError::AllProvidersFailed {
                    attempts,
                    last_error: last_error_kind.to_string(),
                }
            }
        }
    })?;

    if let Some(meta) = response.routing_metadata.as_mut() {
        meta.api_processing_time = started.elapsed().as_millis() as u64;
        state.metrics.record_attempts(&meta.attempts);

        let cost_per_token = state
            .registry
            .get(&meta.primary_provider)
            .map(|p| p.cost_per_token())
            .unwrap_or_default();
        tenant.track_usage(&UsageDelta {
            total_tokens: response.usage.total_tokens as u64,
            duration_ms: meta.total_processing_time,
            model: response.model.clone(),
            estimated_cost: response.usage.total_tokens as f64 * cost_per_token,
        });
    }
    state.metrics.record_outcome(true);

    Ok(Json(response))
}

/// GET /v1/models
///
/// Lists the providers the authenticated tenant can reach, in the
/// OpenAI model-list shape.
pub async fn list_models(
    State(state): State<AppState>,
    Extension(AuthedTenant(tenant)): Extension<AuthedTenant>,
) -> Json<ModelsResponse> {
    let models: Vec<ModelInfo> = tenant
        .config()
        .allowed_providers
        .iter()
        .filter(|name| state.registry.contains(name))
        .map(|name| ModelInfo {
            id: name.clone(),
            object: "model".to_string(),
            owned_by: "prism-gateway".to_string(),
        })
        .collect();

    Json(ModelsResponse {
        object: "list".to_string(),
        data: models,
    })
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub owned_by: String,
}
