//! Health and metrics endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::collections::HashMap;

use prism_llm::breaker::BreakerSnapshot;
use prism_llm::health::HealthAggregate;

use crate::state::AppState;

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers: state.registry.len(),
    })
}

/// GET /health/detailed
///
/// Readiness: 503 until at least one provider is loaded and its breaker
/// admits traffic.
pub async fn health_detailed(
    State(state): State<AppState>,
) -> (StatusCode, Json<DetailedHealthResponse>) {
    let breakers = state.breakers.snapshot_all();
    let health = state.health.snapshot();

    let providers: HashMap<String, ProviderSummary> = state
        .registry
        .names()
        .into_iter()
        .map(|name| {
            let aggregate = health.get(&name).cloned().unwrap_or_default();
            let available = state.breakers.is_available(&name);
            (
                name,
                ProviderSummary {
                    available,
                    uptime: aggregate.uptime,
                    avg_latency_ms: aggregate.avg_latency_ms,
                    consecutive_failures: aggregate.consecutive_failures,
                },
            )
        })
        .collect();

    let ready = providers.values().any(|p| p.available);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(DetailedHealthResponse {
            status: if ready { "ready" } else { "degraded" }.to_string(),
            providers,
            circuit_breakers: breakers,
        }),
    )
}

/// GET /v1/health/providers
///
/// Authenticated full dump of health aggregates and breaker internals.
pub async fn provider_health(State(state): State<AppState>) -> Json<ProviderHealthResponse> {
    Json(ProviderHealthResponse {
        providers: state.health.snapshot(),
        circuit_breakers: state.breakers.snapshot_all(),
    })
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render(&state.breakers, &state.health)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub providers: usize,
}

#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub providers: HashMap<String, ProviderSummary>,
    pub circuit_breakers: HashMap<String, BreakerSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct ProviderSummary {
    pub available: bool,
    pub uptime: f64,
    pub avg_latency_ms: f64,
    pub consecutive_failures: u32,
}

#[derive(Debug, Serialize)]
pub struct ProviderHealthResponse {
    pub providers: HashMap<String, HealthAggregate>,
    pub circuit_breakers: HashMap<String, BreakerSnapshot>,
}
