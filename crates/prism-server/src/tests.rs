//! End-to-end scenarios against the assembled router, with stub
//! providers standing in for upstreams. No network involved.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use prism_core::config::{
    GatewayConfig, PolicyName, PolicyParams, PolicySettings, TenantConfig, TenantQuotas,
};
use prism_core::llm::{
    ChatChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Usage,
};
use prism_llm::provider::{Provider, ProviderError, ProviderRegistry, ProviderResult};

use crate::api::create_router;
use crate::state::AppState;

#[derive(Clone, Copy)]
enum StubBehavior {
    Succeed,
    RateLimited,
    Other,
}

struct StubProvider {
    name: String,
    behavior: StubBehavior,
    cost: f64,
}

#[async_trait]
impl Provider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn cost_per_token(&self) -> f64 {
        self.cost
    }

    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<ChatCompletionResponse> {
        match self.behavior {
            StubBehavior::Succeed => Ok(ChatCompletionResponse {
                id: format!("chatcmpl-{}", self.name),
                object: "chat.completion".to_string(),
                created: chrono::Utc::now().timestamp(),
                model: request.model.clone(),
                choices: vec![ChatChoice {
                    index: 0,
                    message: ChatMessage::assistant("Hello! How can I help?"),
                    finish_reason: Some("stop".to_string()),
                }],
                usage: Usage::new(3, 4),
                routing_metadata: None,
            }),
            StubBehavior::RateLimited => Err(ProviderError::RateLimited),
            StubBehavior::Other => Err(ProviderError::Other {
                status: Some(500),
                message: "synthetic failure".to_string(),
            }),
        }
    }

    async fn ping(&self) -> ProviderResult<u64> {
        Ok(1)
    }
}

fn tenant(allowed: &[&str], policy: PolicyName, daily: Option<u64>) -> TenantConfig {
    TenantConfig {
        tenant_id: "demo".to_string(),
        api_keys: vec!["ak-demo123".to_string()],
        allowed_providers: allowed.iter().map(|s| s.to_string()).collect(),
        routing_policy: policy,
        quotas: TenantQuotas {
            daily_requests: daily,
            monthly_requests: None,
            rate_limit_per_minute: Some(1000),
        },
    }
}

fn build_state(
    providers: Vec<(&str, StubBehavior, f64)>,
    tenant: TenantConfig,
) -> AppState {
    build_state_with_policies(providers, tenant, PolicySettings::default())
}

fn build_state_with_policies(
    providers: Vec<(&str, StubBehavior, f64)>,
    tenant: TenantConfig,
    policies: PolicySettings,
) -> AppState {
    let mut registry = ProviderRegistry::new();
    for (name, behavior, cost) in providers {
        registry.register(Arc::new(StubProvider {
            name: name.to_string(),
            behavior,
            cost,
        }));
    }
    let config = GatewayConfig {
        tenants: vec![tenant],
        policies,
        ..GatewayConfig::default()
    };
    AppState::from_parts(config, Arc::new(registry)).expect("state builds")
}

fn chat_request(key: Option<&str>) -> Request<Body> {
    let body = json!({
        "model": "gpt-3.5-turbo",
        "messages": [{"role": "user", "content": "Hello"}],
    });
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_happy_path() {
    let state = build_state(
        vec![
            ("alpha", StubBehavior::Succeed, 0.002),
            ("beta", StubBehavior::Succeed, 0.002),
        ],
        tenant(&["alpha", "beta"], PolicyName::Balanced, None),
    );
    let app = create_router(state);

    let response = app.oneshot(chat_request(Some("ak-demo123"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["usage"]["total_tokens"], 7);

    let attempts = body["routing_metadata"]["attempts"].as_array().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["status"], "success");
    assert_eq!(
        body["routing_metadata"]["primary_provider"],
        attempts[0]["provider"]
    );
    assert_eq!(body["routing_metadata"]["tenant_id"], "demo");
}

#[tokio::test]
async fn test_failover_records_both_attempts() {
    let state = build_state(
        vec![
            // Cost-optimized puts the cheap failing provider first.
            ("cheap", StubBehavior::RateLimited, 0.0001),
            ("backup", StubBehavior::Succeed, 0.002),
        ],
        tenant(&["cheap", "backup"], PolicyName::CostOptimized, None),
    );
    let app = create_router(state.clone());

    let response = app.oneshot(chat_request(Some("ak-demo123"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let attempts = body["routing_metadata"]["attempts"].as_array().unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0]["provider"], "cheap");
    assert_eq!(attempts[0]["status"], "failed");
    assert_eq!(attempts[0]["error"], "upstream_rate_limited");
    assert_eq!(attempts[1]["provider"], "backup");
    assert_eq!(attempts[1]["status"], "success");

    let snapshot = state.breakers.get("cheap").unwrap().snapshot();
    assert_eq!(snapshot.failure_count, 1);
}

#[tokio::test]
async fn test_breaker_opens_and_filters_provider() {
    // No uptime floor for this tenant's policy, so the cheap failing
    // provider stays first in the order until its breaker opens.
    let policies = PolicySettings {
        cost_optimized: PolicyParams {
            min_uptime: 0.0,
            ..PolicyParams::default()
        },
        ..PolicySettings::default()
    };
    let state = build_state_with_policies(
        vec![
            ("cheap", StubBehavior::RateLimited, 0.0001),
            ("backup", StubBehavior::Succeed, 0.002),
        ],
        tenant(&["cheap", "backup"], PolicyName::CostOptimized, None),
        policies,
    );
    let app = create_router(state.clone());

    // Five requests fail over from cheap each time, tripping its breaker.
    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(chat_request(Some("ak-demo123")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(chat_request(Some("ak-demo123")))
        .await
        .unwrap();
    let body = body_json(response).await;
    let attempts = body["routing_metadata"]["attempts"].as_array().unwrap();
    assert_eq!(attempts[0]["provider"], "backup");
    assert_eq!(attempts.len(), 1);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/health/providers")
                .header(header::AUTHORIZATION, "Bearer ak-demo123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["circuit_breakers"]["cheap"]["state"], "open");
}

#[tokio::test]
async fn test_all_providers_failed_is_502() {
    let state = build_state(
        vec![("only", StubBehavior::Other, 0.002)],
        tenant(&["only"], PolicyName::Balanced, None),
    );
    let app = create_router(state.clone());

    let response = app.oneshot(chat_request(Some("ak-demo123"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "all_providers_failed");
    let attempts = body["error"]["details"]["attempts"].as_array().unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(body.get("choices").is_none());

    let snapshot = state.breakers.get("only").unwrap().snapshot();
    assert_eq!(snapshot.failure_count, 1);
}

#[tokio::test]
async fn test_missing_auth_is_401_and_touches_nothing() {
    let state = build_state(
        vec![("alpha", StubBehavior::Succeed, 0.002)],
        tenant(&["alpha"], PolicyName::Balanced, None),
    );
    let app = create_router(state.clone());

    let response = app.clone().oneshot(chat_request(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "authentication_error");

    let response = app.oneshot(chat_request(Some("ak-wrong"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let snapshot = state.breakers.get("alpha").unwrap().snapshot();
    assert_eq!(snapshot.failure_count, 0);
    assert_eq!(state.health.aggregate("alpha").sample_count, 0);
}

#[tokio::test]
async fn test_quota_blocks_third_request_without_counting_it() {
    let state = build_state(
        vec![("alpha", StubBehavior::Succeed, 0.002)],
        tenant(&["alpha"], PolicyName::Balanced, Some(2)),
    );
    let app = create_router(state.clone());

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(chat_request(Some("ak-demo123")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(chat_request(Some("ak-demo123"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "quota_exceeded");

    let usage = state.tenants.get("demo").unwrap().usage_snapshot();
    assert_eq!(usage.daily_requests, 2);
    // Usage conservation: two successes at 7 tokens each.
    assert_eq!(usage.total_tokens, 14);
}

#[tokio::test]
async fn test_rate_limit_sets_headers() {
    let mut tenant = tenant(&["alpha"], PolicyName::Balanced, None);
    tenant.quotas.rate_limit_per_minute = Some(1);
    let state = build_state(vec![("alpha", StubBehavior::Succeed, 0.002)], tenant);
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(chat_request(Some("ak-demo123")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(chat_request(Some("ak-demo123"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["X-RateLimit-Limit"], "1");
    assert_eq!(response.headers()["X-RateLimit-Remaining"], "0");
    assert!(response.headers().contains_key("X-RateLimit-Reset"));

    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "rate_limited");
}

#[tokio::test]
async fn test_validation_error_envelope() {
    let state = build_state(
        vec![("alpha", StubBehavior::Succeed, 0.002)],
        tenant(&["alpha"], PolicyName::Balanced, None),
    );
    let app = create_router(state);

    let body = json!({
        "model": "gpt-3.5-turbo",
        "messages": [],
    });
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Bearer ak-demo123")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "validation_error");
}

#[tokio::test]
async fn test_no_providers_available_is_503() {
    let state = build_state(
        vec![("alpha", StubBehavior::Succeed, 0.002)],
        tenant(&["not-configured"], PolicyName::Balanced, None),
    );
    let app = create_router(state);

    let response = app.oneshot(chat_request(Some("ak-demo123"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "no_providers_available");
}

#[tokio::test]
async fn test_health_endpoints_are_public() {
    let state = build_state(
        vec![("alpha", StubBehavior::Succeed, 0.002)],
        tenant(&["alpha"], PolicyName::Balanced, None),
    );
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health/detailed")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
