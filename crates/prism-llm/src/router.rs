//! Router core
//!
//! Orchestrates one client request: filter candidates by tenant
//! allow-list and breaker state, order them via the policy engine, then
//! try each in sequence under a per-attempt deadline until one succeeds.
//! Every attempt outcome is reported to the breaker and the health
//! tracker exactly once, before the next attempt begins.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, instrument, warn};

use prism_core::config::{PolicyName, PolicySettings};
use prism_core::llm::{
    AttemptRecord, ChatCompletionRequest, ChatCompletionResponse, RoutingMetadata,
};

use crate::breaker::BreakerSet;
use crate::health::{HealthSample, HealthTracker};
use crate::policy::{order_providers, PolicyCandidate};
use crate::provider::{Provider, ProviderError, ProviderRegistry};

/// Router-level deadline per attempt, independent of the adapter's
/// internal timeout. Whichever fires first fails the attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-request routing input, resolved by the caller from the
/// authenticated tenant.
#[derive(Debug, Clone)]
pub struct RouteContext {
    pub tenant_id: String,
    /// Tenant's allowed provider names; unknown names are ignored.
    pub allowed_providers: Vec<String>,
    pub policy: PolicyName,
}

/// Terminal routing failures. Per-attempt errors are folded into
/// `AllProvidersFailed`.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no providers available")]
    NoProvidersAvailable,

    #[error("all {} providers failed, last error: {last_error_kind}", attempts.len())]
    AllProvidersFailed {
        attempts: Vec<AttemptRecord>,
        last_error_kind: &'static str,
    },
}

/// The failover router. Owns no provider state directly; breakers and
/// health history are shared with the prober and the health endpoints.
pub struct Router {
    registry: Arc<ProviderRegistry>,
    breakers: Arc<BreakerSet>,
    health: Arc<HealthTracker>,
    policies: PolicySettings,
    attempt_timeout: Duration,
}

impl Router {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        breakers: Arc<BreakerSet>,
        health: Arc<HealthTracker>,
        policies: PolicySettings,
    ) -> Self {
        Self {
            registry,
            breakers,
            health,
            policies,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Route one chat request for one tenant.
    #[instrument(skip(self, request), fields(tenant = %ctx.tenant_id, policy = ctx.policy.as_str()))]
    pub async fn route(
        &self,
        request: &ChatCompletionRequest,
        ctx: &RouteContext,
    ) -> Result<ChatCompletionResponse, RouteError> {
        let started = Instant::now();

        let candidates = self.candidates(ctx);
        if candidates.is_empty() {
            warn!(tenant = %ctx.tenant_id, "No providers available after filtering");
            return Err(RouteError::NoProvidersAvailable);
        }

        let ordered = self.order(&candidates, ctx.policy);
        info!(order = ?ordered, "Provider order resolved");

        let mut attempts: Vec<AttemptRecord> = Vec::with_capacity(ordered.len());
        let mut last_error_kind = "upstream_other";

        for name in &ordered {
            let Some(provider) = self.registry.get(name) else {
                continue;
            };

            let attempt_started = Instant::now();
            let outcome =
                tokio::time::timeout(self.attempt_timeout, provider.chat_completion(request))
                    .await;
            let duration_ms = attempt_started.elapsed().as_millis() as u64;

            let error = match outcome {
                Ok(Ok(mut response)) => {
                    self.breakers.record_success(name);
                    self.health
                        .record(name, HealthSample::healthy(duration_ms));
                    attempts.push(AttemptRecord::success(name.clone(), duration_ms));

                    info!(
                        provider = %name,
                        duration_ms,
                        attempt = attempts.len(),
                        "Request served"
                    );

                    response.routing_metadata = Some(RoutingMetadata {
                        primary_provider: name.clone(),
                        attempts,
                        total_processing_time: started.elapsed().as_millis() as u64,
                        policy_used: ctx.policy.as_str().to_string(),
                        api_processing_time: 0,
                        timestamp: Utc::now().to_rfc3339(),
                        tenant_id: ctx.tenant_id.clone(),
                    });
                    return Ok(response);
                }
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Timeout,
            };

            let kind = error.kind();
            self.breakers.record_failure(name);
            self.health.record(name, HealthSample::unhealthy(kind));
            attempts.push(AttemptRecord::failed(name.clone(), duration_ms, kind));
            last_error_kind = kind;

            warn!(
                provider = %name,
                error = %error,
                duration_ms,
                "Attempt failed, trying next provider"
            );
        }

        Err(RouteError::AllProvidersFailed {
            attempts,
            last_error_kind,
        })
    }

    /// Tenant allow-list intersected with loaded providers, filtered by
    /// breaker state. Duplicate allow-list entries collapse so no
    /// provider is ever tried twice in one request.
    fn candidates(&self, ctx: &RouteContext) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        ctx.allowed_providers
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .filter(|name| self.registry.contains(name))
            .filter(|name| self.breakers.is_available(name))
            .cloned()
            .collect()
    }

    /// Snapshot health, attach costs, and let the policy engine order.
    fn order(&self, candidates: &[String], policy: PolicyName) -> Vec<String> {
        let snapshot = self.health.snapshot();
        let inputs: Vec<PolicyCandidate> = candidates
            .iter()
            .map(|name| {
                let aggregate = snapshot.get(name).cloned().unwrap_or_default();
                let cost = self
                    .registry
                    .get(name)
                    .map(|p| p.cost_per_token())
                    .unwrap_or(crate::provider::DEFAULT_COST_PER_TOKEN);
                PolicyCandidate {
                    name: name.clone(),
                    uptime: aggregate.uptime,
                    avg_latency_ms: aggregate.avg_latency_ms,
                    cost_per_token: cost,
                }
            })
            .collect();
        order_providers(&inputs, policy, self.policies.params_for(policy))
    }
}
