//! Rolling health tracking per provider
//!
//! Every in-line request outcome and every probe result lands here as a
//! sample. Aggregates (uptime, average latency) are computed over the
//! trailing window and feed the policy engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::{info, warn};

/// Ring buffer capacity per provider.
pub const HISTORY_CAP: usize = 100;

/// Trailing samples considered for aggregates.
pub const AGGREGATE_WINDOW: usize = 20;

/// Latency recorded for unhealthy samples.
pub const UNHEALTHY_LATENCY_MS: u64 = 999_999;

/// Average latency assumed when no healthy samples exist yet.
pub const FALLBACK_LATENCY_MS: f64 = 200.0;

/// Consecutive failures that trigger a degradation warning.
const DEGRADED_AFTER: u32 = 3;

/// Sample status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// One observation of a provider, from a request or a probe.
#[derive(Debug, Clone)]
pub struct HealthSample {
    pub at: DateTime<Utc>,
    pub status: HealthStatus,
    pub latency_ms: u64,
    pub error_kind: Option<&'static str>,
}

impl HealthSample {
    pub fn healthy(latency_ms: u64) -> Self {
        Self {
            at: Utc::now(),
            status: HealthStatus::Healthy,
            latency_ms,
            error_kind: None,
        }
    }

    pub fn unhealthy(error_kind: &'static str) -> Self {
        Self {
            at: Utc::now(),
            status: HealthStatus::Unhealthy,
            latency_ms: UNHEALTHY_LATENCY_MS,
            error_kind: Some(error_kind),
        }
    }
}

/// Derived metrics for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct HealthAggregate {
    /// Fraction of healthy samples in the trailing window, in [0, 1].
    /// 1.0 when no samples exist yet.
    pub uptime: f64,
    /// Mean latency of healthy samples in the trailing window, ms.
    pub avg_latency_ms: f64,
    pub consecutive_failures: u32,
    pub sample_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
}

impl Default for HealthAggregate {
    fn default() -> Self {
        Self {
            uptime: 1.0,
            avg_latency_ms: FALLBACK_LATENCY_MS,
            consecutive_failures: 0,
            sample_count: 0,
            last_check: None,
        }
    }
}

struct ProviderHealth {
    samples: VecDeque<HealthSample>,
    consecutive_failures: u32,
}

impl ProviderHealth {
    fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(HISTORY_CAP),
            consecutive_failures: 0,
        }
    }

    fn push(&mut self, sample: HealthSample) {
        if self.samples.len() == HISTORY_CAP {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    fn aggregate(&self) -> HealthAggregate {
        if self.samples.is_empty() {
            return HealthAggregate {
                consecutive_failures: self.consecutive_failures,
                ..HealthAggregate::default()
            };
        }

        let window_start = self.samples.len().saturating_sub(AGGREGATE_WINDOW);
        let window: Vec<&HealthSample> = self.samples.iter().skip(window_start).collect();

        let healthy: Vec<&&HealthSample> = window
            .iter()
            .filter(|s| s.status == HealthStatus::Healthy)
            .collect();
        let uptime = healthy.len() as f64 / window.len() as f64;

        let avg_latency_ms = if healthy.is_empty() {
            FALLBACK_LATENCY_MS
        } else {
            healthy.iter().map(|s| s.latency_ms as f64).sum::<f64>() / healthy.len() as f64
        };

        HealthAggregate {
            uptime,
            avg_latency_ms,
            consecutive_failures: self.consecutive_failures,
            sample_count: self.samples.len(),
            last_check: self.samples.back().map(|s| s.at),
        }
    }
}

/// Health history for all configured providers. One mutex per provider;
/// the outer map is immutable after construction.
pub struct HealthTracker {
    providers: HashMap<String, Mutex<ProviderHealth>>,
}

impl HealthTracker {
    pub fn new(provider_names: impl IntoIterator<Item = String>) -> Self {
        let providers = provider_names
            .into_iter()
            .map(|name| (name, Mutex::new(ProviderHealth::new())))
            .collect();
        Self { providers }
    }

    /// Record one observation. Samples for unconfigured providers are
    /// dropped.
    pub fn record(&self, provider: &str, sample: HealthSample) {
        let Some(entry) = self.providers.get(provider) else {
            return;
        };
        let mut health = entry.lock().expect("health lock poisoned");
        match sample.status {
            HealthStatus::Healthy => {
                if health.consecutive_failures > 0 {
                    info!(
                        provider = %provider,
                        after_failures = health.consecutive_failures,
                        "Provider recovered"
                    );
                }
                health.consecutive_failures = 0;
            }
            HealthStatus::Unhealthy => {
                health.consecutive_failures += 1;
                if health.consecutive_failures == DEGRADED_AFTER {
                    warn!(
                        provider = %provider,
                        failures = health.consecutive_failures,
                        error = sample.error_kind.unwrap_or("unknown"),
                        "Provider degraded"
                    );
                }
            }
        }
        health.push(sample);
    }

    /// Aggregate for one provider; defaults (uptime 1.0) when unknown or
    /// empty.
    pub fn aggregate(&self, provider: &str) -> HealthAggregate {
        self.providers
            .get(provider)
            .map(|entry| entry.lock().expect("health lock poisoned").aggregate())
            .unwrap_or_default()
    }

    /// Copy of all aggregates; no lock is held by the caller afterwards.
    pub fn snapshot(&self) -> HashMap<String, HealthAggregate> {
        self.providers
            .iter()
            .map(|(name, entry)| {
                let aggregate = entry.lock().expect("health lock poisoned").aggregate();
                (name.clone(), aggregate)
            })
            .collect()
    }
}
