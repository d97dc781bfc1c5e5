//! Request counters and Prometheus exposition
//!
//! Counters are plain atomics owned by the application state; the
//! `/metrics` endpoint renders them together with per-provider health
//! and breaker gauges read at scrape time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use prism_core::llm::{AttemptRecord, AttemptStatus};
use prism_llm::breaker::{BreakerSet, BreakerState};
use prism_llm::health::HealthTracker;

#[derive(Default)]
struct ProviderCounters {
    attempts: u64,
    failures: u64,
}

/// Gateway-wide counters.
#[derive(Default)]
pub struct Metrics {
    requests_total: AtomicU64,
    responses_success: AtomicU64,
    responses_error: AtomicU64,
    rate_limited_total: AtomicU64,
    quota_exceeded_total: AtomicU64,
    providers: Mutex<HashMap<String, ProviderCounters>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, success: bool) {
        if success {
            self.responses_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.responses_error.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_quota_exceeded(&self) {
        self.quota_exceeded_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_attempts(&self, attempts: &[AttemptRecord]) {
        let mut providers = self.providers.lock().expect("metrics lock poisoned");
        for attempt in attempts {
            let counters = providers.entry(attempt.provider.clone()).or_default();
            counters.attempts += 1;
            if attempt.status == AttemptStatus::Failed {
                counters.failures += 1;
            }
        }
    }

    /// Prometheus exposition text.
    pub fn render(&self, breakers: &BreakerSet, health: &HealthTracker) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "# HELP gateway_requests_total Chat requests received\n\
             # TYPE gateway_requests_total counter\n\
             gateway_requests_total {}\n\n",
            self.requests_total.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "# HELP gateway_responses_total Chat responses by outcome\n\
             # TYPE gateway_responses_total counter\n\
             gateway_responses_total{{outcome=\"success\"}} {}\n\
             gateway_responses_total{{outcome=\"error\"}} {}\n\n",
            self.responses_success.load(Ordering::Relaxed),
            self.responses_error.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "# HELP gateway_rate_limited_total Requests rejected by the rate limiter\n\
             # TYPE gateway_rate_limited_total counter\n\
             gateway_rate_limited_total {}\n\n",
            self.rate_limited_total.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "# HELP gateway_quota_exceeded_total Requests rejected by quota checks\n\
             # TYPE gateway_quota_exceeded_total counter\n\
             gateway_quota_exceeded_total {}\n\n",
            self.quota_exceeded_total.load(Ordering::Relaxed)
        ));

        out.push_str(
            "# HELP gateway_provider_attempts_total Outbound attempts per provider\n\
             # TYPE gateway_provider_attempts_total counter\n",
        );
        {
            let providers = self.providers.lock().expect("metrics lock poisoned");
            let mut names: Vec<&String> = providers.keys().collect();
            names.sort();
            for name in names {
                let counters = &providers[name];
                out.push_str(&format!(
                    "gateway_provider_attempts_total{{provider=\"{name}\",status=\"success\"}} {}\n\
                     gateway_provider_attempts_total{{provider=\"{name}\",status=\"failed\"}} {}\n",
                    counters.attempts - counters.failures,
                    counters.failures
                ));
            }
        }
        out.push('\n');

        out.push_str(
            "# HELP gateway_provider_uptime Rolling uptime per provider\n\
             # TYPE gateway_provider_uptime gauge\n",
        );
        let snapshot = health.snapshot();
        let mut names: Vec<&String> = snapshot.keys().collect();
        names.sort();
        for name in &names {
            out.push_str(&format!(
                "gateway_provider_uptime{{provider=\"{name}\"}} {:.3}\n",
                snapshot[*name].uptime
            ));
        }
        out.push('\n');

        out.push_str(
            "# HELP gateway_breaker_open Whether the provider's circuit breaker blocks calls\n\
             # TYPE gateway_breaker_open gauge\n",
        );
        let breaker_states = breakers.snapshot_all();
        let mut names: Vec<&String> = breaker_states.keys().collect();
        names.sort();
        for name in names {
            let open = matches!(breaker_states[name].state, BreakerState::Open);
            out.push_str(&format!(
                "gateway_breaker_open{{provider=\"{name}\"}} {}\n",
                open as u8
            ));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counters() {
        let metrics = Metrics::new();
        metrics.record_request();
        metrics.record_outcome(true);
        metrics.record_attempts(&[
            AttemptRecord::failed("gemini", 10, "upstream_timeout"),
            AttemptRecord::success("groq", 20),
        ]);

        let breakers = BreakerSet::new(vec!["gemini".to_string(), "groq".to_string()]);
        let health = HealthTracker::new(vec!["gemini".to_string(), "groq".to_string()]);
        let text = metrics.render(&breakers, &health);

        assert!(text.contains("gateway_requests_total 1"));
        assert!(text.contains("gateway_responses_total{outcome=\"success\"} 1"));
        assert!(text
            .contains("gateway_provider_attempts_total{provider=\"gemini\",status=\"failed\"} 1"));
        assert!(text.contains("gateway_breaker_open{provider=\"groq\"} 0"));
    }
}
