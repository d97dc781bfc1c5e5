//! Per-provider circuit breakers
//!
//! Each provider gets a three-state machine (closed, open, half-open)
//! that short-circuits calls to a persistently failing upstream. The
//! router reports every call outcome exactly once; `is_available` is the
//! only accessor it uses to filter candidates.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Consecutive failures before the breaker opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// How long an open breaker blocks calls before permitting a probe.
pub const DEFAULT_COOL_DOWN: Duration = Duration::from_secs(60);

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
    next_attempt: Option<Instant>,
}

/// One circuit breaker, guarding a single provider.
///
/// State and `next_attempt` always change together under the mutex, so
/// readers may observe stale but never inconsistent state.
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    name: String,
    threshold: u32,
    cool_down: Duration,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, DEFAULT_FAILURE_THRESHOLD, DEFAULT_COOL_DOWN)
    }

    pub fn with_settings(name: impl Into<String>, threshold: u32, cool_down: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure: None,
                next_attempt: None,
            }),
            name: name.into(),
            threshold,
            cool_down,
        }
    }

    /// Whether a call may be made right now. An open breaker whose
    /// cool-down has elapsed flips to half-open and admits a probe.
    pub fn is_available(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let ready = inner
                    .next_attempt
                    .is_some_and(|at| Instant::now() >= at);
                if ready {
                    inner.state = BreakerState::HalfOpen;
                    inner.next_attempt = None;
                    info!(provider = %self.name, "Circuit breaker half-open, permitting probe");
                }
                ready
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state != BreakerState::Closed {
            info!(provider = %self.name, "Circuit breaker closed after successful call");
        }
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.next_attempt = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        let now = Instant::now();
        inner.last_failure = Some(now);
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.threshold {
                    inner.state = BreakerState::Open;
                    inner.next_attempt = Some(now + self.cool_down);
                    warn!(
                        provider = %self.name,
                        failures = inner.failure_count,
                        cool_down_secs = self.cool_down.as_secs(),
                        "Circuit breaker opened"
                    );
                }
            }
            BreakerState::HalfOpen => {
                inner.failure_count += 1;
                inner.state = BreakerState::Open;
                inner.next_attempt = Some(now + self.cool_down);
                warn!(provider = %self.name, "Circuit breaker re-opened after failed probe");
            }
            BreakerState::Open => {
                // Late failure report while already open; keep blocking.
                inner.failure_count += 1;
            }
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            seconds_until_retry: inner.next_attempt.map(|at| {
                at.saturating_duration_since(Instant::now()).as_secs()
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn failure_count(&self) -> u32 {
        self.inner.lock().unwrap().failure_count
    }
}

/// Point-in-time view of one breaker, for the health endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failure_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_until_retry: Option<u64>,
}

/// One breaker per configured provider. The map itself is immutable
/// after startup; only the per-provider inner state mutates.
pub struct BreakerSet {
    breakers: HashMap<String, CircuitBreaker>,
}

impl BreakerSet {
    pub fn new(provider_names: impl IntoIterator<Item = String>) -> Self {
        Self::with_settings(provider_names, DEFAULT_FAILURE_THRESHOLD, DEFAULT_COOL_DOWN)
    }

    pub fn with_settings(
        provider_names: impl IntoIterator<Item = String>,
        threshold: u32,
        cool_down: Duration,
    ) -> Self {
        let breakers = provider_names
            .into_iter()
            .map(|name| {
                let breaker = CircuitBreaker::with_settings(name.clone(), threshold, cool_down);
                (name, breaker)
            })
            .collect();
        Self { breakers }
    }

    pub fn get(&self, provider: &str) -> Option<&CircuitBreaker> {
        self.breakers.get(provider)
    }

    /// Unknown providers are treated as available; the registry lookup
    /// is the authority on existence.
    pub fn is_available(&self, provider: &str) -> bool {
        self.breakers.get(provider).is_none_or(|b| b.is_available())
    }

    pub fn record_success(&self, provider: &str) {
        if let Some(breaker) = self.breakers.get(provider) {
            breaker.record_success();
        }
    }

    pub fn record_failure(&self, provider: &str) {
        if let Some(breaker) = self.breakers.get(provider) {
            breaker.record_failure();
        }
    }

    pub fn snapshot_all(&self) -> HashMap<String, BreakerSnapshot> {
        self.breakers
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.snapshot()))
            .collect()
    }
}
