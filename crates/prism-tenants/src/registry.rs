//! Tenant registry
//!
//! Maps API keys to tenants and owns per-tenant usage counters. Lookups
//! go through a reverse index built once at startup; counters sit behind
//! one mutex per tenant so tenants never contend with each other.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use prism_core::config::{redact_key, TenantConfig};
use prism_core::error::{GatewayError, GatewayResult};

/// Daily counters reset once this much time has passed since the last
/// reset.
fn daily_reset_after() -> ChronoDuration {
    ChronoDuration::hours(24)
}

/// Which quota a check refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    DailyRequests,
    MonthlyRequests,
}

impl QuotaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyRequests => "daily_requests",
            Self::MonthlyRequests => "monthly_requests",
        }
    }
}

/// Result of a quota check.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaCheck {
    pub allowed: bool,
    pub used: u64,
    /// u64::MAX when the tenant has no limit configured.
    pub limit: u64,
    pub remaining: u64,
}

/// In-memory usage counters. Lost on restart; a persistent store can be
/// substituted behind this registry without changing its contract.
#[derive(Debug, Clone, Serialize)]
pub struct TenantUsage {
    pub daily_requests: u64,
    pub monthly_requests: u64,
    pub total_tokens: u64,
    pub estimated_cost: f64,
    pub last_daily_reset: DateTime<Utc>,
}

impl TenantUsage {
    fn new() -> Self {
        Self {
            daily_requests: 0,
            monthly_requests: 0,
            total_tokens: 0,
            estimated_cost: 0.0,
            last_daily_reset: Utc::now(),
        }
    }

    fn maybe_reset_daily(&mut self, now: DateTime<Utc>) {
        if now - self.last_daily_reset >= daily_reset_after() {
            self.daily_requests = 0;
            self.last_daily_reset = now;
        }
    }
}

/// Usage recorded after a served request.
#[derive(Debug, Clone)]
pub struct UsageDelta {
    pub total_tokens: u64,
    pub duration_ms: u64,
    pub model: String,
    pub estimated_cost: f64,
}

struct TenantEntry {
    config: TenantConfig,
    usage: Mutex<TenantUsage>,
}

/// Shared handle to one tenant.
#[derive(Clone)]
pub struct TenantHandle {
    entry: Arc<TenantEntry>,
}

impl TenantHandle {
    pub fn tenant_id(&self) -> &str {
        &self.entry.config.tenant_id
    }

    pub fn config(&self) -> &TenantConfig {
        &self.entry.config
    }

    /// Read-only quota check. Reading a daily quota applies the daily
    /// reset rule first, so a stale counter never blocks a request.
    pub fn check_quota(&self, kind: QuotaKind) -> QuotaCheck {
        let mut usage = self.entry.usage.lock().expect("usage lock poisoned");
        let (used, limit) = match kind {
            QuotaKind::DailyRequests => {
                usage.maybe_reset_daily(Utc::now());
                (
                    usage.daily_requests,
                    self.entry.config.quotas.daily_requests,
                )
            }
            QuotaKind::MonthlyRequests => (
                usage.monthly_requests,
                self.entry.config.quotas.monthly_requests,
            ),
        };
        let limit = limit.unwrap_or(u64::MAX);
        QuotaCheck {
            allowed: used < limit,
            used,
            limit,
            remaining: limit.saturating_sub(used),
        }
    }

    /// Record a served request. Counters only move forward; resets
    /// happen on the read path.
    pub fn track_usage(&self, delta: &UsageDelta) {
        let mut usage = self.entry.usage.lock().expect("usage lock poisoned");
        usage.maybe_reset_daily(Utc::now());
        usage.daily_requests += 1;
        usage.monthly_requests += 1;
        usage.total_tokens += delta.total_tokens;
        usage.estimated_cost += delta.estimated_cost;
        debug!(
            tenant = %self.entry.config.tenant_id,
            tokens = delta.total_tokens,
            duration_ms = delta.duration_ms,
            model = %delta.model,
            "Usage tracked"
        );
    }

    pub fn usage_snapshot(&self) -> TenantUsage {
        self.entry.usage.lock().expect("usage lock poisoned").clone()
    }
}

/// All tenants, with a reverse index from API key to tenant.
pub struct TenantRegistry {
    by_key: HashMap<String, TenantHandle>,
    by_id: HashMap<String, TenantHandle>,
}

impl TenantRegistry {
    /// Build the registry and its key index. Duplicate API keys across
    /// tenants are a configuration error.
    pub fn from_config(tenants: &[TenantConfig]) -> GatewayResult<Self> {
        let mut by_key = HashMap::new();
        let mut by_id = HashMap::new();
        for config in tenants {
            let handle = TenantHandle {
                entry: Arc::new(TenantEntry {
                    config: config.clone(),
                    usage: Mutex::new(TenantUsage::new()),
                }),
            };
            if by_id
                .insert(config.tenant_id.clone(), handle.clone())
                .is_some()
            {
                return Err(GatewayError::Config(format!(
                    "duplicate tenant id: {}",
                    config.tenant_id
                )));
            }
            for key in &config.api_keys {
                if by_key.insert(key.clone(), handle.clone()).is_some() {
                    return Err(GatewayError::Config(format!(
                        "API key {} assigned to more than one tenant",
                        redact_key(key)
                    )));
                }
            }
        }
        Ok(Self { by_key, by_id })
    }

    /// Constant-time key lookup.
    pub fn find_by_api_key(&self, key: &str) -> Option<TenantHandle> {
        self.by_key.get(key).cloned()
    }

    pub fn get(&self, tenant_id: &str) -> Option<TenantHandle> {
        self.by_id.get(tenant_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
