//! Per-tenant fixed-window rate limiting
//!
//! One counter per tenant per window. The decision carries the limit,
//! remaining budget, and window reset time so the HTTP layer can emit
//! `X-RateLimit-*` headers. A periodic sweep evicts expired entries to
//! bound memory.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Requests per window for tenants with no configured limit.
pub const DEFAULT_LIMIT: u32 = 100;

/// Sweep cadence, in windows.
const SWEEP_EVERY_WINDOWS: u32 = 5;

/// Outcome of a rate check, with everything needed for response headers.
#[derive(Debug, Clone)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch seconds at which the current window resets.
    pub reset_epoch: u64,
}

struct WindowEntry {
    count: u32,
    window_start: Instant,
}

/// Fixed-window counter keyed by tenant id.
pub struct RateLimiter {
    window: Duration,
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request against the tenant's window. `limit` comes from
    /// the tenant's quotas, falling back to [`DEFAULT_LIMIT`].
    pub fn check(&self, tenant_id: &str, limit: Option<u32>) -> RateDecision {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("rate limiter lock poisoned");
        let entry = entries
            .entry(tenant_id.to_string())
            .or_insert_with(|| WindowEntry {
                count: 0,
                window_start: now,
            });

        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        let elapsed = now.duration_since(entry.window_start);
        let reset_epoch =
            Utc::now().timestamp() as u64 + (self.window - elapsed).as_secs().max(1);

        if entry.count >= limit {
            return RateDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_epoch,
            };
        }

        entry.count += 1;
        RateDecision {
            allowed: true,
            limit,
            remaining: limit - entry.count,
            reset_epoch,
        }
    }

    /// Drop entries whose window has fully expired.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("rate limiter lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.window_start) < self.window);
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "Rate limiter sweep");
        }
    }

    /// Spawn the periodic sweep loop.
    pub fn spawn_sweeper(limiter: Arc<Self>) -> JoinHandle<()> {
        let interval = limiter.window * SWEEP_EVERY_WINDOWS;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // skip the immediate first tick
            loop {
                ticker.tick().await;
                limiter.sweep();
            }
        })
    }

    #[cfg(test)]
    fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
