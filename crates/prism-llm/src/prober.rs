//! Periodic health prober
//!
//! Background task that pings every loaded provider at a fixed cadence
//! and feeds the results into the health tracker. Probes run serially;
//! they share nothing with in-flight requests except the tracker itself.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::health::{HealthSample, HealthTracker};
use crate::provider::ProviderRegistry;

/// Default probe cadence.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(300);

/// Deadline for a single probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Periodic health prober. Start with [`HealthProber::spawn`], stop with
/// [`ProberHandle::stop`].
pub struct HealthProber {
    registry: Arc<ProviderRegistry>,
    health: Arc<HealthTracker>,
    interval: Duration,
    probe_timeout: Duration,
}

impl HealthProber {
    pub fn new(registry: Arc<ProviderRegistry>, health: Arc<HealthTracker>) -> Self {
        Self {
            registry,
            health,
            interval: DEFAULT_PROBE_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Spawn the probe loop onto the runtime.
    pub fn spawn(self) -> ProberHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                providers = self.registry.len(),
                "Health prober started"
            );
            let mut ticker = tokio::time::interval(self.interval);
            // The first tick fires immediately, seeding health history
            // before any traffic arrives.
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.probe_all().await,
                    _ = shutdown_rx.changed() => {
                        info!("Health prober stopped");
                        return;
                    }
                }
            }
        });
        ProberHandle {
            handle,
            shutdown: shutdown_tx,
        }
    }

    async fn probe_all(&self) {
        for provider in self.registry.all() {
            let name = provider.name().to_string();
            let outcome =
                tokio::time::timeout(self.probe_timeout, provider.ping()).await;
            let sample = match outcome {
                Ok(Ok(latency_ms)) => {
                    debug!(provider = %name, latency_ms, "Probe ok");
                    HealthSample::healthy(latency_ms)
                }
                Ok(Err(e)) => {
                    warn!(provider = %name, error = %e, "Probe failed");
                    HealthSample::unhealthy(e.kind())
                }
                Err(_) => {
                    warn!(provider = %name, "Probe timed out");
                    HealthSample::unhealthy("upstream_timeout")
                }
            };
            self.health.record(&name, sample);
        }
    }
}

/// Handle to a running prober.
pub struct ProberHandle {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl ProberHandle {
    /// Signal the loop to exit and wait for it.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
