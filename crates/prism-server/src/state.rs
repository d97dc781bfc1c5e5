//! Application state
//!
//! One `AppState` owns every subsystem and is built once at startup.
//! Handlers receive it by clone; all contained subsystems are shared
//! behind `Arc`.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use prism_core::config::GatewayConfig;
use prism_core::error::GatewayResult;
use prism_llm::breaker::BreakerSet;
use prism_llm::health::HealthTracker;
use prism_llm::prober::{HealthProber, ProberHandle};
use prism_llm::provider::ProviderRegistry;
use prism_llm::router::Router;
use prism_tenants::rate_limit::RateLimiter;
use prism_tenants::registry::TenantRegistry;

use crate::metrics::Metrics;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<ProviderRegistry>,
    pub breakers: Arc<BreakerSet>,
    pub health: Arc<HealthTracker>,
    pub router: Arc<Router>,
    pub tenants: Arc<TenantRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Build all subsystems from configuration, instantiating provider
    /// adapters from descriptors and environment secrets.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let registry = Arc::new(ProviderRegistry::from_config(&config.providers));
        Self::from_parts(config, registry)
    }

    /// Wire subsystems around an existing provider registry. Used by
    /// tests to inject stub providers.
    pub fn from_parts(
        config: GatewayConfig,
        registry: Arc<ProviderRegistry>,
    ) -> GatewayResult<Self> {
        let names = registry.names();
        let breakers = Arc::new(BreakerSet::new(names.clone()));
        let health = Arc::new(HealthTracker::new(names));
        let router = Arc::new(Router::new(
            registry.clone(),
            breakers.clone(),
            health.clone(),
            config.policies.clone(),
        ));
        let tenants = Arc::new(TenantRegistry::from_config(&config.tenants)?);
        let rate_limiter = Arc::new(RateLimiter::new(Duration::from_millis(
            config.rate_limit_window_ms,
        )));

        Ok(Self {
            config: Arc::new(config),
            registry,
            breakers,
            health,
            router,
            tenants,
            rate_limiter,
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// Start the health prober and the rate-limiter sweeper.
    pub fn spawn_background(&self) -> (ProberHandle, JoinHandle<()>) {
        let prober = HealthProber::new(self.registry.clone(), self.health.clone())
            .with_interval(Duration::from_millis(self.config.health_check_interval_ms))
            .spawn();
        let sweeper = RateLimiter::spawn_sweeper(self.rate_limiter.clone());
        (prober, sweeper)
    }
}
