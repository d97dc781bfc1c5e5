//! Prism LLM - Multi-provider routing core
//!
//! This crate provides:
//! - Provider abstraction over upstream LLM services
//! - Concrete adapters (Gemini, Groq, HuggingFace)
//! - Per-provider circuit breakers and rolling health tracking
//! - Policy-based provider ordering
//! - The failover router and the periodic health prober

pub mod breaker;
pub mod health;
pub mod policy;
pub mod prober;
pub mod provider;
pub mod providers;
pub mod router;

pub use breaker::{BreakerSet, BreakerState, CircuitBreaker};
pub use health::{HealthAggregate, HealthSample, HealthStatus, HealthTracker};
pub use prober::HealthProber;
pub use provider::{Provider, ProviderError, ProviderRegistry, ProviderResult};
pub use router::{RouteContext, RouteError, Router};
