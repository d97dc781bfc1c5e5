//! Prism Tenants - Multi-tenancy for Prism Gateway
//!
//! This crate provides:
//! - API-key authentication over a precomputed reverse index
//! - Per-tenant quota accounting with daily reset
//! - Per-tenant fixed-window rate limiting

pub mod rate_limit;
pub mod registry;

pub use rate_limit::{RateDecision, RateLimiter};
pub use registry::{QuotaCheck, QuotaKind, TenantHandle, TenantRegistry, UsageDelta};
