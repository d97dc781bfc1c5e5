//! Prism Server - HTTP API for Prism Gateway
//!
//! This crate provides:
//! - OpenAI-compatible chat completion endpoint with routing metadata
//! - Bearer-key authentication resolving tenants
//! - Health, readiness, and Prometheus metrics endpoints
//! - Application state wiring for all gateway subsystems

pub mod api;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod state;

pub use api::create_router;
pub use state::AppState;

#[cfg(test)]
mod tests;
