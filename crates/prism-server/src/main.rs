//! Prism Gateway - Multi-tenant LLM API gateway
//!
//! An OpenAI-compatible gateway that routes chat completions across
//! multiple upstream providers with policy-based ordering, circuit
//! breaking, health-driven failover, and per-tenant quotas.

use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use prism_core::config::GatewayConfig;
use prism_server::{create_router, AppState};

/// How long in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // LOG_LEVEL takes tracing directives ("info", "prism_llm=debug,info").
    let filter = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse::<EnvFilter>().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("Starting Prism Gateway v{}", env!("CARGO_PKG_VERSION"));

    let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let config = GatewayConfig::load(&config_dir)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::new(config)?;
    if state.registry.is_empty() {
        warn!("No providers loaded; all chat requests will fail until configuration is fixed");
    }
    info!(
        providers = state.registry.len(),
        tenants = state.tenants.len(),
        "Gateway initialized"
    );

    let (prober, sweeper) = state.spawn_background();

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(prober))
        .await?;

    sweeper.abort();
    info!("Shutdown complete");
    Ok(())
}

/// Wait for SIGINT/SIGTERM, then stop the prober and arm the forced-exit
/// watchdog while axum drains in-flight requests.
async fn shutdown_signal(prober: prism_llm::prober::ProberHandle) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(
        grace_secs = SHUTDOWN_GRACE.as_secs(),
        "Shutdown signal received, draining in-flight requests"
    );
    prober.stop().await;

    tokio::spawn(async {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        warn!("Grace period expired, forcing exit");
        std::process::exit(0);
    });
}
