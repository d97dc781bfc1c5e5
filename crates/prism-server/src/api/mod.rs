//! API routes

pub mod chat;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

/// Request body limit: 10 MB.
const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Create the main API router.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/models", get(chat::list_models))
        .route("/v1/health/providers", get(health::provider_health))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/detailed", get(health::health_detailed))
        .route("/metrics", get(health::metrics))
        .merge(protected)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}
