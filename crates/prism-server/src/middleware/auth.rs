//! Authentication middleware
//!
//! Resolves `Authorization: Bearer <key>` to a tenant through the
//! registry's reverse index and stashes the handle in request
//! extensions. Keys are never logged in full.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use prism_core::config::redact_key;
use prism_core::error::GatewayError;
use prism_tenants::registry::TenantHandle;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated tenant, available to downstream handlers.
#[derive(Clone)]
pub struct AuthedTenant(pub TenantHandle);

/// Reject requests without a resolvable bearer key.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(key) = bearer else {
        return Err(GatewayError::Authentication(
            "missing or malformed Authorization header".into(),
        )
        .into());
    };

    let Some(tenant) = state.tenants.find_by_api_key(key) else {
        warn!(key = %redact_key(key), "Rejected unknown API key");
        return Err(GatewayError::Authentication("unknown API key".into()).into());
    };

    request.extensions_mut().insert(AuthedTenant(tenant));
    Ok(next.run(request).await)
}
