//! API error rendering
//!
//! Every gateway error becomes the envelope `{error: {message, type,
//! details?}}` with the taxonomy's status code. Rate-limit rejections
//! additionally carry the `X-RateLimit-*` headers.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use prism_core::error::GatewayError;

/// Wrapper so gateway errors can be returned straight from handlers.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let details = match &self.0 {
            GatewayError::AllProvidersFailed {
                attempts,
                last_error,
            } => Some(json!({
                "attempts": attempts,
                "last_error": last_error,
            })),
            GatewayError::QuotaExceeded { kind, used, limit } => Some(json!({
                "quota": kind,
                "used": used,
                "limit": limit,
            })),
            _ => None,
        };

        let mut body = json!({
            "error": {
                "message": self.0.to_string(),
                "type": self.0.error_type(),
            }
        });
        if let Some(details) = details {
            body["error"]["details"] = details;
        }

        let mut response = (status, Json(body)).into_response();

        if let GatewayError::RateLimited { limit, reset_epoch } = &self.0 {
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
                headers.insert("X-RateLimit-Limit", value);
            }
            headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
            if let Ok(value) = HeaderValue::from_str(&reset_epoch.to_string()) {
                headers.insert("X-RateLimit-Reset", value);
            }
        }

        response
    }
}
