//! Unified error handling with Sentry integration.
//!
//! `GatewayError` only ever reaches a client on the API pass-through path;
//! navigation and resource requests resolve to substitutes instead. It still
//! routes unexpected failures to Sentry before the degraded response goes
//! out.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application-level error type for the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The origin refused or dropped a request. Expected and transient.
    #[error("origin request failed: {0}")]
    Origin(#[from] reqwest::Error),

    /// Cache storage failed (quota, permissions, corrupt disk).
    #[error("cache storage error: {0}")]
    CacheStorage(#[from] std::io::Error),

    /// Internal invariant broke.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        // Origin failures are the normal offline case; only capture the rest.
        if matches!(self, Self::CacheStorage(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Gateway error"
            );
        } else {
            tracing::warn!(error = %self, "Origin unreachable");
        }

        let status = match &self {
            Self::Origin(_) => StatusCode::BAD_GATEWAY,
            Self::CacheStorage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Origin(_) => "Origin unreachable",
            Self::CacheStorage(_) | Self::Internal(_) => "Internal server error",
        };

        (status, message).into_response()
    }
}

/// Result type alias for `GatewayError`.
pub type Result<T> = std::result::Result<T, GatewayError>;
