//! Tidecart Gateway library.
//!
//! The network-boundary cache tier: a reverse-proxy process in front of the
//! origin application server. It keeps the storefront shell and static
//! resources servable while the origin is unreachable, and passes API
//! traffic through untouched so the page-level offline layer stays the
//! single owner of API truth.
//!
//! Exposed as a library so the router can be exercised end-to-end in tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod buckets;
pub mod config;
pub mod error;
pub mod install;
pub mod middleware;
pub mod policy;
pub mod proxy;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

pub use config::GatewayConfig;
pub use state::AppState;

/// Build the gateway router over the given state.
#[must_use]
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .fallback(proxy::dispatch)
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the gateway is running. Does not check the origin.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies origin reachability before returning OK.
/// Returns 503 Service Unavailable if the origin is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let origin = state.config().origin_url.clone();
    match state.http().head(origin).send().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
