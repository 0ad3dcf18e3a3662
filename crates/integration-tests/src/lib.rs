//! Integration test harness for Tidecart.
//!
//! Provides a scratch origin server that can be taken down mid-test, plus
//! helpers for building a gateway over a throwaway cache directory.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tidecart-integration-tests
//! ```
//!
//! Tests are fully self-contained: every test spawns its own origin on an
//! ephemeral port and uses a unique cache/data directory under the system
//! temp dir.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::header;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use tokio::task::JoinHandle;
use url::Url;

use tidecart_gateway::GatewayConfig;

/// A disposable origin server the gateway and the offline layer talk to.
///
/// `shutdown` aborts the serve task, closing the listener, so later
/// requests to the same address are refused - the "network down" half of
/// every offline test.
pub struct ScratchOrigin {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ScratchOrigin {
    /// Spawn the origin on an ephemeral localhost port.
    pub async fn spawn() -> Self {
        let router = Router::new()
            .route(
                "/",
                get(|| async { Html("<html><body>Tidecart Home</body></html>") }),
            )
            .route(
                "/offline.html",
                get(|| async { Html("<html><body>offline shell page</body></html>") }),
            )
            .route(
                "/products/driftwood-candle",
                get(|| async { Html("<html><body>Driftwood Candle</body></html>") }),
            )
            .route(
                "/static/css/site.css",
                get(|| async { ([(header::CONTENT_TYPE, "text/css")], "body{margin:0}") }),
            )
            .route("/api/products", get(|| async { Json(products_payload()) }))
            .route("/api/account", get(|| async { Json(account_payload()) }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, handle }
    }

    /// Base URL of the origin.
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).unwrap()
    }

    /// Take the origin down; subsequent connections are refused.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for ScratchOrigin {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// The catalog the scratch origin serves from `/api/products`.
pub fn products_payload() -> serde_json::Value {
    serde_json::json!([
        {
            "id": "42",
            "handle": "driftwood-candle",
            "title": "Driftwood Candle",
            "price": { "amount": "24.50", "currency_code": "USD" }
        },
        {
            "id": "7",
            "handle": "kelp-soap",
            "title": "Kelp Soap",
            "price": { "amount": "9.00", "currency_code": "USD" }
        }
    ])
}

/// The user record the scratch origin serves from `/api/account`.
pub fn account_payload() -> serde_json::Value {
    serde_json::json!({
        "id": "u-1",
        "email": "shopper@example.com",
        "display_name": "Shopper"
    })
}

/// A unique throwaway directory under the system temp dir.
pub fn scratch_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tidecart-it-{label}-{}", uuid::Uuid::new_v4()))
}

/// Gateway configuration pointed at `origin` with a throwaway cache dir.
pub fn gateway_config(origin: Url) -> GatewayConfig {
    GatewayConfig {
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        origin_url: origin,
        api_prefix: "/api/".to_owned(),
        cache_dir: scratch_dir("cache"),
        cache_version: "v1".to_owned(),
        shell_manifest: vec![
            "/".to_owned(),
            "/offline.html".to_owned(),
            "/static/css/site.css".to_owned(),
        ],
        offline_document: "/offline.html".to_owned(),
        origin_key: None,
        sentry_dsn: None,
    }
}

/// An origin URL nothing listens on; connections are refused immediately.
pub fn dead_origin() -> Url {
    Url::parse("http://127.0.0.1:9/").unwrap()
}

/// Poll `check` until it returns true or the deadline passes.
pub async fn wait_for(description: &str, mut check: impl AsyncFnMut() -> bool) {
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for: {description}");
}
