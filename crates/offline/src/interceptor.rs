//! Offline interceptor: the decorator around the upstream API transport.
//!
//! Applied once at composition time. While offline it answers recognized
//! API reads from the snapshot and refuses the rest with a marked 503;
//! while online it delegates and seeds the snapshot from live responses.

use std::future::Future;

use serde_json::json;

use crate::context::OfflineContext;
use crate::events::OfflineEvent;
use crate::store::Slice;
use crate::transport::{ApiMethod, ApiRequest, ApiResponse, ApiTarget, ApiTransport, TransportError};

/// Marker header carried by every synthesized offline response.
pub const SERVED_OFFLINE_HEADER: &str = "x-served-offline";
/// Echo of the normalized target, for callers and tests distinguishing
/// synthesized from live responses.
pub const OFFLINE_TARGET_HEADER: &str = "x-offline-target";

/// Targets under this prefix belong to the API origin and are the only ones
/// the interceptor ever substitutes.
pub const DEFAULT_API_PREFIX: &str = "/api/";

/// Error from [`OfflineInterceptor::install`].
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// The context already has an installed interceptor; wrapping again
    /// would double-substitute.
    #[error("an offline interceptor is already installed for this context")]
    AlreadyInstalled,
}

/// Decorator around an [`ApiTransport`].
///
/// Implements `ApiTransport` itself, so the wrapped transport keeps the
/// exact shape of the original: request in, response-like value out,
/// whichever path served it.
#[derive(Debug)]
pub struct OfflineInterceptor<T> {
    inner: T,
    ctx: OfflineContext,
    api_prefix: String,
}

impl<T: ApiTransport> OfflineInterceptor<T> {
    /// Wrap `inner`, guarding against double installation on the same
    /// context.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::AlreadyInstalled`] if this context already
    /// installed an interceptor.
    pub fn install(inner: T, ctx: &OfflineContext) -> Result<Self, InstallError> {
        Self::install_with_prefix(inner, ctx, DEFAULT_API_PREFIX)
    }

    /// Wrap `inner` with a non-default API prefix.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::AlreadyInstalled`] if this context already
    /// installed an interceptor.
    pub fn install_with_prefix(
        inner: T,
        ctx: &OfflineContext,
        api_prefix: impl Into<String>,
    ) -> Result<Self, InstallError> {
        if !ctx.try_mark_interceptor_installed() {
            return Err(InstallError::AlreadyInstalled);
        }
        Ok(Self {
            inner,
            ctx: ctx.clone(),
            api_prefix: api_prefix.into(),
        })
    }

    fn is_api_target(&self, path: &str) -> bool {
        path.starts_with(&self.api_prefix)
    }

    /// Build the offline stand-in for an API target.
    ///
    /// Known read endpoints with non-empty snapshot data get a 200 carrying
    /// the snapshot; everything else gets an unreachable-while-offline 503.
    /// Both carry the diagnostic markers.
    fn synthesize(&self, target: &ApiTarget) -> ApiResponse {
        let snapshot = self.ctx.store().snapshot();
        let (status, body) = match Slice::for_endpoint(target.path()) {
            Some(Slice::Products) if !snapshot.products.is_empty() => {
                (200, serde_json::to_vec(&snapshot.products))
            }
            Some(Slice::User) if snapshot.user.is_some() => {
                (200, serde_json::to_vec(&snapshot.user))
            }
            _ => (
                503,
                serde_json::to_vec(&json!({
                    "error": "unreachable while offline",
                    "target": target.as_str(),
                })),
            ),
        };
        // Serializing owned snapshot data cannot fail in practice; an empty
        // body is the degraded-but-usable fallback if it ever does.
        let body = body.unwrap_or_default();

        ApiResponse::new(status)
            .with_header("content-type", "application/json")
            .with_header(SERVED_OFFLINE_HEADER, "true")
            .with_header(OFFLINE_TARGET_HEADER, target.as_str())
            .with_body(body)
    }

    /// Parse a live payload off the critical path and announce it.
    fn seed(&self, target: &ApiTarget, response: &ApiResponse) {
        let endpoint = target.path().to_owned();
        let body = response.body.clone();
        let bus = self.ctx.bus().clone();
        tokio::spawn(async move {
            match serde_json::from_slice::<serde_json::Value>(&body) {
                Ok(payload) => {
                    bus.publish(OfflineEvent::DataAvailable { endpoint, payload });
                }
                Err(err) => {
                    tracing::warn!(endpoint = %endpoint, error = %err, "live payload did not parse; not seeding");
                }
            }
        });
    }

    async fn handle(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let target = request.target.clone();
        let method = request.method;
        let api = self.is_api_target(target.path());

        if api && !self.ctx.is_online() {
            tracing::debug!(endpoint = %target, "offline: synthesizing API response");
            return Ok(self.synthesize(&target));
        }

        match self.inner.send(request).await {
            Ok(response) => {
                if api && method == ApiMethod::Get && response.is_success() {
                    self.seed(&target, &response);
                }
                Ok(response)
            }
            // The connectivity flag is known to lag reality; a transport
            // failure on an API target gets the same substitution as the
            // offline branch.
            Err(err) if api => {
                tracing::warn!(
                    endpoint = %target,
                    error = %err,
                    "transport failed while flag claims online; substituting offline response"
                );
                Ok(self.synthesize(&target))
            }
            Err(err) => Err(err),
        }
    }
}

impl<T: ApiTransport> ApiTransport for OfflineInterceptor<T> {
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send {
        self.handle(request)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal::Decimal;

    use tidecart_core::{CurrencyCode, Price, ProductId, ProductSummary};

    use crate::monitor::ConnectivityMonitor;
    use crate::store::{OfflineStore, PRODUCTS_ENDPOINT};

    use super::*;

    /// Scripted transport: counts calls, optionally fails every one.
    #[derive(Clone)]
    struct ScriptedTransport {
        calls: Arc<AtomicUsize>,
        fail: bool,
        body: &'static str,
    }

    impl ScriptedTransport {
        fn ok(body: &'static str) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                fail: false,
                body,
            }
        }

        fn failing() -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                fail: true,
                body: "",
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ApiTransport for ScriptedTransport {
        fn send(
            &self,
            _request: ApiRequest,
        ) -> impl std::future::Future<Output = Result<ApiResponse, TransportError>> + Send
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            let body = self.body;
            async move {
                if fail {
                    Err(TransportError::Unreachable("connection refused".into()))
                } else {
                    Ok(ApiResponse::new(200)
                        .with_header("content-type", "application/json")
                        .with_body(body))
                }
            }
        }
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("tidecart-intercept-test-{}", uuid::Uuid::new_v4()))
    }

    fn product(id: &str, handle: &str) -> ProductSummary {
        ProductSummary {
            id: ProductId::new(id),
            handle: handle.to_owned(),
            title: handle.to_owned(),
            price: Price::new(Decimal::new(1000, 2), CurrencyCode::USD),
        }
    }

    fn offline_context_with_products() -> OfflineContext {
        let store = OfflineStore::open(temp_dir());
        store.write_products(vec![product("42", "driftwood-candle")]);
        let ctx = OfflineContext::new(store);
        ConnectivityMonitor::new(ctx.clone()).report(false);
        ctx
    }

    #[tokio::test]
    async fn test_install_is_idempotent_guarded() {
        let ctx = OfflineContext::new(OfflineStore::open(temp_dir()));
        let first = OfflineInterceptor::install(ScriptedTransport::ok("{}"), &ctx);
        assert!(first.is_ok());

        let second = OfflineInterceptor::install(ScriptedTransport::ok("{}"), &ctx);
        assert!(matches!(second, Err(InstallError::AlreadyInstalled)));
    }

    #[tokio::test]
    async fn test_offline_known_endpoint_serves_snapshot_without_network() {
        let ctx = offline_context_with_products();
        let transport = ScriptedTransport::ok("{}");
        let api = OfflineInterceptor::install(transport.clone(), &ctx).unwrap();

        let response = api.send(ApiRequest::get(PRODUCTS_ENDPOINT)).await.unwrap();

        assert_eq!(response.status, 200);
        assert!(response.served_offline());
        assert_eq!(
            response.header(OFFLINE_TARGET_HEADER),
            Some(PRODUCTS_ENDPOINT)
        );
        let served: Vec<ProductSummary> = response.json().unwrap();
        assert_eq!(served, ctx.store().snapshot().products);
        // The whole point: zero network attempts while offline.
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_offline_empty_snapshot_gets_unreachable_body() {
        let store = OfflineStore::open(temp_dir());
        let ctx = OfflineContext::new(store);
        ConnectivityMonitor::new(ctx.clone()).report(false);
        let api = OfflineInterceptor::install(ScriptedTransport::ok("{}"), &ctx).unwrap();

        let response = api.send(ApiRequest::get(PRODUCTS_ENDPOINT)).await.unwrap();

        assert_eq!(response.status, 503);
        assert!(response.served_offline());
    }

    #[tokio::test]
    async fn test_offline_unrecognized_endpoint_gets_marked_503() {
        let ctx = offline_context_with_products();
        let api = OfflineInterceptor::install(ScriptedTransport::ok("{}"), &ctx).unwrap();

        let response = api
            .send(ApiRequest::get("/api/recommendations"))
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        assert!(response.served_offline());
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["error"], "unreachable while offline");
        assert_eq!(body["target"], "/api/recommendations");
    }

    #[tokio::test]
    async fn test_offline_non_api_target_still_delegates() {
        let ctx = offline_context_with_products();
        let transport = ScriptedTransport::failing();
        let api = OfflineInterceptor::install(transport.clone(), &ctx).unwrap();

        let result = api.send(ApiRequest::get("/static/app.css")).await;

        assert!(matches!(result, Err(TransportError::Unreachable(_))));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_flag_defense_substitutes_after_transport_error() {
        // Flag says online, transport disagrees: same substitution rules.
        let store = OfflineStore::open(temp_dir());
        store.write_products(vec![product("42", "driftwood-candle")]);
        let ctx = OfflineContext::new(store);
        assert!(ctx.is_online());

        let transport = ScriptedTransport::failing();
        let api = OfflineInterceptor::install(transport.clone(), &ctx).unwrap();

        let response = api.send(ApiRequest::get(PRODUCTS_ENDPOINT)).await.unwrap();

        assert_eq!(transport.call_count(), 1);
        assert_eq!(response.status, 200);
        assert!(response.served_offline());
    }

    #[tokio::test]
    async fn test_online_get_seeds_store_through_bus() {
        let store = OfflineStore::open(temp_dir());
        let ctx = OfflineContext::new(store);
        let mut rx = ctx.bus().subscribe();

        let payload = serde_json::to_string(&vec![product("42", "driftwood-candle")]).unwrap();
        let api = OfflineInterceptor::install(
            ScriptedTransport::ok(payload.leak()),
            &ctx,
        )
        .unwrap();

        let response = api.send(ApiRequest::get(PRODUCTS_ENDPOINT)).await.unwrap();
        assert!(!response.served_offline());

        match rx.recv().await.unwrap() {
            OfflineEvent::DataAvailable { endpoint, payload } => {
                assert_eq!(endpoint, PRODUCTS_ENDPOINT);
                assert!(payload.is_array());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_online_post_does_not_seed() {
        let ctx = OfflineContext::new(OfflineStore::open(temp_dir()));
        let mut rx = ctx.bus().subscribe();
        let api = OfflineInterceptor::install(ScriptedTransport::ok("[]"), &ctx).unwrap();

        api.send(ApiRequest::new(ApiMethod::Post, "/api/products"))
            .await
            .unwrap();

        // Give any (incorrect) seeding task a chance to run.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_toggling_connectivity_never_errors() {
        let ctx = offline_context_with_products();
        let monitor = ConnectivityMonitor::new(ctx.clone());
        let api = OfflineInterceptor::install(ScriptedTransport::ok("[]"), &ctx).unwrap();

        let offline = api.send(ApiRequest::get(PRODUCTS_ENDPOINT)).await.unwrap();
        assert!(offline.served_offline());

        monitor.report(true);
        let online = api.send(ApiRequest::get(PRODUCTS_ENDPOINT)).await.unwrap();
        assert!(!online.served_offline());

        monitor.report(false);
        let again = api.send(ApiRequest::get(PRODUCTS_ENDPOINT)).await.unwrap();
        assert!(again.served_offline());
    }
}
