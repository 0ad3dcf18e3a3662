//! Fetch dispatch: every intercepted request resolves to *some* response.
//!
//! Navigations go network-first against the app-shell bucket, other
//! resources cache-first against the runtime bucket, and anything under the
//! API prefix is proxied straight through. Origin bodies are buffered into
//! `Bytes` exactly once; the cache writer and the client response share
//! cheap clones of that buffer.

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use secrecy::ExposeSecret;

use crate::buckets::{BucketPurpose, CacheEntry};
use crate::error::GatewayError;
use crate::policy::{self, RequestClass};
use crate::state::AppState;

/// Trust header carrying the shared origin key, when one is configured.
pub const ORIGIN_KEY_HEADER: &str = "x-tidecart-origin-key";

/// Embedded copy of the offline placeholder document, backing the edge
/// where install has not populated the app-shell bucket yet.
pub(crate) const OFFLINE_FALLBACK_HTML: &str = include_str!("../assets/offline.html");

const IMAGE_PLACEHOLDER_SVG: &str = include_str!("../assets/placeholder.svg");

/// Request bodies larger than this are refused rather than buffered.
const MAX_FORWARD_BODY: usize = 10 * 1024 * 1024;

/// Request headers forwarded to the origin on the pass-through path.
const FORWARDED_REQUEST_HEADERS: &[&str] = &["content-type", "accept", "authorization", "cookie"];

/// Hop-by-hop headers never copied off an origin response.
const DROPPED_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
];

/// Router fallback: classify, dispatch, and always settle to a response.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let path_and_query = request.uri().path_and_query().map_or_else(
        || request.uri().path().to_owned(),
        |pq| pq.as_str().to_owned(),
    );
    let accept = request
        .headers()
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let class = policy::classify(
        request.uri().path(),
        accept.as_deref(),
        &state.config().api_prefix,
    );

    match route(&state, class, &path_and_query, request).await {
        Ok(response) => response,
        // Backstop: an internal failure must still settle to a substitute,
        // never leave the navigation pending or bubble a raw error page
        // where a placeholder is expected.
        Err(err) => {
            if matches!(err, GatewayError::Origin(_)) {
                tracing::warn!(
                    path = %path_and_query,
                    error = %err,
                    "origin failed; resolving to substitute"
                );
            } else {
                sentry::capture_error(&err);
                tracing::error!(
                    path = %path_and_query,
                    error = %err,
                    "dispatch failed; resolving to substitute"
                );
            }
            match class {
                RequestClass::Api => err.into_response(),
                RequestClass::Navigation => navigation_fallback(&state, &path_and_query).await,
                RequestClass::Resource => resource_substitute(&path_and_query),
            }
        }
    }
}

async fn route(
    state: &AppState,
    class: RequestClass,
    path_and_query: &str,
    request: Request,
) -> Result<Response, GatewayError> {
    // Only GETs participate in caching; mutations and exotic methods are
    // proxied through regardless of class.
    if request.method() != Method::GET {
        return forward(state, path_and_query, request).await;
    }
    match class {
        RequestClass::Api => forward(state, path_and_query, request).await,
        RequestClass::Navigation => network_first(state, path_and_query).await,
        RequestClass::Resource => cache_first(state, path_and_query).await,
    }
}

// =============================================================================
// Policies
// =============================================================================

/// Network-first for navigations: origin wins, the app-shell bucket backs
/// it, the offline placeholder is the last resort.
async fn network_first(state: &AppState, path_and_query: &str) -> Result<Response, GatewayError> {
    match fetch_origin(state, path_and_query).await {
        Ok(fetched) => {
            if fetched.status == 200 {
                store_copy(state, BucketPurpose::AppShell, path_and_query, &fetched);
            }
            Ok(fetched.into_response())
        }
        Err(GatewayError::Origin(err)) => {
            tracing::warn!(
                path = %path_and_query,
                error = %err,
                "origin failed for navigation; serving from app-shell bucket"
            );
            Ok(navigation_fallback(state, path_and_query).await)
        }
        Err(other) => Err(other),
    }
}

/// Cache-first for resources: the runtime bucket wins, the origin fills
/// misses, failures get a type-appropriate substitute.
async fn cache_first(state: &AppState, path_and_query: &str) -> Result<Response, GatewayError> {
    if let Some(entry) = state
        .buckets()
        .get(BucketPurpose::Runtime, path_and_query)
        .await
    {
        return Ok(entry_response(&entry));
    }

    match fetch_origin(state, path_and_query).await {
        Ok(fetched) => {
            if fetched.status == 200 {
                store_copy(state, BucketPurpose::Runtime, path_and_query, &fetched);
            }
            Ok(fetched.into_response())
        }
        Err(GatewayError::Origin(err)) => {
            tracing::warn!(
                path = %path_and_query,
                error = %err,
                "origin failed for resource; substituting"
            );
            Ok(resource_substitute(path_and_query))
        }
        Err(other) => Err(other),
    }
}

/// Pass-through for API calls and non-GET methods. Never cached here: the
/// page-level interceptor owns API truth, and double-caching it at this
/// tier would serve stale data with no way to seed the snapshot.
async fn forward(
    state: &AppState,
    path_and_query: &str,
    request: Request,
) -> Result<Response, GatewayError> {
    let url = join_origin(state, path_and_query)?;
    let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
        .map_err(|err| GatewayError::Internal(format!("unforwardable method: {err}")))?;

    let mut forwarded: Vec<(&str, String)> = Vec::new();
    for name in FORWARDED_REQUEST_HEADERS {
        if let Some(value) = request
            .headers()
            .get(*name)
            .and_then(|value| value.to_str().ok())
        {
            forwarded.push((*name, value.to_owned()));
        }
    }

    let body = axum::body::to_bytes(request.into_body(), MAX_FORWARD_BODY)
        .await
        .map_err(|err| GatewayError::Internal(format!("request body unreadable: {err}")))?;

    let mut builder = state.http().request(method, url);
    for (name, value) in forwarded {
        builder = builder.header(name, value);
    }
    if let Some(key) = &state.config().origin_key {
        builder = builder.header(ORIGIN_KEY_HEADER, key.expose_secret());
    }
    if !body.is_empty() {
        builder = builder.body(body);
    }

    let upstream = builder.send().await?;
    let fetched = Fetched::from_reqwest(upstream).await?;
    Ok(fetched.into_response())
}

// =============================================================================
// Fallbacks
// =============================================================================

/// Cached entry for this navigation if one exists, else the placeholder.
async fn navigation_fallback(state: &AppState, path_and_query: &str) -> Response {
    if let Some(entry) = state
        .buckets()
        .get(BucketPurpose::AppShell, path_and_query)
        .await
    {
        return entry_response(&entry);
    }
    offline_placeholder(state).await
}

/// The offline placeholder document: the installed copy when present, the
/// embedded copy otherwise.
pub(crate) async fn offline_placeholder(state: &AppState) -> Response {
    let document = state.config().offline_document.as_str();
    if let Some(entry) = state.buckets().get(BucketPurpose::AppShell, document).await {
        return entry_response(&entry);
    }
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        OFFLINE_FALLBACK_HTML,
    )
        .into_response()
}

/// Type-appropriate substitute for an unreachable, uncached resource.
fn resource_substitute(path_and_query: &str) -> Response {
    let path = path_and_query
        .split('?')
        .next()
        .unwrap_or(path_and_query);
    if policy::is_image_path(path) {
        return (
            [(header::CONTENT_TYPE, "image/svg+xml")],
            IMAGE_PLACEHOLDER_SVG,
        )
            .into_response();
    }
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "unavailable while offline",
    )
        .into_response()
}

// =============================================================================
// Origin plumbing
// =============================================================================

/// An origin response buffered once.
pub(crate) struct Fetched {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Fetched {
    pub(crate) async fn from_reqwest(response: reqwest::Response) -> Result<Self, GatewayError> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| {
                !DROPPED_RESPONSE_HEADERS
                    .iter()
                    .any(|dropped| name.as_str().eq_ignore_ascii_case(dropped))
            })
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();
        let body = response.bytes().await?;
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    fn into_response(self) -> Response {
        build_response(self.status, &self.headers, self.body)
    }
}

/// GET a path from the origin, with the trust header when configured.
pub(crate) async fn fetch_origin(
    state: &AppState,
    path_and_query: &str,
) -> Result<Fetched, GatewayError> {
    let url = join_origin(state, path_and_query)?;
    let mut builder = state.http().get(url);
    if let Some(key) = &state.config().origin_key {
        builder = builder.header(ORIGIN_KEY_HEADER, key.expose_secret());
    }
    let response = builder.send().await?;
    Fetched::from_reqwest(response).await
}

fn join_origin(state: &AppState, path_and_query: &str) -> Result<url::Url, GatewayError> {
    state
        .config()
        .origin_url
        .join(path_and_query)
        .map_err(|err| GatewayError::Internal(format!("cannot join origin url: {err}")))
}

/// Clone a fetched response into the bucket without blocking the reply.
pub(crate) fn store_copy(
    state: &AppState,
    purpose: BucketPurpose,
    request_key: &str,
    fetched: &Fetched,
) {
    let entry = CacheEntry::new(fetched.status, fetched.headers.clone(), fetched.body.clone());
    let buckets = state.buckets().clone();
    let key = request_key.to_owned();
    tokio::spawn(async move {
        if let Err(err) = buckets.put(purpose, &key, entry).await {
            tracing::warn!(key = %key, error = %err, "cache write failed; response already served");
        }
    });
}

fn entry_response(entry: &CacheEntry) -> Response {
    build_response(entry.status, &entry.headers, entry.body.clone())
}

fn build_response(status: u16, headers: &[(String, String)], body: Bytes) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    let mut response = (status, body).into_response();
    for (name, value) in headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}
