//! Upstream API transport: request/response shapes and the transport trait.
//!
//! The interceptor wraps anything implementing [`ApiTransport`], so the
//! production HTTP client and the mocks used in tests share one seam.

use std::future::Future;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use url::Url;

/// HTTP-ish method for an API call. Methodless calls default to `Get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiMethod {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl std::fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        write!(f, "{name}")
    }
}

/// A call target normalized into a comparable string.
///
/// Callers hand targets over in several shapes - a path string, an absolute
/// [`Url`], a full request - and classification needs one canonical form.
/// Normalization is best-effort and never fails: anything unrecognizable is
/// coerced into a rooted path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiTarget(String);

impl ApiTarget {
    fn normalize(raw: &str) -> String {
        // Absolute URLs keep only path + query; the origin is implied.
        if let Ok(url) = Url::parse(raw)
            && url.has_host()
        {
            return match url.query() {
                Some(query) => format!("{}?{query}", url.path()),
                None => url.path().to_owned(),
            };
        }

        let trimmed = raw.split('#').next().unwrap_or(raw);
        if trimmed.is_empty() {
            return "/".to_owned();
        }
        if trimmed.starts_with('/') {
            trimmed.to_owned()
        } else {
            format!("/{trimmed}")
        }
    }

    /// The normalized target, path plus query.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path portion, without any query string.
    #[must_use]
    pub fn path(&self) -> &str {
        self.0.split('?').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ApiTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ApiTarget {
    fn from(raw: &str) -> Self {
        Self(Self::normalize(raw))
    }
}

impl From<String> for ApiTarget {
    fn from(raw: String) -> Self {
        Self(Self::normalize(&raw))
    }
}

impl From<&Url> for ApiTarget {
    fn from(url: &Url) -> Self {
        Self(Self::normalize(url.as_str()))
    }
}

impl From<Url> for ApiTarget {
    fn from(url: Url) -> Self {
        Self::from(&url)
    }
}

/// An outgoing API request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: ApiMethod,
    pub target: ApiTarget,
    pub body: Option<Bytes>,
}

impl ApiRequest {
    /// Build a request with an explicit method.
    pub fn new(method: ApiMethod, target: impl Into<ApiTarget>) -> Self {
        Self {
            method,
            target: target.into(),
            body: None,
        }
    }

    /// Build a GET request.
    pub fn get(target: impl Into<ApiTarget>) -> Self {
        Self::new(ApiMethod::Get, target)
    }

    /// Attach a body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A response from the upstream API (or a synthesized stand-in).
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ApiResponse {
    /// Build an empty response with the given status.
    #[must_use]
    pub const fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Look up a header value, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// All headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Whether this response was synthesized from the offline snapshot.
    #[must_use]
    pub fn served_offline(&self) -> bool {
        self.header(crate::interceptor::SERVED_OFFLINE_HEADER) == Some("true")
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if the body does not parse.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Errors surfaced by an [`ApiTransport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The network refused or dropped the attempt.
    #[error("network unreachable: {0}")]
    Unreachable(String),
    /// The HTTP client failed below the response level.
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
}

/// The seam between application code and the network.
///
/// The production implementation is [`HttpTransport`];
/// [`OfflineInterceptor`](crate::interceptor::OfflineInterceptor) wraps any
/// implementor and is itself one, so the decorated transport keeps the exact
/// shape of the original.
pub trait ApiTransport: Send + Sync + 'static {
    /// Send a request upstream and await the response.
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send;
}

/// `reqwest`-backed transport against a fixed origin.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
}

impl HttpTransport {
    /// Create a transport with a fresh client.
    #[must_use]
    pub fn new(base: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base)
    }

    /// Create a transport reusing an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }
}

impl ApiTransport for HttpTransport {
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send {
        let client = self.client.clone();
        let base = self.base.clone();
        async move {
            let url = base
                .join(request.target.as_str())
                .map_err(|err| TransportError::Unreachable(err.to_string()))?;

            let mut builder = match request.method {
                ApiMethod::Get => client.get(url),
                ApiMethod::Head => client.head(url),
                ApiMethod::Post => client.post(url),
                ApiMethod::Put => client.put(url),
                ApiMethod::Delete => client.delete(url),
            };
            if let Some(body) = request.body {
                builder = builder
                    .header("content-type", "application/json")
                    .body(body);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_owned(), v.to_owned()))
                })
                .collect();
            let body = response.bytes().await?;

            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        }
    }
}
