//! Application state shared across handlers.

use std::io;
use std::sync::Arc;

use crate::buckets::BucketStore;
use crate::config::GatewayConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// configuration, the shared HTTP client, and the cache buckets.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: GatewayConfig,
    http: reqwest::Client,
    buckets: BucketStore,
}

impl AppState {
    /// Create a new application state, opening the bucket store.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directories cannot be created.
    pub fn new(config: GatewayConfig) -> io::Result<Self> {
        let buckets = BucketStore::open(&config.cache_dir, &config.cache_version)?;
        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                http: reqwest::Client::new(),
                buckets,
            }),
        })
    }

    /// Get a reference to the gateway configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// Get a reference to the shared HTTP client.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// Get a reference to the cache bucket store.
    #[must_use]
    pub fn buckets(&self) -> &BucketStore {
        &self.inner.buckets
    }
}
