//! Last-known-good snapshot store and offline route table.
//!
//! The store owns the [`OfflineSnapshot`] and is the only writer of its
//! persisted copies: one JSON document per slice under the data directory.
//! Mutators replace a slice wholesale and persist before returning, so a
//! read after a write always sees the new value even when the disk write
//! failed.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use tidecart_core::{ProductSummary, UserProfile};

use crate::events::OfflineEvent;

/// API endpoint whose responses feed the products slice.
pub const PRODUCTS_ENDPOINT: &str = "/api/products";
/// API endpoint whose responses feed the user slice.
pub const ACCOUNT_ENDPOINT: &str = "/api/account";

/// The process-wide last-known-good snapshot.
///
/// `products` is always a vector (possibly empty); `user` is `None` or a
/// single well-formed record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfflineSnapshot {
    #[serde(default)]
    pub products: Vec<ProductSummary>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// The enumerated domain slices the store persists. Nothing else is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slice {
    Products,
    User,
}

impl Slice {
    const fn file_name(self) -> &'static str {
        match self {
            Self::Products => "products.json",
            Self::User => "user.json",
        }
    }

    /// Map a read endpoint to the slice it feeds, if any.
    #[must_use]
    pub fn for_endpoint(endpoint: &str) -> Option<Self> {
        let path = endpoint.split('?').next().unwrap_or(endpoint);
        let path = if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        };
        match path {
            PRODUCTS_ENDPOINT => Some(Self::Products),
            ACCOUNT_ENDPOINT => Some(Self::User),
            _ => None,
        }
    }
}

/// Validation errors from [`OfflineStore::write_slice`].
///
/// These are the only errors the store propagates; everything else
/// (missing files, corrupt snapshots, failed disk writes) is absorbed and
/// logged.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The products slice must be a JSON array of product summaries.
    #[error("products slice must be an array of product summaries: {0}")]
    InvalidProducts(#[source] serde_json::Error),
    /// The user slice cannot be cleared by writing null; use `clear`.
    #[error("user slice must not be null")]
    NullUser,
    /// The user slice must be a well-formed profile object.
    #[error("user slice must be a well-formed profile: {0}")]
    InvalidUser(#[source] serde_json::Error),
}

/// Which routes stay navigable with no network.
///
/// Exact entries match whole paths; prefix entries match parametrized
/// sections. Product detail routes are handled dynamically against the
/// snapshot, not listed here.
#[derive(Debug, Clone)]
pub struct OfflineRouteTable {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl OfflineRouteTable {
    const PRODUCT_DETAIL_PREFIX: &'static str = "/products/";

    /// Build a table from explicit entries.
    #[must_use]
    pub fn new(
        exact: impl IntoIterator<Item = impl Into<String>>,
        prefixes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            exact: exact.into_iter().map(Into::into).collect(),
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    fn matches_static(&self, route: &str) -> bool {
        self.exact.iter().any(|entry| entry == route)
            || self.prefixes.iter().any(|prefix| route.starts_with(prefix))
    }

    /// The trailing identifier of a product detail route, if it is one.
    fn product_identifier(route: &str) -> Option<&str> {
        let rest = route.strip_prefix(Self::PRODUCT_DETAIL_PREFIX)?;
        if rest.is_empty() || rest.contains('/') {
            return None;
        }
        Some(rest)
    }
}

impl Default for OfflineRouteTable {
    /// The storefront's own navigable-offline whitelist.
    fn default() -> Self {
        Self::new(
            ["/", "/products", "/cart", "/account"],
            ["/account/", "/collections"],
        )
    }
}

/// Single page-runtime source of truth for last-known-good domain data.
///
/// Cheaply cloneable; clones share the same snapshot and data directory.
#[derive(Debug, Clone)]
pub struct OfflineStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    data_dir: PathBuf,
    routes: OfflineRouteTable,
    snapshot: Mutex<OfflineSnapshot>,
}

impl OfflineStore {
    /// Open a store over `data_dir` with the default route table.
    ///
    /// Missing or corrupt persisted slices are tolerated: the affected slice
    /// keeps its default and the problem is logged.
    #[must_use]
    pub fn open(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_routes(data_dir, OfflineRouteTable::default())
    }

    /// Open a store with an explicit route table.
    #[must_use]
    pub fn with_routes(data_dir: impl Into<PathBuf>, routes: OfflineRouteTable) -> Self {
        let data_dir = data_dir.into();
        if let Err(err) = std::fs::create_dir_all(&data_dir) {
            tracing::warn!(
                dir = %data_dir.display(),
                error = %err,
                "could not create snapshot directory; persistence disabled for this session"
            );
        }

        let products: Vec<ProductSummary> =
            load_slice(&data_dir.join(Slice::Products.file_name())).unwrap_or_default();
        let user: Option<UserProfile> =
            load_slice(&data_dir.join(Slice::User.file_name())).unwrap_or_default();

        Self {
            inner: Arc::new(StoreInner {
                data_dir,
                routes,
                snapshot: Mutex::new(OfflineSnapshot { products, user }),
            }),
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> OfflineSnapshot {
        self.lock().clone()
    }

    /// Replace a slice wholesale from a raw JSON payload.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the payload does not match the slice's
    /// required shape. Persistence failures do NOT error: the in-memory
    /// value is already replaced and stays authoritative for this session.
    pub fn write_slice(&self, slice: Slice, value: &serde_json::Value) -> Result<(), StoreError> {
        match slice {
            Slice::Products => {
                let products: Vec<ProductSummary> =
                    serde_json::from_value(value.clone()).map_err(StoreError::InvalidProducts)?;
                self.write_products(products);
            }
            Slice::User => {
                if value.is_null() {
                    return Err(StoreError::NullUser);
                }
                let user: UserProfile =
                    serde_json::from_value(value.clone()).map_err(StoreError::InvalidUser)?;
                self.write_user(user);
            }
        }
        Ok(())
    }

    /// Replace the products slice.
    pub fn write_products(&self, products: Vec<ProductSummary>) {
        let mut guard = self.lock();
        guard.products = products;
        self.persist(Slice::Products, &guard);
    }

    /// Replace the user slice.
    pub fn write_user(&self, user: UserProfile) {
        let mut guard = self.lock();
        guard.user = Some(user);
        self.persist(Slice::User, &guard);
    }

    /// Reset both slices, in memory and on disk, to empty defaults.
    pub fn clear(&self) {
        let mut guard = self.lock();
        *guard = OfflineSnapshot::default();
        self.persist(Slice::Products, &guard);
        self.persist(Slice::User, &guard);
    }

    /// Whether `route` can be rendered with no network.
    ///
    /// Exact whitelist first, then prefix whitelist, then the dynamic rule
    /// for product detail routes against the cached collection. Cheap enough
    /// to call on every navigation attempt.
    #[must_use]
    pub fn is_route_available_offline(&self, route: &str) -> bool {
        if self.inner.routes.matches_static(route) {
            return true;
        }
        if let Some(identifier) = OfflineRouteTable::product_identifier(route) {
            return self
                .lock()
                .products
                .iter()
                .any(|product| product.matches_identifier(identifier));
        }
        false
    }

    /// Consume `DataAvailable` events and seed the matching slices.
    ///
    /// Runs until the bus closes. Unrecognized endpoints and malformed
    /// payloads are logged and dropped, never fatal.
    pub async fn run_seeder(self, mut events: broadcast::Receiver<OfflineEvent>) {
        loop {
            match events.recv().await {
                Ok(OfflineEvent::DataAvailable { endpoint, payload }) => {
                    self.apply_payload(&endpoint, &payload);
                }
                Ok(OfflineEvent::ConnectivityChanged { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "seeder lagged behind the event bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Apply one live payload to the slice its endpoint feeds, if any.
    pub fn apply_payload(&self, endpoint: &str, payload: &serde_json::Value) {
        match Slice::for_endpoint(endpoint) {
            Some(slice) => {
                if let Err(err) = self.write_slice(slice, payload) {
                    tracing::warn!(endpoint, error = %err, "discarding unusable seed payload");
                } else {
                    tracing::debug!(endpoint, "snapshot slice seeded from live traffic");
                }
            }
            None => tracing::trace!(endpoint, "endpoint is not snapshotted"),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, OfflineSnapshot> {
        // A poisoned lock only means a panic mid-replace of a fully built
        // value; the snapshot itself is still whole.
        self.inner
            .snapshot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn persist(&self, slice: Slice, snapshot: &OfflineSnapshot) {
        let serialized = match slice {
            Slice::Products => serde_json::to_vec(&snapshot.products),
            Slice::User => serde_json::to_vec(&snapshot.user),
        };
        let path = self.inner.data_dir.join(slice.file_name());
        let result = serialized.map_err(std::io::Error::other).and_then(|bytes| {
            std::fs::write(&path, bytes)
        });
        if let Err(err) = result {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "snapshot slice not persisted; in-memory value stays authoritative"
            );
        }
    }
}

fn load_slice<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = std::fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "corrupt snapshot slice ignored; using defaults"
            );
            None
        }
    }
}
