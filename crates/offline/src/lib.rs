//! Tidecart Offline - page-runtime offline layers.
//!
//! Three cooperating layers keep the storefront browsable while the network
//! is unreliable or absent:
//!
//! - [`store::OfflineStore`] - last-known-good snapshot of a small set of
//!   domain slices plus the offline route-navigability predicate
//! - [`interceptor::OfflineInterceptor`] - a decorator around the upstream
//!   API transport that substitutes cached data while offline and seeds the
//!   store from live traffic
//! - [`monitor::ConnectivityMonitor`] - translates connectivity signals into
//!   a single flag and broadcasts transitions
//!
//! Everything shared between them hangs off an explicitly constructed
//! [`context::OfflineContext`]; there is no ambient module state.
//!
//! # Wiring
//!
//! ```rust,ignore
//! let store = OfflineStore::open(data_dir);
//! let ctx = OfflineContext::new(store);
//! ctx.spawn_seeder();
//!
//! let transport = HttpTransport::new(origin_url);
//! let api = OfflineInterceptor::install(transport, &ctx)?;
//!
//! let monitor = ConnectivityMonitor::new(ctx.clone());
//! tokio::spawn(monitor.run_probe(health_url, Duration::from_secs(15)));
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod context;
pub mod events;
pub mod interceptor;
pub mod monitor;
pub mod store;
pub mod transport;

pub use context::OfflineContext;
pub use events::{EventBus, OfflineEvent};
pub use interceptor::{InstallError, OfflineInterceptor};
pub use monitor::ConnectivityMonitor;
pub use store::{OfflineRouteTable, OfflineSnapshot, OfflineStore, Slice, StoreError};
pub use transport::{
    ApiMethod, ApiRequest, ApiResponse, ApiTarget, ApiTransport, HttpTransport, TransportError,
};
