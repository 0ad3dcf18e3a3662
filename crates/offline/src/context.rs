//! The explicitly constructed context shared by the offline layers.
//!
//! One `OfflineContext` is created at startup and handed by reference to
//! the interceptor, the monitor, and the page chrome. It owns the
//! connectivity flag and the event bus; the snapshot store is owned here
//! too but mutated only through its own API.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::events::EventBus;
use crate::store::OfflineStore;

/// Shared context for the page-runtime offline subsystem.
///
/// Cheaply cloneable via `Arc`; all clones observe the same state.
#[derive(Debug, Clone)]
pub struct OfflineContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    store: OfflineStore,
    online: watch::Sender<bool>,
    bus: EventBus,
    offline_banner: AtomicBool,
    interceptor_installed: AtomicBool,
}

impl OfflineContext {
    /// Create a context around an opened store. Connectivity starts
    /// optimistic (online) until the first signal says otherwise.
    #[must_use]
    pub fn new(store: OfflineStore) -> Self {
        let (online, _) = watch::channel(true);
        Self {
            inner: Arc::new(ContextInner {
                store,
                online,
                bus: EventBus::default(),
                offline_banner: AtomicBool::new(false),
                interceptor_installed: AtomicBool::new(false),
            }),
        }
    }

    /// The snapshot store.
    #[must_use]
    pub fn store(&self) -> &OfflineStore {
        &self.inner.store
    }

    /// The event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Current believed connectivity.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.inner.online.borrow()
    }

    /// A watch receiver over the connectivity flag, for code that wants to
    /// await transitions rather than poll.
    #[must_use]
    pub fn watch_online(&self) -> watch::Receiver<bool> {
        self.inner.online.subscribe()
    }

    /// Whether the chrome-facing offline marker is currently raised.
    #[must_use]
    pub fn offline_banner_visible(&self) -> bool {
        self.inner.offline_banner.load(Ordering::Acquire)
    }

    /// Spawn the store's seeder subscribed to this context's bus.
    pub fn spawn_seeder(&self) -> tokio::task::JoinHandle<()> {
        let store = self.inner.store.clone();
        let events = self.inner.bus.subscribe();
        tokio::spawn(store.run_seeder(events))
    }

    /// Flip the connectivity flag. Returns `true` only on a genuine
    /// transition. Only the monitor calls this.
    pub(crate) fn set_online(&self, online: bool) -> bool {
        let changed = self.inner.online.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            self.inner.offline_banner.store(!online, Ordering::Release);
        }
        changed
    }

    /// One-shot installation guard for the interceptor. The first caller
    /// wins; later calls get `false`.
    pub(crate) fn try_mark_interceptor_installed(&self) -> bool {
        !self
            .inner
            .interceptor_installed
            .swap(true, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_online_with_banner_hidden() {
        let ctx = OfflineContext::new(OfflineStore::open(std::env::temp_dir()));
        assert!(ctx.is_online());
        assert!(!ctx.offline_banner_visible());
    }

    #[test]
    fn test_set_online_reports_transitions_only() {
        let ctx = OfflineContext::new(OfflineStore::open(std::env::temp_dir()));
        assert!(ctx.set_online(false));
        assert!(!ctx.set_online(false));
        assert!(ctx.offline_banner_visible());
        assert!(ctx.set_online(true));
        assert!(!ctx.offline_banner_visible());
    }

    #[test]
    fn test_install_guard_is_one_shot() {
        let ctx = OfflineContext::new(OfflineStore::open(std::env::temp_dir()));
        assert!(ctx.try_mark_interceptor_installed());
        assert!(!ctx.try_mark_interceptor_installed());
    }
}
