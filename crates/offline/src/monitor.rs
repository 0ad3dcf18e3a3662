//! Connectivity monitor: the single writer of the connectivity flag.

use std::time::Duration;

use url::Url;

use crate::context::OfflineContext;
use crate::events::OfflineEvent;

/// Translates connectivity signals into the context's flag and broadcasts
/// genuine transitions.
///
/// Signals arrive either from the embedder via [`report`](Self::report) or
/// from the built-in origin probe. Repeated identical signals are absorbed:
/// exactly one `ConnectivityChanged` event per transition.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    ctx: OfflineContext,
}

impl ConnectivityMonitor {
    /// Create a monitor over the given context.
    #[must_use]
    pub const fn new(ctx: OfflineContext) -> Self {
        Self { ctx }
    }

    /// Feed one connectivity signal.
    ///
    /// On a genuine transition this updates the flag, raises or lowers the
    /// chrome marker, and publishes one `ConnectivityChanged` event.
    pub fn report(&self, online: bool) {
        if self.ctx.set_online(online) {
            if online {
                tracing::info!("connectivity restored");
            } else {
                tracing::warn!("connectivity lost; serving from snapshot");
            }
            self.ctx
                .bus()
                .publish(OfflineEvent::ConnectivityChanged { online });
        }
    }

    /// Derive signals from the platform: probe the origin's health URL at
    /// `interval` and feed the outcome into [`report`](Self::report).
    ///
    /// Runs forever; spawn it.
    pub async fn run_probe(self, health_url: Url, interval: Duration) {
        let client = reqwest::Client::new();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let online = match client.head(health_url.clone()).send().await {
                Ok(response) => response.status().is_success(),
                Err(err) => {
                    tracing::debug!(error = %err, "origin probe failed");
                    false
                }
            };
            self.report(online);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::store::OfflineStore;

    use super::*;

    fn context() -> OfflineContext {
        OfflineContext::new(OfflineStore::open(std::env::temp_dir()))
    }

    #[tokio::test]
    async fn test_transition_publishes_single_event() {
        let ctx = context();
        let monitor = ConnectivityMonitor::new(ctx.clone());
        let mut rx = ctx.bus().subscribe();

        monitor.report(false);
        monitor.report(false);
        monitor.report(false);

        match rx.recv().await.unwrap() {
            OfflineEvent::ConnectivityChanged { online } => assert!(!online),
            other => panic!("unexpected event: {other:?}"),
        }
        // The repeated signals must not have queued further events.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_round_trip_toggles_flag_and_marker() {
        let ctx = context();
        let monitor = ConnectivityMonitor::new(ctx.clone());

        monitor.report(false);
        assert!(!ctx.is_online());
        assert!(ctx.offline_banner_visible());

        monitor.report(true);
        assert!(ctx.is_online());
        assert!(!ctx.offline_banner_visible());
    }

    #[tokio::test]
    async fn test_initial_online_signal_is_not_a_transition() {
        let ctx = context();
        let monitor = ConnectivityMonitor::new(ctx.clone());
        let mut rx = ctx.bus().subscribe();

        monitor.report(true);

        assert!(rx.try_recv().is_err());
    }
}
