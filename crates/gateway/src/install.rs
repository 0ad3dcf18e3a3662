//! Install/activate lifecycle for the cache buckets.
//!
//! Activation runs before the listener binds: stale-versioned buckets are
//! retired so the new policy governs immediately. Install is spawned after
//! takeover; precaching the shell must never delay serving traffic, so a
//! brief overlap between shell versions is accepted.

use axum::body::Bytes;

use crate::buckets::{BucketPurpose, CacheEntry};
use crate::proxy::{self, OFFLINE_FALLBACK_HTML};
use crate::state::AppState;

/// Retire stale buckets. Failures are logged, not fatal: the gateway can
/// serve with whatever buckets exist.
pub async fn activate(state: &AppState) {
    match state.buckets().activate().await {
        Ok(removed) if removed.is_empty() => {
            tracing::debug!("no stale cache buckets to retire");
        }
        Ok(removed) => {
            tracing::info!(retired = ?removed, "retired stale cache buckets");
        }
        Err(err) => {
            tracing::warn!(error = %err, "bucket activation failed; continuing with existing buckets");
        }
    }
}

/// Precache every shell manifest entry into the app-shell bucket.
///
/// Idempotent: entries are replaced wholesale, so re-running with the same
/// manifest changes nothing but timestamps. Individual failures are logged
/// and skipped. The offline placeholder always ends up present - from the
/// origin when reachable, from the embedded copy otherwise.
pub async fn install_shell(state: AppState) {
    let manifest = state.config().shell_manifest.clone();
    for path in &manifest {
        match proxy::fetch_origin(&state, path).await {
            Ok(fetched) if fetched.status == 200 => {
                let entry = CacheEntry::new(fetched.status, fetched.headers, fetched.body);
                match state.buckets().put(BucketPurpose::AppShell, path, entry).await {
                    Ok(()) => tracing::debug!(path = %path, "shell resource precached"),
                    Err(err) => {
                        tracing::warn!(path = %path, error = %err, "shell resource not stored");
                    }
                }
            }
            Ok(fetched) => {
                tracing::warn!(
                    path = %path,
                    status = %fetched.status,
                    "shell resource not precached"
                );
            }
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "shell resource unreachable during install");
            }
        }
    }

    ensure_offline_document(&state).await;
    tracing::info!(resources = manifest.len(), "app shell install finished");
}

/// Spawn the install task; returns its handle for callers that need to
/// await completion (tests, drain hooks).
pub fn spawn_install(state: &AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(install_shell(state.clone()))
}

/// The placeholder is the last line of the navigation fallback chain, so a
/// missing installed copy is backfilled from the embedded document.
async fn ensure_offline_document(state: &AppState) {
    let document = state.config().offline_document.as_str();
    if state
        .buckets()
        .get(BucketPurpose::AppShell, document)
        .await
        .is_some()
    {
        return;
    }

    let entry = CacheEntry::new(
        200,
        vec![(
            "content-type".to_owned(),
            "text/html; charset=utf-8".to_owned(),
        )],
        Bytes::from_static(OFFLINE_FALLBACK_HTML.as_bytes()),
    );
    if let Err(err) = state
        .buckets()
        .put(BucketPurpose::AppShell, document, entry)
        .await
    {
        tracing::warn!(error = %err, "embedded offline document not stored; falling back at serve time");
    } else {
        tracing::info!(document = %document, "offline document backfilled from embedded copy");
    }
}
