//! Versioned, named cache buckets.
//!
//! One bucket per logical purpose (app shell, runtime resources), each a
//! directory named `{purpose}-{version}` under the cache root. Entries are
//! whole files written via temp-file + rename, so a concurrent reader sees
//! either the previous entry or the new one, never a torn write. A bounded
//! `moka` layer keeps recently served entries off the disk path.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// How many entries the in-memory read-through layer keeps.
const HOT_LAYER_CAPACITY: u64 = 256;

/// The logical purposes buckets exist for. Activation only ever touches
/// directories whose names carry one of these prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketPurpose {
    /// Navigations and precached shell resources.
    AppShell,
    /// Everything else cacheable: stylesheets, scripts, images.
    Runtime,
}

impl BucketPurpose {
    /// All purposes, for enumeration at open/activate time.
    pub const ALL: [Self; 2] = [Self::AppShell, Self::Runtime];

    /// The directory-name prefix for this purpose.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::AppShell => "app-shell",
            Self::Runtime => "runtime",
        }
    }
}

/// One cached response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Build an entry stamped with the current time.
    #[must_use]
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at: Utc::now(),
        }
    }
}

/// On-disk representation of a [`CacheEntry`].
///
/// The raw request key is kept alongside the hashed file name for
/// debuggability; the body travels base64-encoded inside the JSON envelope.
#[derive(Serialize, Deserialize)]
struct EntryEnvelope {
    request_key: String,
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
    stored_at: DateTime<Utc>,
}

impl EntryEnvelope {
    fn from_entry(request_key: &str, entry: &CacheEntry) -> Self {
        Self {
            request_key: request_key.to_owned(),
            status: entry.status,
            headers: entry.headers.clone(),
            body: BASE64.encode(&entry.body),
            stored_at: entry.stored_at,
        }
    }

    fn into_entry(self) -> Result<CacheEntry, base64::DecodeError> {
        Ok(CacheEntry {
            status: self.status,
            headers: self.headers,
            body: Bytes::from(BASE64.decode(self.body)?),
            stored_at: self.stored_at,
        })
    }
}

/// The durable bucket set plus its in-memory hot layer.
///
/// Cheaply cloneable; clones share the same directories and hot layer.
#[derive(Clone)]
pub struct BucketStore {
    inner: Arc<BucketStoreInner>,
}

struct BucketStoreInner {
    root: PathBuf,
    version: String,
    hot: Cache<String, CacheEntry>,
}

impl BucketStore {
    /// Open the store, creating the root and the live bucket directories.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error if the directories cannot be created.
    pub fn open(root: impl Into<PathBuf>, version: impl Into<String>) -> io::Result<Self> {
        let store = Self {
            inner: Arc::new(BucketStoreInner {
                root: root.into(),
                version: version.into(),
                hot: Cache::builder().max_capacity(HOT_LAYER_CAPACITY).build(),
            }),
        };
        for purpose in BucketPurpose::ALL {
            std::fs::create_dir_all(store.bucket_dir(purpose))?;
        }
        Ok(store)
    }

    /// The full name of the live bucket for a purpose, version tag included.
    #[must_use]
    pub fn bucket_name(&self, purpose: BucketPurpose) -> String {
        format!("{}-{}", purpose.prefix(), self.inner.version)
    }

    fn bucket_dir(&self, purpose: BucketPurpose) -> PathBuf {
        self.inner.root.join(self.bucket_name(purpose))
    }

    fn entry_path(&self, purpose: BucketPurpose, request_key: &str) -> PathBuf {
        let digest = Sha256::digest(request_key.as_bytes());
        self.bucket_dir(purpose)
            .join(format!("{}.json", hex::encode(digest)))
    }

    fn hot_key(&self, purpose: BucketPurpose, request_key: &str) -> String {
        format!("{}:{request_key}", purpose.prefix())
    }

    /// Store an entry, replacing any previous entry for the same key.
    ///
    /// The write lands in a temp file first and is renamed into place, so
    /// concurrent readers never observe a partial entry.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error; callers treat it as a no-op write.
    pub async fn put(
        &self,
        purpose: BucketPurpose,
        request_key: &str,
        entry: CacheEntry,
    ) -> io::Result<()> {
        let envelope = EntryEnvelope::from_entry(request_key, &entry);
        let bytes = serde_json::to_vec(&envelope).map_err(io::Error::other)?;

        let path = self.entry_path(purpose, request_key);
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        self.inner
            .hot
            .insert(self.hot_key(purpose, request_key), entry)
            .await;
        Ok(())
    }

    /// Fetch an entry, hot layer first, then disk.
    ///
    /// Corrupt entries read as absent and are logged.
    pub async fn get(&self, purpose: BucketPurpose, request_key: &str) -> Option<CacheEntry> {
        let hot_key = self.hot_key(purpose, request_key);
        if let Some(entry) = self.inner.hot.get(&hot_key).await {
            return Some(entry);
        }

        let path = self.entry_path(purpose, request_key);
        let bytes = tokio::fs::read(&path).await.ok()?;
        let entry = serde_json::from_slice::<EntryEnvelope>(&bytes)
            .map_err(|err| err.to_string())
            .and_then(|envelope| envelope.into_entry().map_err(|err| err.to_string()));
        match entry {
            Ok(entry) => {
                self.inner.hot.insert(hot_key, entry.clone()).await;
                Some(entry)
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "corrupt cache entry ignored"
                );
                None
            }
        }
    }

    /// Retire stale buckets and ensure the live ones exist.
    ///
    /// Any directory whose name carries a recognized purpose prefix but is
    /// not the live bucket for that purpose is deleted wholesale, entries
    /// included. Unrecognized directories are left alone. The hot layer is
    /// flushed so retired entries cannot be served from memory.
    ///
    /// # Errors
    ///
    /// Returns the first IO error; callers log and continue with whatever
    /// buckets remain.
    pub async fn activate(&self) -> io::Result<Vec<String>> {
        let mut removed = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.inner.root).await?;
        while let Some(dirent) = dir.next_entry().await? {
            if !dirent.file_type().await?.is_dir() {
                continue;
            }
            let name = dirent.file_name().to_string_lossy().into_owned();
            let stale = BucketPurpose::ALL.iter().any(|&purpose| {
                name.starts_with(&format!("{}-", purpose.prefix()))
                    && name != self.bucket_name(purpose)
            });
            if stale {
                tokio::fs::remove_dir_all(dirent.path()).await?;
                removed.push(name);
            }
        }

        for purpose in BucketPurpose::ALL {
            tokio::fs::create_dir_all(self.bucket_dir(purpose)).await?;
        }
        self.inner.hot.invalidate_all();
        Ok(removed)
    }

    /// Number of entries currently in a bucket. Diagnostic/test helper.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error if the bucket cannot be read.
    pub async fn entry_count(&self, purpose: BucketPurpose) -> io::Result<usize> {
        let mut count = 0;
        let mut dir = tokio::fs::read_dir(self.bucket_dir(purpose)).await?;
        while let Some(dirent) = dir.next_entry().await? {
            if dirent
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            {
                count += 1;
            }
        }
        Ok(count)
    }
}
