//! ContentCache: TTL lookups with renewal and stale fallback

use super::debounce::DebounceSlot;
use super::manifest::{CacheEntry, Manifest};
use super::{escape_key, replace_file, replace_file_sync, unescape_key};
use crate::config::{CacheConfig, ConfigManager, Config};
use crate::either::Either;
use crate::error::{StashError, StashResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const MANIFEST_FILE: &str = "manifest.json";
const BLOB_DIR: &str = "blobs";

/// Outcome of a lookup: `Left` is fresh or just-renewed content, `Right`
/// is stale content served because renewal failed.
pub type Lookup = Either<String, String>;

/// Cache construction options
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Root directory holding the manifest and blobs
    pub dir: PathBuf,

    /// Freshness window for renewed content
    pub ttl: Duration,

    /// Quiet period before a manifest write
    pub debounce: Duration,

    /// Default renewal timeout for [`ContentCache::get_or_renew`]
    pub renew_timeout: Duration,
}

impl CacheOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::from_config(&CacheConfig::default(), dir)
    }

    pub fn from_config(config: &CacheConfig, dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ttl: config.ttl(),
            debounce: config.debounce(),
            renew_timeout: config.renew_timeout(),
        }
    }

    /// Options for the configured (or default) cache directory
    pub fn for_config(config: &Config) -> Self {
        Self::from_config(&config.cache, ConfigManager::cache_dir(config))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_renew_timeout(mut self, timeout: Duration) -> Self {
        self.renew_timeout = timeout;
        self
    }
}

/// One manifest entry, for listings
#[derive(Debug, Clone)]
pub struct CacheEntryInfo {
    /// Original (unescaped) key
    pub key: String,
    pub blob: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
    /// Blob size in bytes, if the blob is present
    pub size: Option<u64>,
}

/// Manifest plus blob names handed out to first-time renewals that have
/// not reached the manifest yet. One lock covers both so a key never gets
/// two names.
#[derive(Default)]
struct CacheState {
    manifest: Manifest,
    reserved: HashMap<String, Reservation>,
}

struct Reservation {
    blob: String,
    holders: usize,
}

/// Blob name a renewal writes to
struct BlobClaim {
    name: String,
    reserved: bool,
}

impl CacheState {
    /// The key's existing blob, or a reservation in progress for it
    fn join(&mut self, escaped: &str) -> Option<BlobClaim> {
        if let Some(entry) = self.manifest.get(escaped) {
            return Some(BlobClaim {
                name: entry.value.clone(),
                reserved: false,
            });
        }
        let reservation = self.reserved.get_mut(escaped)?;
        reservation.holders += 1;
        Some(BlobClaim {
            name: reservation.blob.clone(),
            reserved: true,
        })
    }

    fn is_taken(&self, blob: &str) -> bool {
        self.manifest.references(blob) || self.reserved.values().any(|r| r.blob == blob)
    }

    fn reserve(&mut self, escaped: &str, blob: &str) -> BlobClaim {
        self.reserved.insert(
            escaped.to_string(),
            Reservation {
                blob: blob.to_string(),
                holders: 1,
            },
        );
        BlobClaim {
            name: blob.to_string(),
            reserved: true,
        }
    }

    fn release(&mut self, escaped: &str, claim: &BlobClaim) {
        if !claim.reserved {
            return;
        }
        if let Entry::Occupied(mut slot) = self.reserved.entry(escaped.to_string()) {
            let reservation = slot.get_mut();
            if reservation.blob != claim.name {
                return;
            }
            reservation.holders = reservation.holders.saturating_sub(1);
            if reservation.holders == 0 {
                slot.remove();
            }
        }
    }
}

struct CacheInner {
    options: CacheOptions,
    manifest_path: PathBuf,
    blob_dir: PathBuf,
    state: Mutex<CacheState>,
    pending: DebounceSlot,
    // Held from snapshot to rename, so files land in snapshot order
    write_lock: Mutex<()>,
    writes: AtomicU64,
}

impl CacheInner {
    fn blob_path(&self, blob: &str) -> PathBuf {
        self.blob_dir.join(blob)
    }

    /// Snapshot the manifest and replace the file with it
    fn write_manifest(&self) {
        let _guard = self.write_lock.lock();
        let rendered = self.state.lock().manifest.render();
        match rendered {
            Ok(text) => match replace_file_sync(&self.manifest_path, text.as_bytes()) {
                Ok(()) => {
                    self.writes.fetch_add(1, Ordering::Relaxed);
                    debug!("Wrote cache manifest {}", self.manifest_path.display());
                }
                Err(e) => warn!(
                    "Failed to write cache manifest {}: {}",
                    self.manifest_path.display(),
                    e
                ),
            },
            Err(e) => warn!("Failed to render cache manifest: {}", e),
        }
    }
}

async fn persist(inner: Arc<CacheInner>) {
    if let Err(e) = tokio::task::spawn_blocking(move || inner.write_manifest()).await {
        warn!("Cache manifest write did not complete: {}", e);
    }
}

/// Disk-backed content cache.
///
/// Lookups never fail: I/O problems are logged and surface as a miss.
/// Dropping the cache writes any manifest update still waiting on its
/// debounce window.
pub struct ContentCache {
    inner: Arc<CacheInner>,
}

impl ContentCache {
    /// Open (creating if needed) the cache rooted at `options.dir`
    pub async fn open(options: CacheOptions) -> StashResult<Self> {
        let blob_dir = options.dir.join(BLOB_DIR);
        tokio::fs::create_dir_all(&blob_dir)
            .await
            .map_err(|e| StashError::CacheOpen {
                path: blob_dir.clone(),
                source: e,
            })?;

        let manifest_path = options.dir.join(MANIFEST_FILE);
        let manifest = Manifest::load(&manifest_path);
        debug!(
            "Opened content cache {} with {} entries",
            options.dir.display(),
            manifest.len()
        );

        Ok(Self {
            inner: Arc::new(CacheInner {
                options,
                manifest_path,
                blob_dir,
                state: Mutex::new(CacheState {
                    manifest,
                    reserved: HashMap::new(),
                }),
                pending: DebounceSlot::new(),
                write_lock: Mutex::new(()),
                writes: AtomicU64::new(0),
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.options.dir
    }

    pub fn options(&self) -> &CacheOptions {
        &self.inner.options
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().manifest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of manifest writes performed by this instance
    pub fn manifest_writes(&self) -> u64 {
        self.inner.writes.load(Ordering::Relaxed)
    }

    /// Fresh content for `key`, renewing with the configured timeout
    pub async fn get_or_renew<F, Fut, E>(&self, key: &str, renew: F) -> Option<String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Option<String>, E>>,
        E: fmt::Display,
    {
        let timeout = self.inner.options.renew_timeout;
        self.get_or_renew_with_timeout(key, timeout, renew).await
    }

    /// Fresh content for `key`, renewing through `renew` when the entry is
    /// missing or expired. A renewal that errors, yields nothing or exceeds
    /// `timeout` falls back to the last stored content, if any.
    pub async fn get_or_renew_with_timeout<F, Fut, E>(
        &self,
        key: &str,
        timeout: Duration,
        renew: F,
    ) -> Option<String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Option<String>, E>>,
        E: fmt::Display,
    {
        self.lookup(key, timeout, renew).await.map(Either::into_inner)
    }

    /// Like [`get_or_renew_with_timeout`](Self::get_or_renew_with_timeout),
    /// but reports whether the content is fresh or stale
    pub async fn lookup<F, Fut, E>(&self, key: &str, timeout: Duration, renew: F) -> Option<Lookup>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Option<String>, E>>,
        E: fmt::Display,
    {
        let escaped = escape_key(key);
        if let Some(value) = self.read_fresh(&escaped).await {
            debug!("Cache hit for {}", key);
            return Some(Either::Left(value));
        }

        let renewed = match tokio::time::timeout(timeout, renew(key.to_string())).await {
            Ok(Ok(Some(value))) => Some(value),
            Ok(Ok(None)) => {
                debug!("Renewal for {} produced no content", key);
                None
            }
            Ok(Err(e)) => {
                warn!("Renewal for {} failed: {}", key, e);
                None
            }
            Err(_) => {
                warn!("Renewal for {} timed out after {:?}", key, timeout);
                None
            }
        };

        match renewed {
            Some(value) => {
                self.store(&escaped, &value).await;
                Some(Either::Left(value))
            }
            None => {
                let stale = self.read_any(&escaped).await;
                if stale.is_some() {
                    info!("Serving stale content for {}", key);
                }
                stale.map(Either::Right)
            }
        }
    }

    /// Fresh content for `key` without attempting renewal
    pub async fn peek(&self, key: &str) -> Option<String> {
        self.read_fresh(&escape_key(key)).await
    }

    /// Forget `key` and delete its blob; false if it was not cached
    pub async fn remove(&self, key: &str) -> bool {
        let removed = self.inner.state.lock().manifest.remove(&escape_key(key));
        match removed {
            Some(entry) => {
                self.delete_blob(&entry.value).await;
                self.schedule_save();
                true
            }
            None => false,
        }
    }

    /// Drop expired entries and unreferenced blobs; returns entries dropped
    pub async fn purge_expired(&self) -> usize {
        let drained = self.inner.state.lock().manifest.drain_expired(now_ms());
        for (_, entry) in &drained {
            self.delete_blob(&entry.value).await;
        }
        self.remove_orphans().await;

        if !drained.is_empty() {
            info!("Purged {} expired cache entries", drained.len());
            self.schedule_save();
        }
        drained.len()
    }

    /// Drop every entry and blob; returns entries dropped
    pub async fn clear(&self) -> usize {
        let drained = self.inner.state.lock().manifest.drain();
        for (_, entry) in &drained {
            self.delete_blob(&entry.value).await;
        }
        self.remove_orphans().await;
        self.schedule_save();
        drained.len()
    }

    /// Snapshot of all entries, sorted by key
    pub fn entries(&self) -> Vec<CacheEntryInfo> {
        let now = now_ms();
        let snapshot: Vec<(String, CacheEntry)> = self
            .inner
            .state
            .lock()
            .manifest
            .iter()
            .map(|(escaped, entry)| (escaped.clone(), entry.clone()))
            .collect();

        let mut entries: Vec<CacheEntryInfo> = snapshot
            .into_iter()
            .map(|(escaped, entry)| CacheEntryInfo {
                key: unescape_key(&escaped),
                size: std::fs::metadata(self.inner.blob_path(&entry.value))
                    .ok()
                    .map(|m| m.len()),
                expires_at: entry.expires_at(),
                expired: entry.is_expired_at(now),
                blob: entry.value,
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    /// Write a pending manifest update now instead of after the debounce
    pub async fn flush(&self) {
        if self.inner.pending.take() {
            persist(Arc::clone(&self.inner)).await;
        }
    }

    async fn read_fresh(&self, escaped: &str) -> Option<String> {
        let entry = self.inner.state.lock().manifest.get(escaped).cloned()?;
        if entry.is_expired_at(now_ms()) {
            return None;
        }
        self.read_blob(&entry.value).await
    }

    async fn read_any(&self, escaped: &str) -> Option<String> {
        let entry = self.inner.state.lock().manifest.get(escaped).cloned()?;
        self.read_blob(&entry.value).await
    }

    async fn read_blob(&self, blob: &str) -> Option<String> {
        let path = self.inner.blob_path(blob);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Cache blob {} unreadable: {}", path.display(), e);
                None
            }
        }
    }

    /// Write `value` to the key's blob and push its expiry forward
    async fn store(&self, escaped: &str, value: &str) {
        let claim = self.claim_blob(escaped).await;
        let path = self.inner.blob_path(&claim.name);
        let written = replace_file(&path, value.as_bytes()).await;

        {
            let mut state = self.inner.state.lock();
            state.release(escaped, &claim);
            if let Err(e) = written {
                warn!("Failed to write cache blob {}: {}", path.display(), e);
                return;
            }
            let ttl_ms = i64::try_from(self.inner.options.ttl.as_millis()).unwrap_or(i64::MAX);
            let entry = CacheEntry::new(claim.name, now_ms().saturating_add(ttl_ms));
            state.manifest.insert(escaped.to_string(), entry);
        }
        self.schedule_save();
    }

    /// The key's blob name: its existing one, one another renewal of the
    /// same key already reserved, or a fresh random name reserved here
    async fn claim_blob(&self, escaped: &str) -> BlobClaim {
        loop {
            if let Some(claim) = self.inner.state.lock().join(escaped) {
                return claim;
            }

            let candidate = uuid::Uuid::new_v4().simple().to_string();
            // Stat outside the lock; the name is rechecked below
            if tokio::fs::metadata(self.inner.blob_path(&candidate)).await.is_ok() {
                continue;
            }

            let reserved = {
                let mut state = self.inner.state.lock();
                match state.join(escaped) {
                    Some(claim) => Some(claim),
                    None if state.is_taken(&candidate) => None,
                    None => Some(state.reserve(escaped, &candidate)),
                }
            };
            if let Some(claim) = reserved {
                return claim;
            }
        }
    }

    async fn delete_blob(&self, blob: &str) {
        let path = self.inner.blob_path(blob);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove cache blob {}: {}", path.display(), e);
            }
        }
    }

    /// Delete blob files no entry refers to
    async fn remove_orphans(&self) {
        let mut dir = match tokio::fs::read_dir(&self.inner.blob_dir).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!("Failed to list cache blobs: {}", e);
                return;
            }
        };

        let mut orphans = Vec::new();
        while let Ok(Some(entry)) = dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Temp files belong to writes in flight
            if name.starts_with('.') {
                continue;
            }
            if !self.inner.state.lock().is_taken(&name) {
                orphans.push(name);
            }
        }
        for name in orphans {
            debug!("Removing orphaned cache blob {}", name);
            self.delete_blob(&name).await;
        }
    }

    /// Arm the debounce slot and start the delay that may write the manifest
    fn schedule_save(&self) {
        let window = self.inner.options.debounce;
        let target = self.inner.pending.arm(window);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if inner.pending.claim(target) {
                persist(inner).await;
            }
        });
    }
}

impl Drop for ContentCache {
    fn drop(&mut self) {
        // Waits out any write in flight, then writes the final state
        if self.inner.pending.take() {
            self.inner.write_manifest();
        }
    }
}

impl fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentCache")
            .field("dir", &self.inner.options.dir)
            .field("entries", &self.len())
            .field("pending_save", &self.inner.pending.is_pending())
            .finish()
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
