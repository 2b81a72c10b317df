//! Content-addressed on-disk cache for posters and other media.
//!
//! Blobs live in one directory as `<sha256(url)>.bin`, with `index.json`
//! tracking size, store time and a logical last-access clock. Concurrent
//! requests for the same URL share one download. When the total size goes
//! over budget, least recently accessed blobs are removed first; blobs
//! with a download in flight are never evicted.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anisync_client::MediaSource;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::FetchError;

/// Index format version. Bump to discard incompatible indexes on open.
const INDEX_VERSION: u32 = 1;
const INDEX_FILE: &str = "index.json";

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Vec<u8>>, FetchError>>>;

/// Content-address of a source URL.
pub fn cache_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Where and how much to cache.
#[derive(Debug, Clone)]
pub struct ImageCacheConfig {
    pub dir: PathBuf,
    pub budget_bytes: u64,
    /// Entries older than this are fetched again on access.
    pub max_age: Option<Duration>,
}

impl ImageCacheConfig {
    pub fn new(dir: impl Into<PathBuf>, budget_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            budget_bytes,
            max_age: None,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

/// Size and usage numbers for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub budget_bytes: u64,
    /// Downloads issued since the cache was opened.
    pub fetches: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    url: String,
    size: u64,
    /// Unix milliseconds.
    stored_at: i64,
    /// Logical clock value of the last access.
    last_access: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    tick: u64,
    #[serde(default)]
    entries: HashMap<String, IndexEntry>,
}

struct State {
    index: IndexFile,
    total: u64,
    budget: u64,
    inflight: HashMap<String, SharedFetch>,
}

impl State {
    fn next_tick(&mut self) -> u64 {
        self.index.tick += 1;
        self.index.tick
    }

    fn remove(&mut self, key: &str) -> Option<IndexEntry> {
        let entry = self.index.entries.remove(key)?;
        self.total = self.total.saturating_sub(entry.size);
        Some(entry)
    }

    /// Drop entries until the total fits the budget. Returns removed keys.
    fn evict(&mut self) -> Vec<String> {
        let inflight: HashSet<&str> = self.inflight.keys().map(String::as_str).collect();
        let victims = select_evictions(&self.index.entries, &inflight, self.total, self.budget);
        for key in &victims {
            self.remove(key);
        }
        victims
    }
}

/// Pick keys to evict, oldest access first, skipping in-flight keys, until
/// `total` is within `budget`.
fn select_evictions(
    entries: &HashMap<String, IndexEntry>,
    inflight: &HashSet<&str>,
    mut total: u64,
    budget: u64,
) -> Vec<String> {
    if total <= budget {
        return Vec::new();
    }
    let mut candidates: Vec<(&String, &IndexEntry)> = entries
        .iter()
        .filter(|(key, _)| !inflight.contains(key.as_str()))
        .collect();
    candidates.sort_by_key(|(_, e)| e.last_access);

    let mut victims = Vec::new();
    for (key, entry) in candidates {
        if total <= budget {
            break;
        }
        total = total.saturating_sub(entry.size);
        victims.push(key.clone());
    }
    victims
}

enum Lookup {
    Cached,
    Pending(SharedFetch),
}

struct Inner {
    dir: PathBuf,
    max_age: Option<Duration>,
    source: Arc<dyn MediaSource>,
    state: Mutex<State>,
    persist_lock: tokio::sync::Mutex<()>,
    fetches: AtomicU64,
}

impl Inner {
    fn lock(&self) -> Result<MutexGuard<'_, State>, FetchError> {
        self.state
            .lock()
            .map_err(|_| FetchError::Io("image cache lock poisoned".to_string()))
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.bin"))
    }

    fn is_expired(&self, entry: &IndexEntry) -> bool {
        match self.max_age {
            Some(max_age) => {
                let age_ms = now_millis().saturating_sub(entry.stored_at);
                age_ms > max_age.as_millis() as i64
            }
            None => false,
        }
    }

    /// Delete blob files for keys that are neither indexed nor downloading.
    ///
    /// Callers hold the state lock, so no new download of the same key can
    /// write its blob between the check and the unlink.
    fn delete_blobs(&self, state: &State, keys: &[String]) {
        for key in keys {
            if state.index.entries.contains_key(key) || state.inflight.contains_key(key) {
                continue;
            }
            if let Err(e) = std::fs::remove_file(self.blob_path(key)) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to remove cached blob {}: {}", key, e);
                }
            }
        }
    }

    async fn persist_index(&self) {
        let _guard = self.persist_lock.lock().await;
        let json = match self.lock() {
            Ok(state) => serde_json::to_vec_pretty(&state.index),
            Err(_) => return,
        };
        let json = match json {
            Ok(j) => j,
            Err(e) => {
                log::warn!("Failed to serialize image cache index: {}", e);
                return;
            }
        };
        let path = self.dir.join(INDEX_FILE);
        let tmp = self.dir.join(format!("{INDEX_FILE}.tmp"));
        let result = async {
            tokio::fs::write(&tmp, &json).await?;
            tokio::fs::rename(&tmp, &path).await
        }
        .await;
        if let Err(e) = result {
            log::warn!("Failed to write image cache index: {}", e);
        }
    }

    /// Download, store and index a blob. Always clears the in-flight slot.
    async fn fetch_and_store(self: Arc<Self>, url: String, key: String) -> Result<Arc<Vec<u8>>, FetchError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        log::debug!("Fetching {}", url);

        let result = match self.source.fetch_media(&url).await {
            Ok(bytes) => self.write_blob(&key, bytes).await,
            Err(e) => Err(FetchError::from(e)),
        };

        let (stored, evicted) = {
            let mut state = self.lock()?;
            let mut evicted = Vec::new();
            let stored = match &result {
                Ok(bytes) => {
                    let size = bytes.len() as u64;
                    // Replace any stale copy.
                    state.remove(&key);
                    if size <= state.budget {
                        let tick = state.next_tick();
                        state.index.entries.insert(
                            key.clone(),
                            IndexEntry {
                                url: url.clone(),
                                size,
                                stored_at: now_millis(),
                                last_access: tick,
                            },
                        );
                        state.total += size;
                        true
                    } else {
                        evicted.push(key.clone());
                        false
                    }
                }
                Err(_) => false,
            };
            state.inflight.remove(&key);
            evicted.extend(state.evict());
            self.delete_blobs(&state, &evicted);
            (stored, evicted)
        };

        match &result {
            Ok(bytes) if !stored => log::debug!(
                "Not caching {} ({} bytes exceeds budget)",
                url,
                bytes.len()
            ),
            Err(e) => log::debug!("Fetch of {} failed: {}", url, e),
            _ => {}
        }

        if stored || !evicted.is_empty() {
            self.persist_index().await;
        }
        result
    }

    async fn write_blob(&self, key: &str, bytes: Vec<u8>) -> Result<Arc<Vec<u8>>, FetchError> {
        let path = self.blob_path(key);
        let tmp = self.dir.join(format!("{key}.part"));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| FetchError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| FetchError::Io(e.to_string()))?;
        Ok(Arc::new(bytes))
    }
}

/// Shared handle to the image cache. Cheap to clone.
#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("dir", &self.inner.dir)
            .finish()
    }
}

impl ImageCache {
    /// Open (or create) a cache directory and reconcile it with its index.
    ///
    /// Index entries whose blob is missing are dropped, blobs with no index
    /// entry are deleted, and the result is trimmed to the budget.
    pub fn open(config: ImageCacheConfig, source: Arc<dyn MediaSource>) -> Result<Self, FetchError> {
        std::fs::create_dir_all(&config.dir).map_err(|e| FetchError::Io(e.to_string()))?;
        let mut index = load_index(&config.dir);

        index.entries.retain(|key, entry| {
            match std::fs::metadata(config.dir.join(format!("{key}.bin"))) {
                Ok(meta) => {
                    entry.size = meta.len();
                    true
                }
                Err(_) => false,
            }
        });
        remove_orphans(&config.dir, &index);

        let total = index.entries.values().map(|e| e.size).sum();
        let mut state = State {
            index,
            total,
            budget: config.budget_bytes,
            inflight: HashMap::new(),
        };
        let evicted = state.evict();
        for key in &evicted {
            let _ = std::fs::remove_file(config.dir.join(format!("{key}.bin")));
        }
        log::debug!(
            "Opened image cache at {} ({} entries, {} bytes)",
            config.dir.display(),
            state.index.entries.len(),
            state.total
        );

        Ok(Self {
            inner: Arc::new(Inner {
                dir: config.dir,
                max_age: config.max_age,
                source,
                state: Mutex::new(state),
                persist_lock: tokio::sync::Mutex::new(()),
                fetches: AtomicU64::new(0),
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Return cached bytes for `url`, downloading them on a miss.
    ///
    /// At most one download per URL runs at a time; concurrent callers wait
    /// for the same result. A failed download is reported to every waiter
    /// and nothing is cached.
    pub async fn get_or_fetch(&self, url: &str) -> Result<Arc<Vec<u8>>, FetchError> {
        let key = cache_key(url);
        loop {
            match self.lookup(url, &key)? {
                Lookup::Cached => match tokio::fs::read(self.inner.blob_path(&key)).await {
                    Ok(bytes) => return Ok(Arc::new(bytes)),
                    Err(e) => {
                        log::debug!("Cached blob {} unreadable, refetching: {}", key, e);
                        let mut state = self.inner.lock()?;
                        if !state.inflight.contains_key(&key) {
                            state.remove(&key);
                        }
                    }
                },
                Lookup::Pending(fetch) => return fetch.await,
            }
        }
    }

    /// Decide under one lock whether `key` is served from disk, joins a
    /// running download or starts a new one.
    fn lookup(&self, url: &str, key: &str) -> Result<Lookup, FetchError> {
        let mut state = self.inner.lock()?;
        if let Some(fetch) = state.inflight.get(key) {
            return Ok(Lookup::Pending(fetch.clone()));
        }
        let fresh = match state.index.entries.get(key) {
            Some(entry) => !self.inner.is_expired(entry),
            None => false,
        };
        if fresh {
            let tick = state.next_tick();
            if let Some(entry) = state.index.entries.get_mut(key) {
                entry.last_access = tick;
            }
            return Ok(Lookup::Cached);
        }

        let task = tokio::spawn(
            Arc::clone(&self.inner).fetch_and_store(url.to_string(), key.to_string()),
        );
        let fetch = task
            .map(|joined| joined.unwrap_or(Err(FetchError::Aborted)))
            .boxed()
            .shared();
        state.inflight.insert(key.to_string(), fetch.clone());
        Ok(Lookup::Pending(fetch))
    }

    /// Whether `url` currently has a cached blob.
    pub fn contains(&self, url: &str) -> bool {
        self.inner
            .lock()
            .map(|s| s.index.entries.contains_key(&cache_key(url)))
            .unwrap_or(false)
    }

    pub fn stats(&self) -> CacheStats {
        let fetches = self.inner.fetches.load(Ordering::Relaxed);
        match self.inner.lock() {
            Ok(state) => CacheStats {
                entries: state.index.entries.len(),
                total_bytes: state.total,
                budget_bytes: state.budget,
                fetches,
            },
            Err(_) => CacheStats {
                fetches,
                ..CacheStats::default()
            },
        }
    }

    /// Change the budget, evicting immediately if the cache is now over it.
    pub async fn set_budget(&self, budget_bytes: u64) -> Result<(), FetchError> {
        {
            let mut state = self.inner.lock()?;
            state.budget = budget_bytes;
            let evicted = state.evict();
            self.inner.delete_blobs(&state, &evicted);
        }
        self.inner.persist_index().await;
        Ok(())
    }

    /// Remove every blob that has no download in flight. Returns bytes freed.
    pub async fn clear(&self) -> Result<u64, FetchError> {
        let freed = {
            let mut state = self.inner.lock()?;
            let keys: Vec<String> = state
                .index
                .entries
                .keys()
                .filter(|k| !state.inflight.contains_key(*k))
                .cloned()
                .collect();
            let mut freed = 0;
            for key in &keys {
                if let Some(entry) = state.remove(key) {
                    freed += entry.size;
                }
            }
            self.inner.delete_blobs(&state, &keys);
            freed
        };
        self.inner.persist_index().await;
        Ok(freed)
    }

    /// Write the index, including access order from cache hits.
    pub async fn save_index(&self) {
        self.inner.persist_index().await;
    }
}

fn load_index(dir: &Path) -> IndexFile {
    let path = dir.join(INDEX_FILE);
    let contents = match std::fs::read(&path) {
        Ok(c) => c,
        Err(_) => return fresh_index(),
    };
    match serde_json::from_slice::<IndexFile>(&contents) {
        Ok(index) if index.version == INDEX_VERSION => index,
        Ok(_) => {
            log::info!("Image cache index version changed, starting fresh");
            fresh_index()
        }
        Err(e) => {
            log::warn!("Ignoring corrupt image cache index: {}", e);
            fresh_index()
        }
    }
}

fn fresh_index() -> IndexFile {
    IndexFile {
        version: INDEX_VERSION,
        ..IndexFile::default()
    }
}

/// Delete `.bin`/`.part` files the index does not know about.
fn remove_orphans(dir: &Path, index: &IndexFile) {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str());
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let orphan = match ext {
            Some("bin") => !index.entries.contains_key(stem),
            Some("part") => true,
            _ => false,
        };
        if orphan {
            let _ = std::fs::remove_file(&path);
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(size: u64, last_access: u64) -> IndexEntry {
        IndexEntry {
            url: String::new(),
            size,
            stored_at: 0,
            last_access,
        }
    }

    #[test]
    fn cache_key_is_stable_hex_sha256() {
        let key = cache_key("https://static.wwnd.space/posters/1.jpg");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, cache_key("https://static.wwnd.space/posters/1.jpg"));
        assert_ne!(key, cache_key("https://static.wwnd.space/posters/2.jpg"));
    }

    #[test]
    fn evicts_least_recently_accessed_first() {
        let entries: HashMap<String, IndexEntry> = [
            ("a".to_string(), entry(100, 3)),
            ("b".to_string(), entry(100, 1)),
            ("c".to_string(), entry(100, 2)),
        ]
        .into();
        let victims = select_evictions(&entries, &HashSet::new(), 300, 150);
        assert_eq!(victims, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn never_evicts_in_flight_keys() {
        let entries: HashMap<String, IndexEntry> = [
            ("a".to_string(), entry(100, 1)),
            ("b".to_string(), entry(100, 2)),
        ]
        .into();
        let inflight: HashSet<&str> = ["a"].into();
        let victims = select_evictions(&entries, &inflight, 200, 100);
        assert_eq!(victims, vec!["b".to_string()]);
    }

    #[test]
    fn nothing_to_evict_under_budget() {
        let entries: HashMap<String, IndexEntry> = [("a".to_string(), entry(100, 1))].into();
        assert!(select_evictions(&entries, &HashSet::new(), 100, 100).is_empty());
    }
}
