//! Content-addressed cache for synthesized speech.
//!
//! # Layout
//!
//! ```text
//! <cache dir>/
//!   index.json          key → { path, size, createdAt, lastAccessedAt }
//!   <sha256>.mp3        one artifact per key, written with temp-file + rename
//! ```
//!
//! # Behavior
//!
//! - [`TtsCache::resolve`] returns a cached artifact on hit. On miss it
//!   synthesizes once per key no matter how many callers ask concurrently.
//! - Remote audio is stored; local fallback audio is returned as a
//!   single-use artifact and never stored.
//! - After each write, least-recently-used entries are evicted until the
//!   total size fits the budget. Pinned entries are never evicted.
//! - On open, index entries with missing files are dropped and files
//!   without index entries are deleted.
//! - Hits update access times in memory only. They reach `index.json` with
//!   the next store, eviction or [`TtsCache::flush`].

mod index;
mod inflight;
mod key;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use readcast_core::{
    SpeechAudio, SpeechError, SpeechSynthesizer, Synthesized, atomic_write, normalize_text,
};
use serde::Serialize;
use tempfile::TempPath;
use tracing::{debug, info, warn};

pub use index::{CacheEntry, CacheIndex, INDEX_FILE_NAME};
pub use key::CacheKey;

use crate::error::CacheError;
use inflight::{InFlight, Joined};

/// Audio ready to be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Backed by a cache entry; stays on disk until evicted.
    Cached { key: CacheKey, path: PathBuf },
    /// Local fallback output. The consumer deletes it once unloaded.
    SingleUse { path: PathBuf },
}

impl Artifact {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Cached { path, .. } | Self::SingleUse { path } => path,
        }
    }

    #[must_use]
    pub const fn cache_key(&self) -> Option<&CacheKey> {
        match self {
            Self::Cached { key, .. } => Some(key),
            Self::SingleUse { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_single_use(&self) -> bool {
        matches!(self, Self::SingleUse { .. })
    }
}

/// What a flight hands to each of its waiters.
#[derive(Debug, Clone)]
pub(crate) enum Settled {
    Cached { key: CacheKey, path: PathBuf },
    /// Local output shared by the flight's waiters. Each waiter claims its
    /// own file; the shared one is deleted when the last handle drops.
    Local(Arc<TempPath>),
}

/// Turn a flight result into this caller's artifact.
async fn claim(settled: Settled) -> Result<Artifact, CacheError> {
    match settled {
        Settled::Cached { key, path } => Ok(Artifact::Cached { key, path }),
        Settled::Local(shared) => {
            let path = match Arc::try_unwrap(shared) {
                Ok(owned) => owned.keep().map_err(|e| e.error)?,
                Err(shared) => private_copy(&shared).await?,
            };
            Ok(Artifact::SingleUse { path })
        }
    }
}

/// Copy a shared single-use file next to itself under a fresh name.
async fn private_copy(shared: &Path) -> Result<PathBuf, CacheError> {
    let dir = shared.parent().unwrap_or_else(|| Path::new("."));
    let suffix = shared
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let copy = tempfile::Builder::new()
        .prefix("readcast-local-")
        .suffix(&suffix)
        .tempfile_in(dir)?
        .into_temp_path();
    tokio::fs::copy(shared, &copy).await?;
    Ok(copy.keep().map_err(|e| e.error)?)
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub max_bytes: u64,
    pub pinned: usize,
    pub in_flight: usize,
}

struct CacheInner {
    dir: PathBuf,
    max_bytes: u64,
    index: Mutex<CacheIndex>,
    pins: Mutex<HashMap<CacheKey, usize>>,
    inflight: InFlight,
    /// Serializes index writes so an older snapshot never lands last.
    index_write: tokio::sync::Mutex<()>,
    /// The in-memory index has changes `index.json` lacks.
    dirty: AtomicBool,
}

/// Speech artifact cache. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TtsCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for TtsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtsCache")
            .field("dir", &self.inner.dir)
            .field("max_bytes", &self.inner.max_bytes)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl TtsCache {
    /// Open (or create) the cache in `dir` with a byte budget.
    pub async fn open(dir: impl Into<PathBuf>, max_bytes: u64) -> Result<Self, CacheError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut index = CacheIndex::load(&dir.join(INDEX_FILE_NAME))?;
        let missing = index.retain(|_, entry| dir.join(&entry.path).is_file());
        let orphans = remove_orphans(&dir, &index).await?;

        if !missing.is_empty() || orphans > 0 {
            info!(
                dir = %dir.display(),
                missing = missing.len(),
                orphans,
                "Reconciled speech cache with disk"
            );
        }

        let cache = Self {
            inner: Arc::new(CacheInner {
                dir,
                max_bytes,
                index: Mutex::new(index),
                pins: Mutex::new(HashMap::new()),
                inflight: InFlight::default(),
                index_write: tokio::sync::Mutex::new(()),
                dirty: AtomicBool::new(false),
            }),
        };

        cache.evict_with(max_bytes, None).await;
        cache.save_index().await?;
        Ok(cache)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    #[must_use]
    pub fn max_bytes(&self) -> u64 {
        self.inner.max_bytes
    }

    /// Key for `text` spoken with `voice`.
    #[must_use]
    pub fn key_for(text: &str, voice: &str) -> CacheKey {
        CacheKey::for_speech(text, voice)
    }

    // ── Resolve ────────────────────────────────────────────────────────

    /// Return audio for `text` in `voice`, synthesizing on miss.
    ///
    /// Concurrent calls for the same key share one synthesis. Dropping the
    /// returned future releases this caller's interest; the synthesis is
    /// cancelled only when no caller is left waiting.
    pub async fn resolve(
        &self,
        text: &str,
        voice: &str,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Result<Artifact, CacheError> {
        if normalize_text(text).is_empty() {
            return Err(SpeechError::EmptyText.into());
        }

        let key = CacheKey::for_speech(text, voice);
        if let Some(artifact) = self.hit(&key).await {
            return Ok(artifact);
        }

        let settled = match self.inner.inflight.join(&key) {
            Joined::Follower { waiter } => {
                debug!(key = %key, "Joining in-flight synthesis");
                waiter.wait().await?
            }
            Joined::Leader {
                waiter,
                flight_id,
                cancel,
            } => {
                // A flight may have finished between the lookup and the join.
                if let Some(artifact) = self.hit(&key).await {
                    let settled = Settled::Cached {
                        key: key.clone(),
                        path: artifact.path().to_path_buf(),
                    };
                    let _ = self.inner.inflight.complete(&key, flight_id, Ok(settled));
                    return Ok(artifact);
                }

                debug!(key = %key, "Cache miss, starting synthesis");
                let cache = self.clone();
                let text = text.to_string();
                let voice = voice.to_string();
                tokio::spawn(async move {
                    let synthesized = tokio::select! {
                        () = cancel.cancelled() => {
                            debug!(key = %key, "Synthesis cancelled");
                            return;
                        }
                        result = synthesizer.synthesize(&text, &voice) => result,
                    };
                    let outcome = cache.settle(&key, synthesized).await;
                    // Unclaimed local audio is deleted when the outcome drops.
                    if !cache.inner.inflight.complete(&key, flight_id, outcome) {
                        debug!(key = %key, "No waiter left for synthesis result");
                    }
                });

                waiter.wait().await?
            }
        };
        claim(settled).await
    }

    async fn settle(
        &self,
        key: &CacheKey,
        synthesized: Result<Synthesized, SpeechError>,
    ) -> Result<Settled, CacheError> {
        match synthesized? {
            Synthesized::Remote(audio) => {
                let path = self.store(key, audio).await?;
                Ok(Settled::Cached {
                    key: key.clone(),
                    path,
                })
            }
            Synthesized::Local(local) => {
                debug!(key = %key, path = %local.path.display(), "Local fallback audio is single-use");
                Ok(Settled::Local(Arc::new(TempPath::from_path(local.path))))
            }
        }
    }

    /// Cache hit: touch the entry and return it. An entry whose file has
    /// disappeared is dropped and reported as a miss.
    async fn hit(&self, key: &CacheKey) -> Option<Artifact> {
        let path = {
            let mut index = lock(&self.inner.index);
            let path = self.inner.dir.join(&index.get(key)?.path);
            if !path.is_file() {
                warn!(key = %key, "Cached artifact vanished from disk");
                index.remove(key);
                self.inner.dirty.store(true, Ordering::SeqCst);
                return None;
            }
            index.touch(key, Utc::now());
            path
        };

        self.inner.dirty.store(true, Ordering::SeqCst);
        debug!(key = %key, "Cache hit");
        Some(Artifact::Cached {
            key: key.clone(),
            path,
        })
    }

    // ── Direct operations ──────────────────────────────────────────────

    /// Path of the artifact for `key`, without touching it.
    #[must_use]
    pub fn lookup(&self, key: &CacheKey) -> Option<PathBuf> {
        let index = lock(&self.inner.index);
        index.get(key).map(|entry| self.inner.dir.join(&entry.path))
    }

    /// Store remote audio under `key` and return its path.
    ///
    /// Entries are immutable: storing an existing key keeps the first
    /// artifact. Eviction runs afterwards and never removes the new entry.
    pub async fn store(&self, key: &CacheKey, audio: SpeechAudio) -> Result<PathBuf, CacheError> {
        if let Some(path) = self.lookup(key)
            && path.is_file()
        {
            return Ok(path);
        }

        let file_name = key.file_name(audio.format);
        let path = self.inner.dir.join(&file_name);
        let size = audio.bytes.len() as u64;

        let target = path.clone();
        let bytes = audio.bytes;
        tokio::task::spawn_blocking(move || atomic_write(&target, &bytes))
            .await
            .map_err(|e| CacheError::Io {
                kind: "Other".to_string(),
                message: e.to_string(),
            })??;

        let now = Utc::now();
        lock(&self.inner.index).insert(
            key.clone(),
            CacheEntry {
                path: file_name,
                size,
                created_at: now,
                last_accessed_at: now,
            },
        );
        debug!(key = %key, size, "Stored speech artifact");

        self.evict_with(self.inner.max_bytes, Some(key)).await;
        self.save_index().await?;
        Ok(path)
    }

    /// Evict least-recently-used, unpinned entries until the total size is
    /// within `max_bytes`. Returns the evicted keys.
    pub async fn evict_lru(&self, max_bytes: u64) -> Result<Vec<CacheKey>, CacheError> {
        let evicted = self.evict_with(max_bytes, None).await;
        if !evicted.is_empty() {
            self.save_index().await?;
        }
        Ok(evicted)
    }

    async fn evict_with(&self, max_bytes: u64, keep: Option<&CacheKey>) -> Vec<CacheKey> {
        let mut protected: HashSet<CacheKey> = lock(&self.inner.pins).keys().cloned().collect();
        if let Some(key) = keep {
            protected.insert(key.clone());
        }

        let (victims, removed) = {
            let mut index = lock(&self.inner.index);
            let victims = index.lru_victims(max_bytes, &protected);
            let removed: Vec<CacheEntry> = victims.iter().filter_map(|k| index.remove(k)).collect();
            (victims, removed)
        };

        for entry in &removed {
            match tokio::fs::remove_file(self.inner.dir.join(&entry.path)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %entry.path, error = %e, "Failed to delete evicted artifact"),
            }
        }

        if !victims.is_empty() {
            let freed: u64 = removed.iter().map(|e| e.size).sum();
            info!(count = victims.len(), freed, max_bytes, "LRU eviction");
        }
        victims
    }

    /// Protect `key` from eviction. Pins are counted; each pin needs an unpin.
    pub fn pin(&self, key: &CacheKey) {
        *lock(&self.inner.pins).entry(key.clone()).or_insert(0) += 1;
    }

    pub fn unpin(&self, key: &CacheKey) {
        let mut pins = lock(&self.inner.pins);
        if let Some(count) = pins.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                pins.remove(key);
            }
        }
    }

    #[must_use]
    pub fn is_pinned(&self, key: &CacheKey) -> bool {
        lock(&self.inner.pins).contains_key(key)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let (entries, total_bytes) = {
            let index = lock(&self.inner.index);
            (index.len(), index.total_bytes())
        };
        CacheStats {
            entries,
            total_bytes,
            max_bytes: self.inner.max_bytes,
            pinned: lock(&self.inner.pins).len(),
            in_flight: self.inner.inflight.len(),
        }
    }

    /// Write the index if hits changed it since the last write.
    pub async fn flush(&self) -> Result<(), CacheError> {
        if self.inner.dirty.load(Ordering::SeqCst) {
            self.save_index().await?;
        }
        Ok(())
    }

    /// Write the index to disk.
    pub async fn save_index(&self) -> Result<(), CacheError> {
        let _guard = self.inner.index_write.lock().await;
        self.inner.dirty.store(false, Ordering::SeqCst);
        let snapshot = lock(&self.inner.index).clone();
        let path = self.inner.dir.join(INDEX_FILE_NAME);
        tokio::task::spawn_blocking(move || snapshot.save(&path))
            .await
            .map_err(|e| CacheError::Index(e.to_string()))?
    }
}

/// Delete files in `dir` that the index does not reference.
async fn remove_orphans(dir: &Path, index: &CacheIndex) -> Result<usize, CacheError> {
    let known: HashSet<&str> = index.iter().map(|(_, e)| e.path.as_str()).collect();
    let mut removed = 0;

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == INDEX_FILE_NAME || known.contains(name.as_ref()) {
            continue;
        }
        if entry.file_type().await?.is_file() {
            debug!(file = %name, "Removing orphan cache file");
            tokio::fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    Ok(removed)
}
