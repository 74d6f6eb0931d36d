//! On-disk cache index and LRU selection.
//!
//! `index.json` maps each key to its artifact file, size and timestamps. The
//! index is the source of truth for eviction; artifacts on disk without an
//! index entry are orphans and are removed when the cache opens.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use readcast_core::atomic_write;
use serde::{Deserialize, Serialize};

use super::key::CacheKey;
use crate::error::CacheError;

/// Index file name inside the cache directory.
pub const INDEX_FILE_NAME: &str = "index.json";

const INDEX_VERSION: u32 = 1;

/// One cached artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Artifact file name relative to the cache directory.
    pub path: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

/// Key → entry map with its schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheIndex {
    version: u32,
    entries: BTreeMap<CacheKey, CacheEntry>,
}

impl Default for CacheIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl CacheIndex {
    /// Read the index at `path`.
    ///
    /// A missing file is an empty index. A corrupt file is logged and
    /// treated as empty; the artifacts it described become orphans and are
    /// swept by the caller.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(CacheError::from_io_error(&e)),
        };

        match serde_json::from_str::<Self>(&content) {
            Ok(index) => Ok(index),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cache index is corrupt, starting empty");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| CacheError::Index(e.to_string()))?;
        atomic_write(path, &json).map_err(|e| CacheError::from_io_error(&e))
    }

    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: CacheKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    /// Bump the access time. Returns `false` for unknown keys.
    pub fn touch(&mut self, key: &CacheKey, now: DateTime<Utc>) -> bool {
        self.entries.get_mut(key).is_some_and(|entry| {
            entry.last_accessed_at = now;
            true
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CacheKey, &CacheEntry)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }

    /// Keep only entries for which `keep` returns true; returns the dropped keys.
    pub fn retain(&mut self, mut keep: impl FnMut(&CacheKey, &CacheEntry) -> bool) -> Vec<CacheKey> {
        let mut dropped = Vec::new();
        self.entries.retain(|key, entry| {
            let kept = keep(key, entry);
            if !kept {
                dropped.push(key.clone());
            }
            kept
        });
        dropped
    }

    /// Keys to evict, least recently used first, until the total fits in
    /// `max_bytes`. Keys in `protected` are never chosen, so the result may
    /// leave the cache over budget when protected entries alone exceed it.
    #[must_use]
    pub fn lru_victims(&self, max_bytes: u64, protected: &HashSet<CacheKey>) -> Vec<CacheKey> {
        let mut total = self.total_bytes();
        if total <= max_bytes {
            return Vec::new();
        }

        let mut candidates: Vec<_> = self
            .entries
            .iter()
            .filter(|(key, _)| !protected.contains(*key))
            .collect();
        candidates.sort_by(|(ka, a), (kb, b)| {
            a.last_accessed_at
                .cmp(&b.last_accessed_at)
                .then_with(|| ka.cmp(kb))
        });

        let mut victims = Vec::new();
        for (key, entry) in candidates {
            if total <= max_bytes {
                break;
            }
            total = total.saturating_sub(entry.size);
            victims.push(key.clone());
        }
        victims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(size: u64, age_secs: i64) -> CacheEntry {
        let at = Utc::now() - Duration::seconds(age_secs);
        CacheEntry {
            path: String::new(),
            size,
            created_at: at,
            last_accessed_at: at,
        }
    }

    fn key(n: u8) -> CacheKey {
        CacheKey::for_speech(&n.to_string(), "v")
    }

    #[test]
    fn test_lru_victims_oldest_first() {
        let mut index = CacheIndex::default();
        index.insert(key(1), entry(4, 30));
        index.insert(key(2), entry(4, 20));
        index.insert(key(3), entry(4, 10));

        assert!(index.lru_victims(12, &HashSet::new()).is_empty());
        assert_eq!(index.lru_victims(8, &HashSet::new()), vec![key(1)]);
        assert_eq!(index.lru_victims(4, &HashSet::new()), vec![key(1), key(2)]);
    }

    #[test]
    fn test_lru_victims_skip_protected() {
        let mut index = CacheIndex::default();
        index.insert(key(1), entry(4, 30));
        index.insert(key(2), entry(4, 20));
        index.insert(key(3), entry(4, 10));

        let protected = HashSet::from([key(1)]);
        assert_eq!(index.lru_victims(8, &protected), vec![key(2)]);
        assert_eq!(index.lru_victims(0, &protected), vec![key(2), key(3)]);
    }

    #[test]
    fn test_touch_moves_to_back() {
        let mut index = CacheIndex::default();
        index.insert(key(1), entry(4, 30));
        index.insert(key(2), entry(4, 20));
        assert!(index.touch(&key(1), Utc::now()));
        assert_eq!(index.lru_victims(4, &HashSet::new()), vec![key(2)]);
        assert!(!index.touch(&key(9), Utc::now()));
    }

    #[test]
    fn test_load_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(INDEX_FILE_NAME);
        assert!(CacheIndex::load(&path).unwrap().is_empty());

        std::fs::write(&path, b"{not json").unwrap();
        assert!(CacheIndex::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(INDEX_FILE_NAME);
        let mut index = CacheIndex::default();
        index.insert(key(1), entry(10, 5));
        index.save(&path).unwrap();
        assert_eq!(CacheIndex::load(&path).unwrap(), index);
    }
}
