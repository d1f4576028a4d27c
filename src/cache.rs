//! Resolution cache: fetched version sets, keyed by package identity
//!
//! One package name commonly appears in several dependency sections of a
//! manifest, so concurrent misses for the same key collapse into a single
//! registry fetch (per-key async lock; later callers await the first
//! requester's in-flight result). Entries expire by TTL on read; stale
//! entries are treated as misses and refetched, never proactively
//! evicted. The cache is an explicit object with a load/flush lifecycle,
//! so tests can inject an empty or pre-seeded instance.

use crate::domain::VersionSet;
use crate::error::{CacheError, RegistryError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Identity of a cached package: name plus registry context
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub package: String,
    pub registry: String,
}

impl CacheKey {
    pub fn new(package: impl Into<String>, registry: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// Stable string form used for persistence
    fn as_string(&self) -> String {
        format!("{}::{}", self.registry, self.package)
    }
}

/// One cached fetch result with its timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub set: VersionSet,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(set: VersionSet) -> Self {
        Self {
            set,
            fetched_at: Utc::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.fetched_at);
        age.to_std().map(|age| age <= ttl).unwrap_or(true)
    }
}

/// External persistence of cache entries between runs
pub trait CacheStore: Send + Sync {
    fn load(&self) -> Result<HashMap<String, CacheEntry>, CacheError>;
    fn store(&self, entries: &HashMap<String, CacheEntry>) -> Result<(), CacheError>;
}

/// JSON file backed store
pub struct FileCacheStore {
    path: PathBuf,
}

impl FileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self) -> Result<HashMap<String, CacheEntry>, CacheError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| CacheError::LoadError {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| CacheError::LoadError {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn store(&self, entries: &HashMap<String, CacheEntry>) -> Result<(), CacheError> {
        let json =
            serde_json::to_string(entries).map_err(|e| CacheError::StoreError {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::StoreError {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        }
        std::fs::write(&self.path, json).map_err(|e| CacheError::StoreError {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// TTL-bounded cache of version sets with single-flight fetch dedup
pub struct ResolutionCache {
    ttl: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl ResolutionCache {
    /// Create an empty cache with the given entry lifetime
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a fresh entry; a stale entry reads as a miss
    pub async fn get(&self, key: &CacheKey) -> Option<VersionSet> {
        let slot = {
            let slots = self.slots.lock().await;
            slots.get(&key.as_string())?.clone()
        };
        let guard = slot.lock().await;
        guard
            .as_ref()
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.set.clone())
    }

    /// Insert or replace the entry for a key
    pub async fn put(&self, key: &CacheKey, set: VersionSet) {
        let slot = self.slot_for(key).await;
        let mut guard = slot.lock().await;
        *guard = Some(CacheEntry::new(set));
    }

    /// Return the cached set or run `fetch` exactly once for concurrent
    /// callers of the same key. Failures are not cached; the next caller
    /// retries.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &CacheKey,
        fetch: F,
    ) -> Result<VersionSet, RegistryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<VersionSet, RegistryError>>,
    {
        let slot = self.slot_for(key).await;
        // Holding the per-key lock across the fetch is what makes later
        // callers wait on the first in-flight request instead of issuing
        // their own.
        let mut guard = slot.lock().await;
        if let Some(entry) = guard.as_ref() {
            if entry.is_fresh(self.ttl) {
                return Ok(entry.set.clone());
            }
        }
        let set = fetch().await?;
        *guard = Some(CacheEntry::new(set.clone()));
        Ok(set)
    }

    /// Replace the cache contents from a persisted store
    pub async fn load_from(&self, store: &dyn CacheStore) -> Result<usize, CacheError> {
        let entries = store.load()?;
        let count = entries.len();
        let mut slots = self.slots.lock().await;
        slots.clear();
        for (key, entry) in entries {
            slots.insert(key, Arc::new(Mutex::new(Some(entry))));
        }
        Ok(count)
    }

    /// Persist all populated entries (stale ones included; they expire on
    /// read, not on write)
    pub async fn flush_to(&self, store: &dyn CacheStore) -> Result<usize, CacheError> {
        let slots: Vec<(String, Slot)> = {
            let map = self.slots.lock().await;
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        let mut entries = HashMap::new();
        for (key, slot) in slots {
            let guard = slot.lock().await;
            if let Some(entry) = guard.as_ref() {
                entries.insert(key, entry.clone());
            }
        }
        let count = entries.len();
        store.store(&entries)?;
        Ok(count)
    }

    async fn slot_for(&self, key: &CacheKey) -> Slot {
        let mut slots = self.slots.lock().await;
        slots
            .entry(key.as_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_set(name: &str) -> VersionSet {
        VersionSet::new(
            name,
            vec!["1.0.0".to_string(), "2.0.0".to_string()],
            BTreeMap::new(),
            BTreeSet::new(),
        )
    }

    fn key(package: &str) -> CacheKey {
        CacheKey::new(package, "https://registry.npmjs.org")
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = ResolutionCache::new(Duration::from_secs(3600));
        cache.put(&key("lodash"), sample_set("lodash")).await;
        let hit = cache.get(&key("lodash")).await.unwrap();
        assert_eq!(hit.name, "lodash");
    }

    #[tokio::test]
    async fn test_miss_for_unknown_key() {
        let cache = ResolutionCache::new(Duration::from_secs(3600));
        assert!(cache.get(&key("unknown")).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_reads_as_miss() {
        let cache = ResolutionCache::new(Duration::from_secs(0));
        cache.put(&key("lodash"), sample_set("lodash")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.get(&key("lodash")).await.is_none());
    }

    #[tokio::test]
    async fn test_registry_identity_is_part_of_the_key() {
        let cache = ResolutionCache::new(Duration::from_secs(3600));
        cache.put(&key("lodash"), sample_set("lodash")).await;
        let other = CacheKey::new("lodash", "https://registry.example.com");
        assert!(cache.get(&other).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_lookups_fetch_once() {
        let cache = Arc::new(ResolutionCache::new(Duration::from_secs(3600)));
        let fetches = Arc::new(AtomicUsize::new(0));

        let fetch = |fetches: Arc<AtomicUsize>| async move {
            fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(sample_set("lodash"))
        };

        let k = key("lodash");
        let (a, b) = tokio::join!(
            cache.get_or_fetch(&k, || fetch(fetches.clone())),
            cache.get_or_fetch(&k, || fetch(fetches.clone())),
        );

        assert_eq!(a.unwrap().name, "lodash");
        assert_eq!(b.unwrap().name, "lodash");
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let cache = ResolutionCache::new(Duration::from_secs(3600));
        let k = key("flaky");

        let failed: Result<VersionSet, RegistryError> = cache
            .get_or_fetch(&k, || async {
                Err(crate::error::RegistryError::timeout("flaky", "npm"))
            })
            .await;
        assert!(failed.is_err());

        // Next caller retries and succeeds
        let ok = cache
            .get_or_fetch(&k, || async { Ok(sample_set("flaky")) })
            .await
            .unwrap();
        assert_eq!(ok.name, "flaky");
    }

    #[tokio::test]
    async fn test_stale_entry_is_refetched() {
        let cache = ResolutionCache::new(Duration::from_secs(0));
        let k = key("stale");
        cache.put(&k, sample_set("stale")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let fetches = Arc::new(AtomicUsize::new(0));
        let fetches2 = fetches.clone();
        let _ = cache
            .get_or_fetch(&k, || async move {
                fetches2.fetch_add(1, Ordering::SeqCst);
                Ok(sample_set("stale"))
            })
            .await
            .unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_flush_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path().join("cache.json"));

        let cache = ResolutionCache::new(Duration::from_secs(3600));
        cache.put(&key("lodash"), sample_set("lodash")).await;
        cache.put(&key("react"), sample_set("react")).await;
        assert_eq!(cache.flush_to(&store).await.unwrap(), 2);

        let restored = ResolutionCache::new(Duration::from_secs(3600));
        assert_eq!(restored.load_from(&store).await.unwrap(), 2);
        assert_eq!(restored.get(&key("react")).await.unwrap().name, "react");
    }

    #[tokio::test]
    async fn test_load_from_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path().join("absent.json"));
        let cache = ResolutionCache::new(Duration::from_secs(3600));
        assert_eq!(cache.load_from(&store).await.unwrap(), 0);
    }
}
