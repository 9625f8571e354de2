//! Cache storage.
//!
//! [`Cache`] is the seam pipelines talk to; [`MemoryCache`] is the in-process
//! implementation with an explicit eviction policy.

use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};

use lru::LruCache;
use metrics::counter;
use tracing::{debug, trace};

use super::keys::CacheKey;
use super::lock::{read, write};
use super::value::CacheValue;

const SOURCE: &str = "caching::store";

pub const METRIC_CACHE_HIT: &str = "cachepipe_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "cachepipe_cache_miss_total";
pub const METRIC_CACHE_STORE: &str = "cachepipe_cache_store_total";
pub const METRIC_CACHE_EVICT: &str = "cachepipe_cache_evict_total";

/// Thread-safe key → value store shared by every run of a pipeline.
///
/// Implementors supply the raw hooks; lookups through [`Cache::get`] also
/// check that the stored value is still valid for the requested key.
pub trait Cache: Send + Sync {
    /// Raw lookup by identity, ignoring validity.
    fn retrieve(&self, key: &CacheKey) -> Option<Arc<CacheValue>>;

    /// Raw insert; replaces any value stored under an equal key.
    fn store(&self, key: CacheKey, value: Arc<CacheValue>);

    fn remove(&self, key: &CacheKey) -> Option<Arc<CacheValue>>;

    fn clear(&self);

    fn keys(&self) -> Vec<CacheKey>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, key: &CacheKey) -> Option<Arc<CacheValue>> {
        self.get_with(key, false)
    }

    /// Look up `key`; unless `include_invalid`, values that are no longer
    /// valid for `key` are reported as absent. Invalid values are never evicted here.
    fn get_with(&self, key: &CacheKey, include_invalid: bool) -> Option<Arc<CacheValue>> {
        let Some(value) = self.retrieve(key) else {
            counter!(METRIC_CACHE_MISS, "reason" => "absent").increment(1);
            return None;
        };

        if include_invalid || value.is_valid(key) {
            let group = value.group().unwrap_or("default").to_owned();
            counter!(METRIC_CACHE_HIT, "group" => group).increment(1);
            return Some(value);
        }

        debug!(key = %key, stored = %value.key(), "Stored value is no longer valid");
        counter!(METRIC_CACHE_MISS, "reason" => "invalid").increment(1);
        None
    }

    fn put(&self, key: CacheKey, value: CacheValue) {
        let group = value.group().unwrap_or("default").to_owned();
        self.store(key, Arc::new(value));
        counter!(METRIC_CACHE_STORE, "group" => group).increment(1);
    }
}

/// How a [`MemoryCache`] makes room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Entries stay until removed or cleared.
    Unbounded,
    /// Least recently used entries go once `capacity` is reached.
    Lru(NonZeroUsize),
}

/// In-process [`Cache`] backed by an LRU map behind a lock.
pub struct MemoryCache {
    entries: RwLock<LruCache<CacheKey, Arc<CacheValue>>>,
    policy: EvictionPolicy,
}

impl MemoryCache {
    pub fn new(policy: EvictionPolicy) -> Self {
        let entries = match policy {
            EvictionPolicy::Unbounded => LruCache::unbounded(),
            EvictionPolicy::Lru(capacity) => LruCache::new(capacity),
        };
        Self {
            entries: RwLock::new(entries),
            policy,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(EvictionPolicy::Unbounded)
    }

    pub fn bounded(capacity: NonZeroUsize) -> Self {
        Self::new(EvictionPolicy::Lru(capacity))
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl Cache for MemoryCache {
    fn retrieve(&self, key: &CacheKey) -> Option<Arc<CacheValue>> {
        write(&self.entries, SOURCE, "retrieve").get(key).cloned()
    }

    fn store(&self, key: CacheKey, value: Arc<CacheValue>) {
        let mut entries = write(&self.entries, SOURCE, "store");
        // Drop the old slot first so the stored key is the fresh one.
        entries.pop(&key);
        if let Some((evicted, _)) = entries.push(key, value) {
            trace!(evicted = %evicted, "Evicted least recently used entry");
            counter!(METRIC_CACHE_EVICT).increment(1);
        }
    }

    fn remove(&self, key: &CacheKey) -> Option<Arc<CacheValue>> {
        write(&self.entries, SOURCE, "remove").pop(key)
    }

    fn clear(&self) {
        write(&self.entries, SOURCE, "clear").clear();
    }

    fn keys(&self) -> Vec<CacheKey> {
        read(&self.entries, SOURCE, "keys")
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn len(&self) -> usize {
        read(&self.entries, SOURCE, "len").len()
    }
}
