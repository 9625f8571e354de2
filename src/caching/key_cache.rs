//! Identity → key side cache backing [`CacheKey::Cached`].
//!
//! Some stages only learn their real key after running (an include list, for
//! instance). They address their slot by a cheap string identity and record the
//! resolved key here once known; until then the identity resolves to an
//! invalid key so the first run always executes.

use std::sync::Arc;

use tracing::debug;

use super::keys::{CacheKey, CachedKey};
use super::store::{Cache, EvictionPolicy, MemoryCache};
use super::value::CacheValue;

const GROUP: &str = "key-cache";
const BOOTSTRAP_SEED: &str = "cachepipe.unresolved-key";

pub struct KeyCache {
    keys: MemoryCache,
    group: Arc<str>,
}

impl KeyCache {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            keys: MemoryCache::new(policy),
            group: Arc::from(GROUP),
        }
    }

    /// The key currently recorded for `identity`, or an invalid placeholder.
    pub fn key_for(&self, identity: &str) -> CachedKey {
        match self.keys.get_with(&slot(identity), true) {
            Some(value) => CachedKey::new(identity, value.key().clone()),
            None => {
                debug!(identity, "No resolved key yet, using invalid placeholder");
                CachedKey::new(identity, CacheKey::invalid(BOOTSTRAP_SEED))
            }
        }
    }

    /// Record the key `identity` resolved to and return the matching cached key.
    pub fn record(&self, identity: &str, resolved: CacheKey) -> CachedKey {
        let value = CacheValue::cached(resolved.clone()).in_group(Some(Arc::clone(&self.group)));
        self.keys.put(slot(identity), value);
        CachedKey::new(identity, resolved)
    }

    pub fn forget(&self, identity: &str) -> bool {
        self.keys.remove(&slot(identity)).is_some()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new(EvictionPolicy::Unbounded)
    }
}

fn slot(identity: &str) -> CacheKey {
    CacheKey::object(identity)
}
