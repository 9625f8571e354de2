//! Bounded cache for compiled resources (templates, stylesheets, schemas).

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use tracing::trace;

use super::keys::LastModified;
use super::lock::lock;

const SOURCE: &str = "caching::resource";

pub const DEFAULT_RESOURCE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(255) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

/// A compiled resource with the modification stamp of its source.
#[derive(Debug, Clone)]
pub struct Stamped<V> {
    pub value: V,
    pub last_modified: LastModified,
}

/// Fixed-capacity map from resource identity to compiled value.
///
/// Eviction follows insertion order: reads and replacements do not make an
/// entry younger, so the oldest inserted identity is dropped first.
pub struct ResourceCache<V> {
    entries: Mutex<LruCache<String, Stamped<V>>>,
}

impl<V: Clone> ResourceCache<V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.entries, SOURCE, "contains").contains(id)
    }

    pub fn get(&self, id: &str) -> Option<Stamped<V>> {
        lock(&self.entries, SOURCE, "get").peek(id).cloned()
    }

    /// The value for `id` if it was compiled from a source at least as new as `current`.
    ///
    /// Unknown stamps on either side never count as fresh.
    pub fn get_fresh(&self, id: &str, current: LastModified) -> Option<V> {
        let entries = lock(&self.entries, SOURCE, "get_fresh");
        let stored = entries.peek(id)?;
        match (stored.last_modified, current) {
            (LastModified::At(stored_at), LastModified::At(current_at))
                if stored_at >= current_at =>
            {
                Some(stored.value.clone())
            }
            _ => {
                trace!(id, stored = %stored.last_modified, current = %current, "Resource is stale");
                None
            }
        }
    }

    pub fn put(&self, id: impl Into<String>, value: V, last_modified: LastModified) {
        let id = id.into();
        let mut entries = lock(&self.entries, SOURCE, "put");
        let stamped = Stamped {
            value,
            last_modified,
        };
        if let Some(existing) = entries.peek_mut(&id) {
            *existing = stamped;
            return;
        }
        if let Some((evicted, _)) = entries.push(id, stamped) {
            trace!(evicted = %evicted, "Evicted oldest resource");
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> NonZeroUsize {
        lock(&self.entries, SOURCE, "capacity").cap()
    }
}

impl<V: Clone> Default for ResourceCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_RESOURCE_CAPACITY)
    }
}
