//! Cache configuration.
//!
//! Sizes the result cache, the resource cache and the refresh pool.

use std::num::NonZeroUsize;

use serde::Deserialize;

use super::refresh::DEFAULT_REFRESH_THREADS;
use super::resource::DEFAULT_RESOURCE_CAPACITY;
use super::store::EvictionPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum result entries; `0` keeps every entry.
    pub capacity: usize,
    /// Maximum compiled resources.
    pub resource_capacity: usize,
    /// Upper bound on concurrently running refresh jobs.
    pub refresh_threads: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            resource_capacity: DEFAULT_RESOURCE_CAPACITY.get(),
            refresh_threads: DEFAULT_REFRESH_THREADS.get(),
        }
    }
}

impl From<&crate::config::Settings> for CacheConfig {
    fn from(settings: &crate::config::Settings) -> Self {
        Self {
            capacity: settings.cache.capacity,
            resource_capacity: settings.resources.capacity.get(),
            refresh_threads: settings.refresh.threads.get(),
        }
    }
}

impl CacheConfig {
    pub fn eviction_policy(&self) -> EvictionPolicy {
        match NonZeroUsize::new(self.capacity) {
            Some(capacity) => EvictionPolicy::Lru(capacity),
            None => EvictionPolicy::Unbounded,
        }
    }

    /// Returns the resource capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn resource_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.resource_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the refresh pool size as NonZeroUsize, clamping to 1 if zero.
    pub fn refresh_threads_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.refresh_threads).unwrap_or(NonZeroUsize::MIN)
    }
}
