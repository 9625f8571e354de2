//! Result caching: keys, values, stores and background refresh.

mod config;
mod error;
mod key_cache;
pub mod keys;
pub(crate) mod lock;
mod refresh;
mod resource;
mod store;
mod value;

pub use config::CacheConfig;
pub use error::CacheError;
pub use key_cache::KeyCache;
pub use keys::{CacheKey, LastModified, hash_value};
pub use refresh::{
    BoxError, CacheRefreshManager, DEFAULT_REFRESH_THREADS, METRIC_REFRESH_DEDUPLICATED,
    METRIC_REFRESH_FAILED, METRIC_REFRESH_MS, METRIC_REFRESH_SCHEDULED, RefreshJob,
};
pub use resource::{DEFAULT_RESOURCE_CAPACITY, ResourceCache, Stamped};
pub use store::{
    Cache, EvictionPolicy, METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS,
    METRIC_CACHE_STORE, MemoryCache,
};
pub use value::{CacheValue, Payload};
