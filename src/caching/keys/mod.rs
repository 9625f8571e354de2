//! Cache key algebra.
//!
//! A [`CacheKey`] has two faces: identity (`Eq` + `Hash`), used to address a
//! slot in the store, and validity ([`CacheKey::is_valid`]), used to decide
//! whether the value stored under that slot still answers the current request.
//! Variants that embed a timestamp keep it out of their identity.

mod cached;
mod compound;
mod expires;
mod last_modified;
mod parameter;
mod timestamp;
mod url_list;

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

pub use cached::CachedKey;
pub use compound::CompoundKey;
pub use expires::ExpiresKey;
pub use last_modified::LastModified;
pub use parameter::{NON_CACHEABLE_PARAMETERS, ParameterKey};
pub use timestamp::{TimestampSourceKey, TimestampUrlKey};
pub use url_list::UrlListKey;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Matches and validates against every other `Simple` key.
    Simple,
    /// Addressable by seed but never valid.
    Invalid { seed: String },
    /// Opaque identity that stays valid for as long as it is equal.
    Object(String),
    Parameter(ParameterKey),
    TimestampUrl(TimestampUrlKey),
    TimestampSource(TimestampSourceKey),
    Compound(CompoundKey),
    Expires(ExpiresKey),
    Cached(CachedKey),
    UrlList(UrlListKey),
}

impl CacheKey {
    pub fn invalid(seed: impl Into<String>) -> Self {
        Self::Invalid { seed: seed.into() }
    }

    pub fn object(identity: impl Into<String>) -> Self {
        Self::Object(identity.into())
    }

    pub fn expires(inner: CacheKey, ttl: std::time::Duration) -> Self {
        Self::Expires(ExpiresKey::new(inner, ttl))
    }

    pub fn compound<I: IntoIterator<Item = CacheKey>>(keys: I) -> Self {
        Self::Compound(keys.into_iter().collect())
    }

    /// Is a value stored under `self` still good for a request keyed by `current`?
    ///
    /// Keys of different variants are never valid against each other.
    pub fn is_valid(&self, current: &CacheKey) -> bool {
        match (self, current) {
            (Self::Simple, Self::Simple) => true,
            (Self::Invalid { .. }, _) => false,
            (Self::Object(mine), Self::Object(theirs)) => mine == theirs,
            (Self::Parameter(mine), Self::Parameter(theirs)) => mine == theirs,
            (Self::TimestampUrl(mine), Self::TimestampUrl(theirs)) => mine.is_valid(theirs),
            (Self::TimestampSource(mine), Self::TimestampSource(theirs)) => mine.is_valid(theirs),
            (Self::Compound(mine), Self::Compound(theirs)) => mine.is_valid(theirs),
            (Self::Expires(mine), Self::Expires(theirs)) => mine.is_valid(theirs),
            (Self::Cached(mine), Self::Cached(theirs)) => mine.is_valid(theirs),
            (Self::UrlList(mine), Self::UrlList(theirs)) => mine.is_valid(theirs),
            _ => false,
        }
    }

    /// Latest modification of the content behind this key.
    ///
    /// For [`CacheKey::UrlList`] this stats every URL and records the result.
    pub fn last_modified(&self) -> LastModified {
        match self {
            Self::Simple | Self::Object(_) => LastModified::EPOCH,
            Self::Invalid { .. } | Self::Parameter(_) => LastModified::Unknown,
            Self::TimestampUrl(key) => key.timestamp(),
            Self::TimestampSource(key) => key.timestamp(),
            Self::Compound(key) => key.last_modified(),
            Self::Expires(key) => key.last_modified(),
            Self::Cached(key) => key.last_modified(),
            Self::UrlList(key) => key.last_modified(),
        }
    }

    /// Stable within one process; suitable for log correlation only.
    pub fn fingerprint(&self) -> u64 {
        hash_value(self)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => f.write_str("Simple"),
            Self::Invalid { seed } => write!(f, "Invalid({seed})"),
            Self::Object(identity) => write!(f, "Object({identity})"),
            Self::Parameter(key) => fmt::Display::fmt(key, f),
            Self::TimestampUrl(key) => fmt::Display::fmt(key, f),
            Self::TimestampSource(key) => fmt::Display::fmt(key, f),
            Self::Compound(key) => fmt::Display::fmt(key, f),
            Self::Expires(key) => fmt::Display::fmt(key, f),
            Self::Cached(key) => fmt::Display::fmt(key, f),
            Self::UrlList(key) => fmt::Display::fmt(key, f),
        }
    }
}

impl From<ParameterKey> for CacheKey {
    fn from(key: ParameterKey) -> Self {
        Self::Parameter(key)
    }
}

impl From<CompoundKey> for CacheKey {
    fn from(key: CompoundKey) -> Self {
        Self::Compound(key)
    }
}

impl From<TimestampUrlKey> for CacheKey {
    fn from(key: TimestampUrlKey) -> Self {
        Self::TimestampUrl(key)
    }
}

impl From<TimestampSourceKey> for CacheKey {
    fn from(key: TimestampSourceKey) -> Self {
        Self::TimestampSource(key)
    }
}

impl From<ExpiresKey> for CacheKey {
    fn from(key: ExpiresKey) -> Self {
        Self::Expires(key)
    }
}

impl From<CachedKey> for CacheKey {
    fn from(key: CachedKey) -> Self {
        Self::Cached(key)
    }
}

impl From<UrlListKey> for CacheKey {
    fn from(key: UrlListKey) -> Self {
        Self::UrlList(key)
    }
}

/// Hash any value with the standard hasher.
pub fn hash_value<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
