use std::fmt;
use std::hash::{Hash, Hasher};

use super::{CacheKey, LastModified};

/// Key whose real identity is resolved through a [`KeyCache`](crate::caching::KeyCache).
///
/// Identity is the string the key was resolved under; validity delegates to
/// the resolved keys on both sides.
#[derive(Debug, Clone)]
pub struct CachedKey {
    identity: String,
    resolved: Box<CacheKey>,
}

impl CachedKey {
    pub fn new(identity: impl Into<String>, resolved: CacheKey) -> Self {
        Self {
            identity: identity.into(),
            resolved: Box::new(resolved),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn resolved(&self) -> &CacheKey {
        &self.resolved
    }

    pub fn is_valid(&self, other: &Self) -> bool {
        self == other && self.resolved.is_valid(&other.resolved)
    }

    pub fn last_modified(&self) -> LastModified {
        self.resolved.last_modified()
    }
}

impl PartialEq for CachedKey {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for CachedKey {}

impl Hash for CachedKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl fmt::Display for CachedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cached({} -> {})", self.identity, self.resolved)
    }
}
