use std::fmt;
use std::hash::{Hash, Hasher};

use url::Url;

use crate::util::modified;

use super::LastModified;

/// Identity of a resource addressed by URL plus the stamp observed for it.
///
/// Equality and hashing consider the URL only; validity additionally demands
/// that both stamps match exactly.
#[derive(Debug, Clone)]
pub struct TimestampUrlKey {
    url: Url,
    timestamp: LastModified,
}

impl TimestampUrlKey {
    pub fn new(url: Url, timestamp: LastModified) -> Self {
        Self { url, timestamp }
    }

    /// Build a key using the resource's current modification stamp.
    pub fn stat(url: Url) -> Self {
        let timestamp = modified::last_modified(&url);
        Self { url, timestamp }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn timestamp(&self) -> LastModified {
        self.timestamp
    }

    pub fn is_valid(&self, other: &Self) -> bool {
        self == other && self.timestamp == other.timestamp
    }
}

impl PartialEq for TimestampUrlKey {
    fn eq(&self, other: &Self) -> bool {
        self.url.as_str() == other.url.as_str()
    }
}

impl Eq for TimestampUrlKey {}

impl Hash for TimestampUrlKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.as_str().hash(state);
    }
}

impl fmt::Display for TimestampUrlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimestampUrl({} @ {})", self.url, self.timestamp)
    }
}

/// Like [`TimestampUrlKey`] for sources identified by a system id instead of a URL.
#[derive(Debug, Clone)]
pub struct TimestampSourceKey {
    system_id: String,
    timestamp: LastModified,
}

impl TimestampSourceKey {
    pub fn new(system_id: impl Into<String>, timestamp: LastModified) -> Self {
        Self {
            system_id: system_id.into(),
            timestamp,
        }
    }

    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    pub fn timestamp(&self) -> LastModified {
        self.timestamp
    }

    pub fn is_valid(&self, other: &Self) -> bool {
        self == other && self.timestamp == other.timestamp
    }
}

impl PartialEq for TimestampSourceKey {
    fn eq(&self, other: &Self) -> bool {
        self.system_id == other.system_id
    }
}

impl Eq for TimestampSourceKey {}

impl Hash for TimestampSourceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.system_id.hash(state);
    }
}

impl fmt::Display for TimestampSourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimestampSource({} @ {})", self.system_id, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::hash_value;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://example.test/{path}")).expect("valid test url")
    }

    #[test]
    fn equality_ignores_timestamp() {
        let stored = TimestampUrlKey::new(url("a.xml"), LastModified::from_millis(1_000));
        let current = TimestampUrlKey::new(url("a.xml"), LastModified::from_millis(2_000));

        assert_eq!(stored, current);
        assert_eq!(hash_value(&stored), hash_value(&current));
    }

    #[test]
    fn validity_requires_exact_timestamp_match() {
        let stored = TimestampUrlKey::new(url("a.xml"), LastModified::from_millis(2_000));
        let same = TimestampUrlKey::new(url("a.xml"), LastModified::from_millis(2_000));
        let older = TimestampUrlKey::new(url("a.xml"), LastModified::from_millis(1_000));
        let elsewhere = TimestampUrlKey::new(url("b.xml"), LastModified::from_millis(2_000));

        assert!(stored.is_valid(&same));
        // an older current stamp is still a mismatch, not "fresh enough"
        assert!(!stored.is_valid(&older));
        assert!(!stored.is_valid(&elsewhere));
    }

    #[test]
    fn source_keys_compare_by_system_id() {
        let stored = TimestampSourceKey::new("style.xsl", LastModified::from_millis(5));
        let current = TimestampSourceKey::new("style.xsl", LastModified::from_millis(5));
        let changed = TimestampSourceKey::new("style.xsl", LastModified::from_millis(6));

        assert!(stored.is_valid(&current));
        assert_eq!(stored, changed);
        assert!(!stored.is_valid(&changed));
    }
}
