use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI64, Ordering};

use tracing::debug;
use url::Url;

use crate::util::modified;

use super::LastModified;

#[derive(Debug)]
struct UrlStamp {
    url: Url,
    millis: AtomicI64,
}

impl UrlStamp {
    fn stamp(&self) -> LastModified {
        LastModified::from_millis(self.millis.load(Ordering::Acquire))
    }

    fn record(&self, stamp: LastModified) {
        self.millis.store(stamp.as_millis(), Ordering::Release);
    }
}

/// Ordered list of URLs with the modification stamp seen for each.
///
/// [`UrlListKey::last_modified`] re-stats every URL and records the fresh
/// stamps in place. Clones take a snapshot, so a key stored with a cached value
/// never picks up stamps read through the key of a later request.
#[derive(Debug)]
pub struct UrlListKey {
    entries: Box<[UrlStamp]>,
}

impl Clone for UrlListKey {
    fn clone(&self) -> Self {
        Self::from_stamps(
            self.entries
                .iter()
                .map(|entry| (entry.url.clone(), entry.stamp())),
        )
    }
}

impl UrlListKey {
    /// Build a key probing each URL's current modification stamp.
    pub fn stat<I>(urls: I) -> Self
    where
        I: IntoIterator<Item = Url>,
    {
        Self::from_stamps(urls.into_iter().map(|url| {
            let stamp = modified::last_modified(&url);
            (url, stamp)
        }))
    }

    pub fn from_stamps<I>(stamps: I) -> Self
    where
        I: IntoIterator<Item = (Url, LastModified)>,
    {
        let entries = stamps
            .into_iter()
            .map(|(url, stamp)| UrlStamp {
                url,
                millis: AtomicI64::new(stamp.as_millis()),
            })
            .collect();
        Self { entries }
    }

    pub fn urls(&self) -> impl Iterator<Item = &Url> {
        self.entries.iter().map(|entry| &entry.url)
    }

    /// Stamps as currently recorded, without probing.
    pub fn stamps(&self) -> Vec<LastModified> {
        self.entries.iter().map(UrlStamp::stamp).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_valid(&self, other: &Self) -> bool {
        if self != other {
            return false;
        }

        for (mine, theirs) in self.entries.iter().zip(other.entries.iter()) {
            if mine.stamp() != theirs.stamp() {
                debug!(
                    url = %mine.url,
                    stored = %mine.stamp(),
                    current = %theirs.stamp(),
                    "url stamp changed"
                );
                return false;
            }
        }
        true
    }

    /// Re-stat every URL, record the new stamps, then aggregate them.
    pub fn last_modified(&self) -> LastModified {
        for entry in self.entries.iter() {
            entry.record(modified::last_modified(&entry.url));
        }
        LastModified::aggregate(self.entries.iter().map(UrlStamp::stamp))
    }
}

impl PartialEq for UrlListKey {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|(mine, theirs)| mine.url.as_str() == theirs.url.as_str())
    }
}

impl Eq for UrlListKey {}

impl Hash for UrlListKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entries.len().hash(state);
        for entry in self.entries.iter() {
            entry.url.as_str().hash(state);
        }
    }
}

impl fmt::Display for UrlListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UrlList[")?;
        for (index, entry) in self.entries.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} @ {}", entry.url, entry.stamp())?;
        }
        f.write_str("]")
    }
}
