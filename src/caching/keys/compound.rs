use std::fmt;

use tracing::debug;

use super::{CacheKey, LastModified};

/// Ordered list of sub-keys.
///
/// Position matters: the same keys in another order form a different identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CompoundKey {
    keys: Vec<CacheKey>,
}

impl CompoundKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: CacheKey) {
        self.keys.push(key);
    }

    pub fn keys(&self) -> &[CacheKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_valid(&self, other: &Self) -> bool {
        if self != other {
            return false;
        }

        for (mine, theirs) in self.keys.iter().zip(&other.keys) {
            if !mine.is_valid(theirs) {
                debug!(stored = %mine, current = %theirs, "compound member is not valid");
                return false;
            }
        }
        true
    }

    pub fn last_modified(&self) -> LastModified {
        LastModified::aggregate(self.keys.iter().map(CacheKey::last_modified))
    }
}

impl From<Vec<CacheKey>> for CompoundKey {
    fn from(keys: Vec<CacheKey>) -> Self {
        Self { keys }
    }
}

impl FromIterator<CacheKey> for CompoundKey {
    fn from_iter<I: IntoIterator<Item = CacheKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for CompoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Compound[")?;
        for (index, key) in self.keys.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}")?;
        }
        f.write_str("]")
    }
}
