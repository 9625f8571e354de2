//! Values held by a [`Cache`](super::Cache).

use std::any::Any;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;

use super::error::CacheError;
use super::keys::CacheKey;

/// What a cache entry carries.
#[derive(Clone)]
pub enum Payload {
    /// Serialized output, replayable into any sink.
    Complete(Bytes),
    /// An in-memory object only meaningful to the stage that stored it.
    Object(Arc<dyn Any + Send + Sync>),
    /// The producing key itself is the value.
    Key,
}

impl Payload {
    fn kind(&self) -> &'static str {
        match self {
            Self::Complete(_) => "complete",
            Self::Object(_) => "object",
            Self::Key => "key",
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete(bytes) => f.debug_tuple("Complete").field(&bytes.len()).finish(),
            Self::Object(_) => f.write_str("Object(..)"),
            Self::Key => f.write_str("Key"),
        }
    }
}

/// Immutable payload plus the key that produced it.
#[derive(Debug, Clone)]
pub struct CacheValue {
    key: CacheKey,
    payload: Payload,
    group: Option<Arc<str>>,
}

impl CacheValue {
    pub fn complete(key: CacheKey, bytes: impl Into<Bytes>) -> Self {
        Self::with_payload(key, Payload::Complete(bytes.into()))
    }

    pub fn object<T: Any + Send + Sync>(key: CacheKey, object: T) -> Self {
        Self::with_payload(key, Payload::Object(Arc::new(object)))
    }

    /// A value whose content is its own key, as kept by a [`KeyCache`](super::KeyCache).
    pub fn cached(key: CacheKey) -> Self {
        Self::with_payload(key, Payload::Key)
    }

    fn with_payload(key: CacheKey, payload: Payload) -> Self {
        Self {
            key,
            payload,
            group: None,
        }
    }

    /// Attach the group label reported alongside cache metrics.
    pub fn in_group(mut self, group: Option<Arc<str>>) -> Self {
        self.group = group;
        self
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.payload {
            Payload::Complete(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match &self.payload {
            Payload::Object(object) => Arc::clone(object).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Whether this value may answer a request keyed by `current`.
    pub fn is_valid(&self, current: &CacheKey) -> bool {
        self.key.is_valid(current)
    }

    /// Replay the payload into `sink`; only complete payloads can be replayed.
    pub fn write_to(&self, sink: &mut dyn Write) -> Result<(), CacheError> {
        match &self.payload {
            Payload::Complete(bytes) => {
                sink.write_all(bytes)?;
                sink.flush()?;
                Ok(())
            }
            other => Err(CacheError::unsupported(other.kind())),
        }
    }

    /// Size in bytes, when it is known.
    pub fn size(&self) -> Option<usize> {
        self.bytes().map(Bytes::len)
    }
}

impl fmt::Display for CacheValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size() {
            Some(size) => write!(f, "{} ({size} bytes) for {}", self.payload.kind(), self.key),
            None => write!(f, "{} for {}", self.payload.kind(), self.key),
        }
    }
}
