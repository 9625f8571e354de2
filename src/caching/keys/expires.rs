use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use time::{OffsetDateTime, PrimitiveDateTime};

use super::{CacheKey, LastModified};

/// Wraps a key with an absolute expiration computed at construction time.
///
/// While unexpired the TTL overrides the inner key's own validity; after
/// expiry the inner key decides.
#[derive(Debug, Clone)]
pub struct ExpiresKey {
    inner: Box<CacheKey>,
    created: OffsetDateTime,
    expiration: OffsetDateTime,
}

impl ExpiresKey {
    pub fn new(inner: CacheKey, ttl: Duration) -> Self {
        Self::created_at(inner, ttl, OffsetDateTime::now_utc())
    }

    /// Build a key as if it had been constructed at `created`.
    ///
    /// A TTL reaching past the last representable instant never expires.
    pub fn created_at(inner: CacheKey, ttl: Duration, created: OffsetDateTime) -> Self {
        let expiration = time::Duration::try_from(ttl)
            .ok()
            .and_then(|ttl| created.checked_add(ttl))
            .unwrap_or(PrimitiveDateTime::MAX.assume_utc());
        Self {
            inner: Box::new(inner),
            created,
            expiration,
        }
    }

    pub fn inner(&self) -> &CacheKey {
        &self.inner
    }

    pub fn created(&self) -> OffsetDateTime {
        self.created
    }

    pub fn expiration(&self) -> OffsetDateTime {
        self.expiration
    }

    /// `self` is the stored key, `current` the one built for the running request.
    pub fn is_valid(&self, current: &Self) -> bool {
        self.expiration > current.created || self.inner.is_valid(&current.inner)
    }

    pub fn last_modified(&self) -> LastModified {
        self.inner.last_modified()
    }
}

impl PartialEq for ExpiresKey {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for ExpiresKey {}

impl Hash for ExpiresKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl fmt::Display for ExpiresKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Expires({}, until {})",
            self.inner,
            LastModified::At(self.expiration)
        )
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const TTL: Duration = Duration::from_secs(1);

    fn opaque() -> CacheKey {
        CacheKey::invalid("news-feed")
    }

    #[test]
    fn valid_right_after_construction() {
        let created = datetime!(2024-03-01 10:00:00 UTC);
        let stored = ExpiresKey::created_at(opaque(), TTL, created);
        let current = ExpiresKey::created_at(opaque(), TTL, created + Duration::from_millis(10));

        assert!(stored.is_valid(&current));
    }

    #[test]
    fn invalid_once_ttl_has_elapsed() {
        let created = datetime!(2024-03-01 10:00:00 UTC);
        let stored = ExpiresKey::created_at(opaque(), TTL, created);
        let current = ExpiresKey::created_at(opaque(), TTL, created + TTL);

        assert!(!stored.is_valid(&current));
    }

    #[test]
    fn inner_validity_survives_expiry() {
        let created = datetime!(2024-03-01 10:00:00 UTC);
        let stored = ExpiresKey::created_at(CacheKey::object("static"), TTL, created);
        let current = ExpiresKey::created_at(
            CacheKey::object("static"),
            TTL,
            created + Duration::from_secs(3_600),
        );

        assert!(stored.is_valid(&current));
    }

    #[test]
    fn oversized_ttl_saturates_instead_of_overflowing() {
        let created = datetime!(2024-03-01 10:00:00 UTC);
        let stored = ExpiresKey::created_at(opaque(), Duration::from_secs(u64::MAX), created);
        let current = ExpiresKey::created_at(opaque(), TTL, created + Duration::from_secs(3_600));

        assert_eq!(stored.expiration(), PrimitiveDateTime::MAX.assume_utc());
        assert!(stored.is_valid(&current));
    }

    #[test]
    fn identity_ignores_construction_time() {
        let early = ExpiresKey::created_at(opaque(), TTL, datetime!(2024-03-01 10:00:00 UTC));
        let late = ExpiresKey::created_at(opaque(), TTL, datetime!(2024-03-02 10:00:00 UTC));

        assert_eq!(early, late);
    }
}
