use std::fmt;
use std::time::SystemTime;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Last-modification stamp reported by a cache key.
///
/// `Unknown` marks content whose freshness cannot be judged. Aggregates that
/// contain a single `Unknown` member are `Unknown` as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LastModified {
    Unknown,
    At(OffsetDateTime),
}

impl LastModified {
    /// Stamp used by keys whose content never changes.
    pub const EPOCH: Self = Self::At(OffsetDateTime::UNIX_EPOCH);

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self::At(OffsetDateTime::now_utc())
    }

    /// Interpret milliseconds since the Unix epoch; negative values are `Unknown`.
    pub fn from_millis(millis: i64) -> Self {
        if millis < 0 {
            return Self::Unknown;
        }
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
            .map(Self::At)
            .unwrap_or(Self::Unknown)
    }

    /// Milliseconds since the Unix epoch, `-1` for `Unknown`.
    pub fn as_millis(&self) -> i64 {
        match self {
            Self::Unknown => -1,
            Self::At(at) => {
                let millis = at.unix_timestamp_nanos() / 1_000_000;
                i64::try_from(millis).unwrap_or(i64::MAX)
            }
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::At(_))
    }

    /// Maximum of all stamps; any `Unknown` member short-circuits to `Unknown`.
    /// An empty sequence aggregates to [`LastModified::EPOCH`].
    pub fn aggregate<I>(stamps: I) -> Self
    where
        I: IntoIterator<Item = LastModified>,
    {
        let mut latest = OffsetDateTime::UNIX_EPOCH;
        for stamp in stamps {
            match stamp {
                Self::Unknown => return Self::Unknown,
                Self::At(at) if at > latest => latest = at,
                Self::At(_) => {}
            }
        }
        Self::At(latest)
    }
}

impl From<SystemTime> for LastModified {
    fn from(value: SystemTime) -> Self {
        Self::At(OffsetDateTime::from(value))
    }
}

impl fmt::Display for LastModified {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::At(at) => {
                let formatted = at.format(&Rfc3339).map_err(|_| fmt::Error)?;
                f.write_str(&formatted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn aggregate_takes_latest_stamp() {
        let early = LastModified::At(datetime!(2020-01-01 00:00 UTC));
        let late = LastModified::At(datetime!(2024-06-30 12:00 UTC));

        assert_eq!(LastModified::aggregate([early, late, early]), late);
    }

    #[test]
    fn aggregate_short_circuits_on_unknown() {
        let late = LastModified::At(datetime!(2024-06-30 12:00 UTC));

        assert_eq!(
            LastModified::aggregate([late, LastModified::Unknown, late]),
            LastModified::Unknown
        );
    }

    #[test]
    fn aggregate_of_nothing_is_epoch() {
        assert_eq!(LastModified::aggregate([]), LastModified::EPOCH);
    }

    #[test]
    fn millis_conversion_keeps_unknown_sentinel() {
        assert_eq!(LastModified::Unknown.as_millis(), -1);
        assert_eq!(LastModified::from_millis(-1), LastModified::Unknown);
        assert_eq!(LastModified::from_millis(1_500).as_millis(), 1_500);
        assert_eq!(LastModified::EPOCH.as_millis(), 0);
    }

    #[test]
    fn displays_rfc3339() {
        let stamp = LastModified::At(datetime!(2024-06-30 12:00 UTC));
        assert_eq!(stamp.to_string(), "2024-06-30T12:00:00Z");
        assert_eq!(LastModified::Unknown.to_string(), "unknown");
    }
}
