//! Options a caching pipeline accepts before assembly.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::error::SetupError;

/// Free-form configuration handed to a pipeline and each of its components.
pub type Configuration = BTreeMap<String, String>;

pub const EXPIRES: &str = "expires";
pub const EXPIRES_CACHE_KEY: &str = "expires-cache-key";
pub const JMX_GROUP_NAME: &str = "jmx-group-name";

/// Longest accepted time-to-live: one hundred years.
pub const MAX_EXPIRES_SECS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PipelineOptions {
    /// Time-to-live in whole seconds; enables expiry-based caching.
    pub expires: Option<u64>,
    /// Seed for the key used when some stage cannot contribute a key.
    #[serde(alias = "expires_cache_key")]
    pub expires_cache_key: Option<String>,
    /// Label stored with cached values and reported on cache metrics.
    #[serde(alias = "jmx_group_name")]
    pub jmx_group_name: Option<String>,
}

impl PipelineOptions {
    /// Read the recognised options from `config`, ignoring unrelated entries.
    pub fn from_map(config: &Configuration) -> Result<Self, SetupError> {
        let expires = config
            .get(EXPIRES)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| SetupError::invalid_expires(raw.as_str()))
            })
            .transpose()?;

        Self {
            expires,
            expires_cache_key: config.get(EXPIRES_CACHE_KEY).cloned(),
            jmx_group_name: config.get(JMX_GROUP_NAME).cloned(),
        }
        .normalized()
    }

    /// Reject TTLs outside `1..=MAX_EXPIRES_SECS` and drop a blank seed.
    pub fn normalized(mut self) -> Result<Self, SetupError> {
        if let Some(expires) = self.expires
            && !(1..=MAX_EXPIRES_SECS).contains(&expires)
        {
            return Err(SetupError::invalid_expires(expires.to_string()));
        }
        self.expires_cache_key = self.expires_cache_key.and_then(|seed| {
            let trimmed = seed.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        });
        Ok(self)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.expires.map(Duration::from_secs)
    }

    pub fn group(&self) -> Option<Arc<str>> {
        self.jmx_group_name.as_deref().map(Arc::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(entries: &[(&str, &str)]) -> Configuration {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reads_known_options() {
        let options = PipelineOptions::from_map(&config(&[
            ("expires", "30"),
            ("expires-cache-key", "home"),
            ("jmx-group-name", "pages"),
            ("unrelated", "x"),
        ]))
        .expect("valid options");

        assert_eq!(options.ttl(), Some(Duration::from_secs(30)));
        assert_eq!(options.expires_cache_key.as_deref(), Some("home"));
        assert_eq!(options.group().as_deref(), Some("pages"));
    }

    #[test]
    fn empty_map_means_no_expiry() {
        let options = PipelineOptions::from_map(&Configuration::new()).expect("valid options");
        assert_eq!(options, PipelineOptions::default());
    }

    #[test]
    fn malformed_expires_is_rejected() {
        let err = PipelineOptions::from_map(&config(&[("expires", "soon")]))
            .expect_err("non-numeric ttl");
        assert!(matches!(err, SetupError::InvalidExpires { value } if value == "soon"));
    }

    #[test]
    fn zero_and_oversized_expires_are_rejected() {
        for raw in ["0", "18446744073709551615"] {
            let err = PipelineOptions::from_map(&config(&[("expires", raw)]))
                .expect_err("out of range ttl");
            assert!(matches!(err, SetupError::InvalidExpires { value } if value == raw));
        }

        let longest = MAX_EXPIRES_SECS.to_string();
        let options = PipelineOptions::from_map(&config(&[("expires", longest.as_str())]))
            .expect("upper bound is accepted");
        assert_eq!(options.expires, Some(MAX_EXPIRES_SECS));
    }

    #[test]
    fn blank_seed_counts_as_unset() {
        let options = PipelineOptions::from_map(&config(&[
            ("expires", "30"),
            ("expires-cache-key", "  "),
        ]))
        .expect("valid options");

        assert_eq!(options.expires_cache_key, None);
    }
}
