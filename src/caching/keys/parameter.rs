use std::collections::BTreeMap;
use std::fmt;

/// Parameter names that never take part in a cache identity.
///
/// These carry per-run plumbing rather than content-affecting input.
pub const NON_CACHEABLE_PARAMETERS: &[&str] = &["pipeline.run-id", "pipeline.context"];

/// Identity made of a name → value map.
///
/// A `BTreeMap` keeps iteration ordered so equal maps always hash equally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ParameterKey {
    parameters: BTreeMap<String, String>,
}

impl ParameterKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a key from text entries, skipping every name listed in `excluded`.
    pub fn cacheable<'a, I>(entries: I, excluded: &[&str]) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let parameters = entries
            .into_iter()
            .filter(|(name, _)| !excluded.contains(name))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Self { parameters }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.insert(name, value);
        self
    }

    /// Add a parameter; numbers and booleans render through `Display`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl fmt::Display) {
        self.parameters.insert(name.into(), value.to_string());
    }

    /// Flatten a nested map into `name_<key>` entries.
    pub fn insert_map<K, V, I>(&mut self, name: &str, entries: I)
    where
        K: fmt::Display,
        V: fmt::Display,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.parameters
                .insert(format!("{name}_{key}"), value.to_string());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Parameter{")?;
        for (index, (name, value)) in self.parameters.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("}")
    }
}
