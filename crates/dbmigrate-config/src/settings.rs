//! Caller-supplied default settings.

use crate::keys::SettingKey;
use std::collections::HashMap;

/// Fallback values consulted when an environment variable is not set.
///
/// Keys that are absent simply contribute nothing; the key's literal fallback
/// is used instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultSettings {
    values: HashMap<String, String>,
}

impl DefaultSettings {
    /// Create an empty settings map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: HashMap::with_capacity(20),
        }
    }

    /// Set a value, returning the previous one if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Raw lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value for `key`, or its literal fallback when absent.
    #[must_use]
    pub fn get_or_fallback(&self, key: SettingKey) -> &str {
        self.get(key.name).unwrap_or(key.fallback)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DefaultSettings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut settings = Self::new();
        for (k, v) in iter {
            settings.insert(k, v);
        }
        settings
    }
}
