//! Environment lookup and per-field layer resolution.

use crate::error::{ConfigError, Result};
use crate::keys::SettingKey;
use crate::settings::DefaultSettings;
use std::collections::HashMap;
use tracing::trace;

/// A source of environment variables.
///
/// [`ProcessEnv`] reads the real process environment; a `HashMap` can stand
/// in for it in tests.
pub trait EnvSource {
    /// Value of `key` if it is set. A variable set to `""` is `Some("")`.
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key).map(|v| v.to_string_lossy().into_owned())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<T: EnvSource + ?Sized> EnvSource for &T {
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }
}

/// Environment, then defaults map, then literal fallback.
pub(crate) struct Layers<'a> {
    env: &'a dyn EnvSource,
    defaults: &'a DefaultSettings,
}

impl<'a> Layers<'a> {
    pub(crate) fn new(env: &'a dyn EnvSource, defaults: &'a DefaultSettings) -> Self {
        Self { env, defaults }
    }

    /// String field: a value present in a layer wins even when empty.
    pub(crate) fn string(&self, key: SettingKey) -> String {
        if let Some(value) = self.env.var(key.name) {
            trace!(key = key.name, layer = "env", "resolved setting");
            return value;
        }
        if let Some(value) = self.defaults.get(key.name) {
            trace!(key = key.name, layer = "defaults", "resolved setting");
            return value.to_string();
        }
        trace!(key = key.name, layer = "fallback", "resolved setting");
        key.fallback.to_string()
    }

    /// Numeric / boolean field: an empty value counts as unset.
    fn scalar(&self, key: SettingKey) -> String {
        if let Some(value) = self.env.var(key.name).filter(|v| !v.is_empty()) {
            trace!(key = key.name, layer = "env", "resolved setting");
            return value;
        }
        if let Some(value) = self.defaults.get(key.name).filter(|v| !v.is_empty()) {
            trace!(key = key.name, layer = "defaults", "resolved setting");
            return value.to_string();
        }
        trace!(key = key.name, layer = "fallback", "resolved setting");
        key.fallback.to_string()
    }

    /// Optional field: an empty resolved string means absent.
    pub(crate) fn optional(&self, key: SettingKey) -> Option<String> {
        Some(self.string(key)).filter(|v| !v.is_empty())
    }

    pub(crate) fn port(&self, key: SettingKey) -> Result<u16> {
        parse_port(key, &self.scalar(key))
    }

    pub(crate) fn boolean(&self, key: SettingKey) -> Result<bool> {
        let value = self.scalar(key);
        value
            .parse::<bool>()
            .map_err(|e| ConfigError::invalid_value(key.name, value.clone(), "bool", e))
    }
}

/// Parse a TCP port in 1..=65535.
pub(crate) fn parse_port(key: SettingKey, value: &str) -> Result<u16> {
    match value.parse::<u16>() {
        Ok(0) => Err(ConfigError::invalid_value(
            key.name,
            value,
            "port",
            "port must be between 1 and 65535",
        )),
        Ok(port) => Ok(port),
        Err(e) => Err(ConfigError::invalid_value(key.name, value, "port", e)),
    }
}
