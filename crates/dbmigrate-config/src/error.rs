//! Configuration error types.

/// Result type for configuration resolution.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration resolution error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A resolved value could not be converted to the field's type.
    #[error("error converting '{key}' value '{value}' to {expected}: {reason}")]
    InvalidValue {
        /// Setting key the value was resolved for.
        key: &'static str,
        /// Raw value as it was found.
        value: String,
        /// Target type name.
        expected: &'static str,
        /// Parser message.
        reason: String,
    },
}

impl ConfigError {
    /// Create an invalid-value error.
    pub fn invalid_value(
        key: &'static str,
        value: impl Into<String>,
        expected: &'static str,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidValue {
            key,
            value: value.into(),
            expected,
            reason: reason.to_string(),
        }
    }

    /// The setting key this error refers to.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::InvalidValue { key, .. } => key,
        }
    }
}
