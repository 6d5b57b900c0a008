//! # dbmigrate-config
//!
//! Resolves the PostgreSQL connection settings and logging flag used by the
//! migrator from three layers, highest priority first:
//!
//! 1. environment variables (see [`keys`])
//! 2. a caller-supplied [`DefaultSettings`] map
//! 3. hard-coded literal fallbacks
//!
//! In-process callers can additionally pin individual fields through
//! [`PostgresDbConfigBuilder`] / [`ConfigBuilder`]; a pinned field skips the
//! layers above entirely.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbmigrate_config::{keys, Config, DefaultSettings};
//!
//! let mut defaults = DefaultSettings::new();
//! defaults.insert(keys::POSTGRES_SCHEMA.name, "app");
//!
//! let config = Config::load(&defaults)?;
//! assert!(config.postgres_db.port > 0);
//! # Ok::<(), dbmigrate_config::ConfigError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod env;
pub mod error;
pub mod keys;
pub mod postgres;
pub mod settings;

pub use config::{Config, ConfigBuilder};
pub use env::{EnvSource, ProcessEnv};
pub use error::{ConfigError, Result};
pub use keys::SettingKey;
pub use postgres::{PostgresDbConfig, PostgresDbConfigBuilder};
pub use settings::DefaultSettings;

/// Re-export secrecy types for convenience
pub use secrecy::{ExposeSecret, SecretString};
