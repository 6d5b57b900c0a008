//! Configuration precedence against the real process environment
//!
//! These tests mutate process-wide variables, so they run serially and
//! clear every setting before and after.

use crate::fixtures::*;
use dbmigrate_config::{keys, Config, ConfigError, DefaultSettings, PostgresDbConfig};
use pretty_assertions::assert_eq;
use serial_test::serial;

struct EnvGuard;

impl EnvGuard {
    fn new(vars: &[(&str, &str)]) -> Self {
        clear();
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        Self
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        clear();
    }
}

fn clear() {
    for key in keys::ALL {
        std::env::remove_var(key.name);
    }
}

#[test]
#[serial]
fn test_nothing_set_uses_fallbacks() {
    let _env = EnvGuard::new(&[]);

    let config = Config::load(&DefaultSettings::new()).unwrap();

    assert!(!config.verbose_logging);
    assert_eq!(config.postgres_db.host, "localhost");
    assert_eq!(config.postgres_db.port, 5432);
    assert_eq!(config.postgres_db.user, "");
    assert!(!config.postgres_db.has_password());
    assert_eq!(config.postgres_db.database, "postgres");
    assert_eq!(config.postgres_db.schema, "");
}

#[test]
#[serial]
fn test_environment_beats_defaults() {
    let _env = EnvGuard::new(&[
        ("POSTGRES_HOST", "db.internal"),
        ("POSTGRES_PORT", "6543"),
        ("VERBOSE_LOGGING", "true"),
    ]);
    let defaults = test_settings(TEST_SCHEMA).with(keys::POSTGRES_HOST.name, "ignored");

    let config = Config::load(&defaults).unwrap();

    assert!(config.verbose_logging);
    assert_eq!(config.postgres_db.host, "db.internal");
    assert_eq!(config.postgres_db.port, 6543);
    assert_eq!(config.postgres_db.user, "postgres");
    assert_eq!(config.postgres_db.password(), Some("password"));
    assert_eq!(config.postgres_db.schema, TEST_SCHEMA);
}

#[test]
#[serial]
fn test_invalid_port_in_environment() {
    let _env = EnvGuard::new(&[("POSTGRES_PORT", "abc")]);

    let err = PostgresDbConfig::load(&DefaultSettings::new()).unwrap_err();

    assert!(matches!(err, ConfigError::InvalidValue { .. }));
    assert_eq!(err.key(), "POSTGRES_PORT");
}

#[test]
#[serial]
fn test_empty_password_in_environment_is_absent() {
    let _env = EnvGuard::new(&[("POSTGRES_PASSWORD", "")]);
    let defaults = test_settings(TEST_SCHEMA);

    let config = Config::load(&defaults).unwrap();

    assert!(!config.postgres_db.has_password());
}

#[test]
#[serial]
fn test_builder_override_ignores_environment() {
    let _env = EnvGuard::new(&[("POSTGRES_SCHEMA", "from_env"), ("POSTGRES_USER", "env_user")]);

    let config = Config::builder(&DefaultSettings::new())
        .schema("pinned")
        .build()
        .unwrap();

    assert_eq!(config.postgres_db.schema, "pinned");
    assert_eq!(config.postgres_db.user, "env_user");
}
