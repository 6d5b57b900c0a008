//! Top-level migrator configuration.

use crate::env::{EnvSource, Layers, ProcessEnv};
use crate::error::Result;
use crate::keys;
use crate::postgres::{PostgresDbConfig, PostgresDbConfigBuilder};
use crate::settings::DefaultSettings;
use tracing::debug;

/// Resolved migrator configuration. Immutable once built.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection settings.
    pub postgres_db: PostgresDbConfig,
    /// Log per-migration progress.
    pub verbose_logging: bool,
}

impl Config {
    /// Resolve every field from the process environment, then `defaults`,
    /// then the literal fallbacks.
    pub fn load(defaults: &DefaultSettings) -> Result<Self> {
        Self::load_from(&ProcessEnv, defaults)
    }

    /// Like [`load`](Self::load) but against an injected environment.
    pub fn load_from(env: &dyn EnvSource, defaults: &DefaultSettings) -> Result<Self> {
        ConfigBuilder::new(defaults).build_from(env)
    }

    /// Start a builder for pinning individual fields.
    #[must_use]
    pub fn builder(defaults: &DefaultSettings) -> ConfigBuilder {
        ConfigBuilder::new(defaults)
    }
}

/// Builder for [`Config`] with optional per-field overrides.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    defaults: DefaultSettings,
    verbose_logging: Option<bool>,
    postgres_db: PostgresDbConfigBuilder,
}

impl ConfigBuilder {
    /// Create a builder over `defaults`.
    #[must_use]
    pub fn new(defaults: &DefaultSettings) -> Self {
        Self {
            defaults: defaults.clone(),
            verbose_logging: None,
            postgres_db: PostgresDbConfigBuilder::new(defaults),
        }
    }

    /// Pin verbose logging.
    #[must_use]
    pub fn verbose_logging(mut self, verbose: bool) -> Self {
        self.verbose_logging = Some(verbose);
        self
    }

    /// Pin the database host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.postgres_db = self.postgres_db.with_host(host);
        self
    }

    /// Pin the database port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.postgres_db = self.postgres_db.with_port(port);
        self
    }

    /// Pin the database user.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.postgres_db = self.postgres_db.with_user(user);
        self
    }

    /// Pin the database password. Empty means "no password".
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.postgres_db = self.postgres_db.with_password(password);
        self
    }

    /// Pin the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.postgres_db = self.postgres_db.with_database(database);
        self
    }

    /// Pin the schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.postgres_db = self.postgres_db.with_schema(schema);
        self
    }

    /// Resolve against the process environment.
    pub fn build(self) -> Result<Config> {
        self.build_from(&ProcessEnv)
    }

    /// Resolve against `env`.
    pub fn build_from(self, env: &dyn EnvSource) -> Result<Config> {
        let verbose_logging = match self.verbose_logging {
            Some(verbose) => verbose,
            None => Layers::new(env, &self.defaults).boolean(keys::VERBOSE_LOGGING)?,
        };
        let postgres_db = self.postgres_db.build_from(env)?;

        debug!(
            host = %postgres_db.host,
            port = postgres_db.port,
            database = %postgres_db.database,
            schema = %postgres_db.schema,
            password = postgres_db.has_password(),
            verbose_logging,
            "Configuration resolved"
        );

        Ok(Config {
            postgres_db,
            verbose_logging,
        })
    }
}
