//! PostgreSQL connection settings.

use crate::env::{parse_port, EnvSource, Layers, ProcessEnv};
use crate::error::Result;
use crate::keys;
use crate::settings::DefaultSettings;
use secrecy::{ExposeSecret, SecretString};

/// Connection settings for the target database.
#[derive(Debug, Clone)]
pub struct PostgresDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// User to connect as. May be empty.
    pub user: String,
    /// Static password. `None` means "authenticate with an IAM auth token".
    pub password: Option<SecretString>,
    /// Database name.
    pub database: String,
    /// Schema migrations run in. May be empty.
    pub schema: String,
}

impl PostgresDbConfig {
    /// Resolve from the process environment and `defaults`.
    pub fn load(defaults: &DefaultSettings) -> Result<Self> {
        PostgresDbConfigBuilder::new(defaults).build()
    }

    /// Create a builder with explicit per-field overrides.
    #[must_use]
    pub fn builder(defaults: &DefaultSettings) -> PostgresDbConfigBuilder {
        PostgresDbConfigBuilder::new(defaults)
    }

    /// `host:port`, as used for the auth token endpoint.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether a static password is configured.
    #[must_use]
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// The password, if one is configured.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.expose_secret().as_str())
    }
}

/// Builder for [`PostgresDbConfig`].
///
/// Fields set here are taken as-is; every other field is resolved from the
/// environment, then the defaults map, then the literal fallback.
#[derive(Debug, Clone)]
pub struct PostgresDbConfigBuilder {
    defaults: DefaultSettings,
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
    schema: Option<String>,
}

impl PostgresDbConfigBuilder {
    /// Create a builder over `defaults`.
    #[must_use]
    pub fn new(defaults: &DefaultSettings) -> Self {
        Self {
            defaults: defaults.clone(),
            host: None,
            port: None,
            user: None,
            password: None,
            database: None,
            schema: None,
        }
    }

    /// Pin the host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Pin the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Pin the user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Pin the password. An empty password resolves to "absent".
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Pin the database name.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Pin the schema.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Resolve against the process environment.
    pub fn build(self) -> Result<PostgresDbConfig> {
        self.build_from(&ProcessEnv)
    }

    /// Resolve against `env`.
    pub fn build_from(self, env: &dyn EnvSource) -> Result<PostgresDbConfig> {
        let layers = Layers::new(env, &self.defaults);

        let port = match self.port {
            Some(port) => parse_port(keys::POSTGRES_PORT, &port.to_string())?,
            None => layers.port(keys::POSTGRES_PORT)?,
        };
        let password = match self.password {
            Some(password) => Some(password).filter(|p| !p.is_empty()),
            None => layers.optional(keys::POSTGRES_PASSWORD),
        };

        Ok(PostgresDbConfig {
            host: self
                .host
                .unwrap_or_else(|| layers.string(keys::POSTGRES_HOST)),
            port,
            user: self
                .user
                .unwrap_or_else(|| layers.string(keys::POSTGRES_USER)),
            password: password.map(SecretString::new),
            database: self
                .database
                .unwrap_or_else(|| layers.string(keys::POSTGRES_DATABASE)),
            schema: self
                .schema
                .unwrap_or_else(|| layers.string(keys::POSTGRES_SCHEMA)),
        })
    }
}
