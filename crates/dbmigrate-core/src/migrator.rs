//! Migration sessions.

use crate::cleanup::{close_on_error, Closer};
use crate::driver::{quote_ident, Backend, DriverConfig, SqlConnection, VersionState};
use crate::dsn::datasource_name;
use crate::engine::{ConstructionFailure, Migrate};
use crate::error::{MigrateError, Result};
use crate::logger::MigrationLogger;
use crate::postgres::PostgresBackend;
use crate::source::MigrationSource;
use crate::token::{AwsCredentials, RdsIamTokenProvider, TokenProvider, TokenRequest};
use dbmigrate_config::Config;
use secrecy::SecretString;
use std::time::Duration;
use tracing::{debug, info};

/// How long token acquisition may take by default.
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// The secret a session authenticates with.
#[derive(Debug, Clone)]
pub enum Credential {
    /// A configured password.
    StaticPassword(SecretString),
    /// A short-lived token issued by a [`TokenProvider`].
    EphemeralToken(SecretString),
}

impl Credential {
    fn secret(&self) -> &SecretString {
        match self {
            Self::StaticPassword(secret) | Self::EphemeralToken(secret) => secret,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::StaticPassword(_) => "password",
            Self::EphemeralToken(_) => "token",
        }
    }
}

/// Auth token settings for [`DatabaseMigrator::with_token`].
pub struct TokenAuth<'a> {
    /// Issues the token.
    pub provider: &'a dyn TokenProvider,
    /// AWS region the token is scoped to.
    pub region: String,
    /// Deadline for building the token.
    pub timeout: Duration,
}

impl<'a> TokenAuth<'a> {
    /// Token auth in `region` with the default deadline.
    pub fn new(provider: &'a dyn TokenProvider, region: impl Into<String>) -> Self {
        Self {
            provider,
            region: region.into(),
            timeout: DEFAULT_TOKEN_TIMEOUT,
        }
    }

    /// Override the deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A migration session: one open database driver, one migration source and
/// a logger.
///
/// `up`, `down` and `migrate` treat "nothing to do" as success. Closing
/// consumes the session.
pub struct DatabaseMigrator {
    engine: Migrate,
}

impl std::fmt::Debug for DatabaseMigrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseMigrator")
            .field("logger", &self.logger())
            .finish_non_exhaustive()
    }
}

impl DatabaseMigrator {
    /// Password-authenticated session against PostgreSQL.
    pub async fn new_local(config: &Config, source: Box<dyn MigrationSource>) -> Result<Self> {
        Self::with_password(&PostgresBackend::default(), config, source).await
    }

    /// Token-authenticated session against an RDS proxy or instance.
    pub async fn new_rds_proxy(
        config: &Config,
        source: Box<dyn MigrationSource>,
        credentials: AwsCredentials,
        region: impl Into<String>,
    ) -> Result<Self> {
        let provider = RdsIamTokenProvider::new(credentials);
        Self::with_token(
            &PostgresBackend::default(),
            config,
            source,
            TokenAuth::new(&provider, region),
        )
        .await
    }

    /// Session authenticated with the configured password.
    ///
    /// Fails without opening a connection when no password is configured.
    /// On any failure the source is closed before returning.
    pub async fn with_password<B: Backend>(
        backend: &B,
        config: &Config,
        mut source: Box<dyn MigrationSource>,
    ) -> Result<Self> {
        let Some(password) = config.postgres_db.password.clone() else {
            let err = MigrateError::credential(
                "password cannot be empty for a password-authenticated migrator",
            );
            return Err(close_on_error(err, vec![&mut source as &mut dyn Closer]).await);
        };
        Self::new_instance(backend, config, Credential::StaticPassword(password), source).await
    }

    /// Session authenticated with a freshly built auth token.
    ///
    /// The configured password, if any, is ignored. On any failure the source
    /// is closed before returning.
    pub async fn with_token<B: Backend>(
        backend: &B,
        config: &Config,
        mut source: Box<dyn MigrationSource>,
        auth: TokenAuth<'_>,
    ) -> Result<Self> {
        let token = match build_token(config, auth).await {
            Ok(token) => token,
            Err(err) => {
                return Err(close_on_error(err, vec![&mut source as &mut dyn Closer]).await);
            }
        };
        Self::new_instance(backend, config, Credential::EphemeralToken(token), source).await
    }

    async fn new_instance<B: Backend>(
        backend: &B,
        config: &Config,
        credential: Credential,
        mut source: Box<dyn MigrationSource>,
    ) -> Result<Self> {
        let db = &config.postgres_db;
        debug!(
            auth = credential.kind(),
            host = %db.host,
            port = db.port,
            database = %db.database,
            schema = %db.schema,
            "Creating database migrator"
        );

        let opened = match datasource_name(db, credential.secret()) {
            Ok(dsn) => backend
                .open(&dsn)
                .await
                .map_err(|e| e.during("error opening database")),
            Err(e) => Err(e),
        };
        let mut conn = match opened {
            Ok(conn) => conn,
            Err(err) => {
                return Err(close_on_error(err, vec![&mut source as &mut dyn Closer]).await);
            }
        };

        // The driver creates its version table inside the schema, so the
        // schema has to exist first.
        let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&db.schema));
        if let Err(e) = conn.execute(&create_schema).await {
            let err = e.during(format!("error creating schema {:?}", db.schema));
            return Err(close_on_error(err, vec![&mut conn as &mut dyn Closer, &mut source]).await);
        }

        let driver = match backend.with_instance(conn, DriverConfig::new(&db.schema)).await {
            Ok(driver) => driver,
            Err((mut conn, e)) => {
                let err = e.during("error creating migration database driver");
                return Err(close_on_error(err, vec![&mut conn as &mut dyn Closer, &mut source]).await);
            }
        };

        let logger = MigrationLogger::new(config.verbose_logging);
        let engine = match Migrate::with_instance(source, driver, logger).await {
            Ok(engine) => engine,
            Err(ConstructionFailure {
                error,
                mut source,
                mut driver,
            }) => {
                let err = error.during("error creating migrate instance");
                return Err(close_on_error(err, vec![&mut driver as &mut dyn Closer, &mut source]).await);
            }
        };

        info!(schema = %db.schema, auth = credential.kind(), "Database migrator ready");
        Ok(Self { engine })
    }

    /// The logger attached to this session.
    #[must_use]
    pub fn logger(&self) -> MigrationLogger {
        self.engine.logger()
    }

    /// Apply every pending migration.
    pub async fn up(&mut self) -> Result<()> {
        let result = self.engine.up().await;
        self.no_change_is_ok(result)
    }

    /// Revert every applied migration.
    pub async fn down(&mut self) -> Result<()> {
        let result = self.engine.down().await;
        self.no_change_is_ok(result)
    }

    /// Migrate up or down to exactly `version`.
    pub async fn migrate(&mut self, version: i64) -> Result<()> {
        let result = self.engine.migrate(version).await;
        self.no_change_is_ok(result)
    }

    /// Drop every table in the schema. Meant for test teardown.
    pub async fn drop_all(&mut self) -> Result<()> {
        self.engine.drop_all().await
    }

    /// Current version pointer.
    pub async fn version(&mut self) -> Result<Option<VersionState>> {
        self.engine.version().await
    }

    /// Set the version without running migrations and clear the dirty flag.
    pub async fn force(&mut self, version: i64) -> Result<()> {
        self.engine.force(version).await
    }

    /// Close the migration source and the database, returning
    /// `(source_result, database_result)`.
    pub async fn close(self) -> (Result<()>, Result<()>) {
        self.engine.close().await
    }

    /// Close, logging failures as warnings instead of returning them.
    pub async fn close_and_log_error(self) {
        let logger = self.logger();
        let (source, database) = self.close().await;
        if let Err(e) = source {
            logger.warn(&format!("warning: source error closing DatabaseMigrator: {e}"));
        }
        if let Err(e) = database {
            logger.warn(&format!("warning: database error closing DatabaseMigrator: {e}"));
        }
    }

    fn no_change_is_ok(&self, result: Result<()>) -> Result<()> {
        match result {
            Err(MigrateError::NoChange) => {
                self.engine.logger().log("no changes");
                Ok(())
            }
            other => other,
        }
    }
}

async fn build_token(config: &Config, auth: TokenAuth<'_>) -> Result<SecretString> {
    let request = TokenRequest {
        endpoint: config.postgres_db.endpoint(),
        region: auth.region,
        user: config.postgres_db.user.clone(),
    };

    tokio::time::timeout(auth.timeout, auth.provider.build_auth_token(&request))
        .await
        .map_err(|_| {
            MigrateError::credential(format!(
                "error building auth token for migrator: timed out after {:?}",
                auth.timeout
            ))
        })?
        .map_err(|e| MigrateError::credential(format!("error building auth token for migrator: {e}")))
}
