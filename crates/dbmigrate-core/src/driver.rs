//! Database seams: connection backends and migration drivers.

use crate::cleanup::Closer;
use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use secrecy::SecretString;

/// Default name of the version table.
pub const DEFAULT_MIGRATIONS_TABLE: &str = "schema_migrations";

/// Applied-version pointer stored by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionState {
    /// Last migration version the pointer was moved to.
    pub version: i64,
    /// Whether the migration at `version` failed part-way.
    pub dirty: bool,
}

/// Where a driver keeps its version table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Schema holding the version table.
    pub schema_name: String,
    /// Version table name.
    pub migrations_table: String,
}

impl DriverConfig {
    /// Version table `schema_migrations` inside `schema_name`.
    #[must_use]
    pub fn new(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
        }
    }
}

/// A raw SQL connection.
#[async_trait]
pub trait SqlConnection: Closer {
    /// Execute one or more statements, returning the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64>;
}

/// A connection wrapped with migration bookkeeping.
#[async_trait]
pub trait DatabaseDriver: Closer {
    /// Current version pointer, `None` when nothing is applied.
    async fn version(&mut self) -> Result<Option<VersionState>>;

    /// Move the version pointer. `None` clears it.
    async fn set_version(&mut self, version: Option<i64>, dirty: bool) -> Result<()>;

    /// Run a migration body.
    async fn run(&mut self, sql: &str) -> Result<()>;

    /// Drop every table in the schema, leaving an empty version table.
    async fn drop_all(&mut self) -> Result<()>;
}

/// Something that can open connections and wrap them as drivers.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Connection type produced by [`open`](Self::open).
    type Connection: SqlConnection + 'static;

    /// Open a connection from a DSN.
    async fn open(&self, dsn: &SecretString) -> Result<Self::Connection>;

    /// Wrap `conn` as a schema-scoped driver.
    ///
    /// On failure the connection is handed back so the caller can close it.
    async fn with_instance(
        &self,
        conn: Self::Connection,
        config: DriverConfig,
    ) -> std::result::Result<Box<dyn DatabaseDriver>, (Self::Connection, MigrateError)>;
}

/// Quote a SQL identifier, doubling embedded double quotes.
#[must_use]
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
