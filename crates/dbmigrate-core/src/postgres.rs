//! PostgreSQL backend built on sqlx.

use crate::cleanup::Closer;
use crate::driver::{quote_ident, Backend, DatabaseDriver, DriverConfig, SqlConnection, VersionState};
use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Connection, Executor, Row};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const CONNECTION_KIND: &str = "postgres connection";
const DRIVER_KIND: &str = "postgres driver";

/// Opens [`PgConnection`]s and wraps them as [`PostgresDriver`]s.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    connect_timeout: Duration,
}

impl Default for PostgresBackend {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl PostgresBackend {
    /// Backend with the default 30s connect timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Turn a DSN into connect options. `search_path` in the query string
/// becomes a server startup option.
fn connect_options(dsn: &str) -> Result<PgConnectOptions> {
    let mut url =
        Url::parse(dsn).map_err(|e| MigrateError::connection(format!("invalid DSN: {e}")))?;

    let mut search_path = None;
    let rest: Vec<(String, String)> = url
        .query_pairs()
        .filter_map(|(k, v)| {
            if k == "search_path" {
                search_path = Some(v.into_owned());
                None
            } else {
                Some((k.into_owned(), v.into_owned()))
            }
        })
        .collect();
    if rest.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(rest);
    }

    let options = PgConnectOptions::from_str(url.as_str())
        .map_err(|e| MigrateError::connection(format!("invalid DSN: {e}")))?;
    Ok(match search_path {
        Some(path) if !path.is_empty() => options.options([("search_path", path)]),
        _ => options,
    })
}

#[async_trait]
impl Backend for PostgresBackend {
    type Connection = PostgresConnection;

    async fn open(&self, dsn: &SecretString) -> Result<PostgresConnection> {
        let options = connect_options(dsn.expose_secret())?;
        debug!(timeout = ?self.connect_timeout, "Opening postgres connection");

        let conn = tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&options))
            .await
            .map_err(|_| {
                MigrateError::Timeout(format!(
                    "connecting to postgres after {:?}",
                    self.connect_timeout
                ))
            })?
            .map_err(|e| MigrateError::connection(e.to_string()))?;

        Ok(PostgresConnection { conn: Some(conn) })
    }

    async fn with_instance(
        &self,
        mut conn: PostgresConnection,
        config: DriverConfig,
    ) -> std::result::Result<Box<dyn DatabaseDriver>, (PostgresConnection, MigrateError)> {
        let Some(mut pg) = conn.conn.take() else {
            return Err((conn, MigrateError::Closed(CONNECTION_KIND)));
        };
        if let Err(e) = ensure_version_table(&mut pg, &config).await {
            return Err((PostgresConnection { conn: Some(pg) }, e));
        }
        Ok(Box::new(PostgresDriver {
            conn: Some(pg),
            config,
        }))
    }
}

/// An open PostgreSQL connection.
pub struct PostgresConnection {
    conn: Option<PgConnection>,
}

impl std::fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("open", &self.conn.is_some())
            .finish()
    }
}

#[async_trait]
impl Closer for PostgresConnection {
    fn kind(&self) -> &'static str {
        CONNECTION_KIND
    }

    async fn close(&mut self) -> Result<()> {
        close_pg(&mut self.conn, CONNECTION_KIND).await
    }
}

#[async_trait]
impl SqlConnection for PostgresConnection {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let conn = self
            .conn
            .as_mut()
            .ok_or(MigrateError::Closed(CONNECTION_KIND))?;
        let result = conn.execute(sqlx::raw_sql(sql)).await?;
        Ok(result.rows_affected())
    }
}

async fn close_pg(conn: &mut Option<PgConnection>, kind: &'static str) -> Result<()> {
    match conn.take() {
        Some(conn) => conn.close().await.map_err(|e| MigrateError::close(kind, e)),
        None => Ok(()),
    }
}

fn version_table(config: &DriverConfig) -> String {
    format!(
        "{}.{}",
        quote_ident(&config.schema_name),
        quote_ident(&config.migrations_table)
    )
}

async fn ensure_version_table(conn: &mut PgConnection, config: &DriverConfig) -> Result<()> {
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (version BIGINT NOT NULL PRIMARY KEY, dirty BOOLEAN NOT NULL)",
        version_table(config)
    );
    conn.execute(sqlx::raw_sql(&sql)).await?;
    Ok(())
}

/// Migration driver keeping its version table in one schema.
pub struct PostgresDriver {
    conn: Option<PgConnection>,
    config: DriverConfig,
}

impl std::fmt::Debug for PostgresDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDriver")
            .field("open", &self.conn.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl PostgresDriver {
    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.conn.as_mut().ok_or(MigrateError::Closed(DRIVER_KIND))
    }
}

#[async_trait]
impl Closer for PostgresDriver {
    fn kind(&self) -> &'static str {
        DRIVER_KIND
    }

    async fn close(&mut self) -> Result<()> {
        close_pg(&mut self.conn, DRIVER_KIND).await
    }
}

#[async_trait]
impl DatabaseDriver for PostgresDriver {
    async fn version(&mut self) -> Result<Option<VersionState>> {
        let sql = format!("SELECT version, dirty FROM {} LIMIT 1", version_table(&self.config));
        let row: Option<PgRow> = self.conn()?.fetch_optional(sqlx::query(&sql)).await?;
        match row {
            Some(row) => Ok(Some(VersionState {
                version: row.try_get("version")?,
                dirty: row.try_get("dirty")?,
            })),
            None => Ok(None),
        }
    }

    async fn set_version(&mut self, version: Option<i64>, dirty: bool) -> Result<()> {
        let table = version_table(&self.config);
        let mut tx = self.conn()?.begin().await?;

        sqlx::query(&format!("TRUNCATE {table}"))
            .execute(&mut *tx)
            .await?;
        if let Some(version) = version {
            sqlx::query(&format!("INSERT INTO {table} (version, dirty) VALUES ($1, $2)"))
                .bind(version)
                .bind(dirty)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn run(&mut self, sql: &str) -> Result<()> {
        self.conn()?.execute(sqlx::raw_sql(sql)).await?;
        Ok(())
    }

    async fn drop_all(&mut self) -> Result<()> {
        let schema = self.config.schema_name.clone();
        let rows: Vec<PgRow> = self
            .conn()?
            .fetch_all(
                sqlx::query(
                    "SELECT table_name::text FROM information_schema.tables \
                     WHERE table_schema = $1 AND table_type = 'BASE TABLE'",
                )
                .bind(&schema),
            )
            .await?;
        let tables = rows
            .iter()
            .map(|row| row.try_get::<String, _>(0))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for table in &tables {
            let sql = format!(
                "DROP TABLE IF EXISTS {}.{} CASCADE",
                quote_ident(&schema),
                quote_ident(table)
            );
            self.conn()?.execute(sqlx::raw_sql(&sql)).await?;
        }
        info!(schema = %schema, count = tables.len(), "Dropped tables");

        let config = self.config.clone();
        ensure_version_table(self.conn()?, &config).await
    }
}
