//! Migration engine.
//!
//! Moves a driver's version pointer across the migrations of a source, one
//! migration at a time. Every step marks the version dirty before running
//! the body and clears it afterwards, so a failed step leaves the database
//! dirty until [`Migrate::force`] is used.

use crate::driver::{DatabaseDriver, VersionState};
use crate::error::{MigrateError, Result};
use crate::logger::MigrationLogger;
use crate::migration::Migration;
use crate::source::MigrationSource;
use std::time::Instant;

/// A source combined with a driver.
pub struct Migrate {
    source: Box<dyn MigrationSource>,
    driver: Box<dyn DatabaseDriver>,
    logger: MigrationLogger,
}

/// Returned when [`Migrate::with_instance`] rejects its inputs. Both
/// resources are handed back unclosed.
pub struct ConstructionFailure {
    /// Why construction failed.
    pub error: MigrateError,
    /// The migration source.
    pub source: Box<dyn MigrationSource>,
    /// The database driver.
    pub driver: Box<dyn DatabaseDriver>,
}

impl std::fmt::Debug for ConstructionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstructionFailure")
            .field("error", &self.error)
            .field("source", &self.source.kind())
            .field("driver", &self.driver.kind())
            .finish()
    }
}

enum Step<'a> {
    Up(&'a Migration),
    Down {
        migration: &'a Migration,
        previous: Option<i64>,
    },
}

impl Migrate {
    /// Combine `source` and `driver`. The source is listed once up front so
    /// a broken source is caught here rather than mid-run.
    pub async fn with_instance(
        mut source: Box<dyn MigrationSource>,
        driver: Box<dyn DatabaseDriver>,
        logger: MigrationLogger,
    ) -> std::result::Result<Self, ConstructionFailure> {
        match source.migrations().await {
            Ok(migrations) => {
                logger.log_verbose(&format!(
                    "Loaded {} migration(s) from {}",
                    migrations.len(),
                    source.kind()
                ));
                Ok(Self {
                    source,
                    driver,
                    logger,
                })
            }
            Err(error) => Err(ConstructionFailure {
                error,
                source,
                driver,
            }),
        }
    }

    /// The attached logger.
    #[must_use]
    pub fn logger(&self) -> MigrationLogger {
        self.logger
    }

    /// Current version pointer.
    pub async fn version(&mut self) -> Result<Option<VersionState>> {
        self.driver.version().await
    }

    /// Apply every pending up migration.
    pub async fn up(&mut self) -> Result<()> {
        let current = self.clean_version().await?;
        let migrations = self.source.migrations().await?;

        let steps: Vec<Step<'_>> = migrations
            .iter()
            .filter(|m| current.map_or(true, |v| m.version > v))
            .map(Step::Up)
            .collect();
        self.run_steps(steps).await
    }

    /// Apply every down migration, newest first, until nothing is applied.
    pub async fn down(&mut self) -> Result<()> {
        let current = self.clean_version().await?;
        let migrations = self.source.migrations().await?;

        let steps = match current {
            Some(current) => down_steps(&migrations, current, None),
            None => Vec::new(),
        };
        self.run_steps(steps).await
    }

    /// Move up or down until `version` is the current version.
    pub async fn migrate(&mut self, version: i64) -> Result<()> {
        let current = self.clean_version().await?;
        let migrations = self.source.migrations().await?;

        if !migrations.iter().any(|m| m.version == version) {
            return Err(MigrateError::UnknownVersion(version));
        }

        let steps = match current {
            Some(current) if current == version => Vec::new(),
            Some(current) if current > version => down_steps(&migrations, current, Some(version)),
            _ => migrations
                .iter()
                .filter(|m| current.map_or(true, |v| m.version > v) && m.version <= version)
                .map(Step::Up)
                .collect(),
        };
        self.run_steps(steps).await
    }

    /// Drop everything in the schema.
    pub async fn drop_all(&mut self) -> Result<()> {
        self.logger.log("Dropping all tables");
        self.driver.drop_all().await
    }

    /// Set the version pointer without running anything and clear dirty.
    pub async fn force(&mut self, version: i64) -> Result<()> {
        self.logger.log(&format!("Forcing version {version}"));
        self.driver.set_version(Some(version), false).await
    }

    /// Close the source and the driver. Both are always attempted.
    pub async fn close(mut self) -> (Result<()>, Result<()>) {
        let source = self.source.close().await;
        let database = self.driver.close().await;
        (source, database)
    }

    async fn clean_version(&mut self) -> Result<Option<i64>> {
        match self.driver.version().await? {
            Some(VersionState { version, dirty: true }) => Err(MigrateError::Dirty(version)),
            state => Ok(state.map(|s| s.version)),
        }
    }

    async fn run_steps(&mut self, steps: Vec<Step<'_>>) -> Result<()> {
        if steps.is_empty() {
            return Err(MigrateError::NoChange);
        }

        for step in steps {
            let (migration, direction, sql, after) = match step {
                Step::Up(m) => (m, "up", m.up_sql.as_str(), Some(m.version)),
                Step::Down {
                    migration,
                    previous,
                } => {
                    let sql = migration
                        .down_sql
                        .as_deref()
                        .ok_or(MigrateError::MissingDown {
                            version: migration.version,
                        })?;
                    (migration, "down", sql, previous)
                }
            };

            let start = Instant::now();
            self.logger
                .log_verbose(&format!("Start applying {migration} ({direction})"));

            self.driver.set_version(Some(migration.version), true).await?;
            self.driver
                .run(sql)
                .await
                .map_err(|e| MigrateError::Migration {
                    version: migration.version,
                    name: migration.name.clone(),
                    source: Box::new(e),
                })?;
            self.driver.set_version(after, false).await?;

            self.logger.log_verbose(&format!(
                "Finished {migration} ({direction}) in {:?}",
                start.elapsed()
            ));
        }
        Ok(())
    }
}

/// Down steps from `current` (inclusive) back to `target` (exclusive),
/// newest first.
fn down_steps(migrations: &[Migration], current: i64, target: Option<i64>) -> Vec<Step<'_>> {
    let applied: Vec<&Migration> = migrations
        .iter()
        .filter(|m| m.version <= current && target.map_or(true, |t| m.version > t))
        .collect();

    applied
        .iter()
        .enumerate()
        .rev()
        .map(|(i, &m)| Step::Down {
            migration: m,
            previous: match i {
                0 => target.or_else(|| {
                    migrations
                        .iter()
                        .rev()
                        .find(|p| p.version < m.version)
                        .map(|p| p.version)
                }),
                _ => Some(applied[i - 1].version),
            },
        })
        .collect()
}
