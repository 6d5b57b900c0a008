//! Migration types and utilities.

use crate::error::{MigrateError, Result};
use std::fmt;

/// A database migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Migration version (timestamp-based recommended).
    pub version: i64,
    /// Migration name/description.
    pub name: String,
    /// SQL to apply the migration.
    pub up_sql: String,
    /// SQL to roll back the migration (optional).
    pub down_sql: Option<String>,
}

impl Migration {
    /// Create a new migration.
    #[must_use]
    pub fn new(version: i64, name: impl Into<String>, up_sql: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            up_sql: up_sql.into(),
            down_sql: None,
        }
    }

    /// Set the down SQL for rollback.
    #[must_use]
    pub fn with_down(mut self, down_sql: impl Into<String>) -> Self {
        self.down_sql = Some(down_sql.into());
        self
    }

    /// Check if rollback is supported.
    #[must_use]
    pub fn supports_rollback(&self) -> bool {
        self.down_sql.is_some()
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.version, self.name)
    }
}

/// Sort migrations by version and reject duplicates.
pub fn sort_and_validate(migrations: &mut [Migration]) -> Result<()> {
    migrations.sort_by_key(|m| m.version);
    if let Some(pair) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(MigrateError::source_error(format!(
            "duplicate migration version {} ({} and {})",
            pair[0].version, pair[0].name, pair[1].name
        )));
    }
    Ok(())
}
