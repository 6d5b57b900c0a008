//! Migration error types.

use dbmigrate_config::ConfigError;
use std::fmt::Write as _;

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

/// A resource that failed to close during cleanup.
#[derive(Debug)]
pub struct CloseFailure {
    /// Type of the resource, e.g. `"postgres connection"`.
    pub kind: &'static str,
    /// The close error.
    pub error: MigrateError,
}

/// Migration error type.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Configuration could not be resolved.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No usable credential: missing password or token acquisition failure.
    #[error("credential error: {0}")]
    Credential(String),

    /// The database could not be reached.
    #[error("database connection error: {0}")]
    Connection(String),

    /// A step of session construction failed.
    #[error("{stage}: {source}")]
    Construction {
        /// What was being built, e.g. `"error creating schema \"app\""`.
        stage: String,
        /// Underlying error.
        source: Box<MigrateError>,
    },

    /// SQL execution error reported by the database.
    #[error("SQL execution error: {0}")]
    Execution(String),

    /// The migration source could not be read.
    #[error("migration source error: {0}")]
    Source(String),

    /// A single migration failed to apply.
    #[error("migration {version} ({name}) failed: {source}")]
    Migration {
        /// Migration version.
        version: i64,
        /// Migration name.
        name: String,
        /// Executor error, unchanged.
        source: Box<MigrateError>,
    },

    /// A previous migration failed part-way.
    #[error("database is dirty at version {0}; fix the schema and force a version")]
    Dirty(i64),

    /// No migration exists with the requested version.
    #[error("no migration found for version {0}")]
    UnknownVersion(i64),

    /// A down step was required but the migration has none.
    #[error("migration {version} has no down migration")]
    MissingDown {
        /// Migration version.
        version: i64,
    },

    /// A resource could not be closed.
    #[error("error closing {kind}: {reason}")]
    Close {
        /// Type of the resource.
        kind: &'static str,
        /// Failure reason.
        reason: String,
    },

    /// An operation failed and cleaning up after it failed too.
    #[error("{}", cleanup_message(.source, .failures))]
    CleanupFailed {
        /// The error that triggered the cleanup.
        source: Box<MigrateError>,
        /// Every resource that failed to close.
        failures: Vec<CloseFailure>,
    },

    /// A resource was used after it was closed.
    #[error("{0} is closed")]
    Closed(&'static str),

    /// An operation exceeded its deadline.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Nothing to do. Sessions turn this into success.
    #[error("no change")]
    NoChange,
}

fn cleanup_message(source: &MigrateError, failures: &[CloseFailure]) -> String {
    let mut msg = source.to_string();
    for failure in failures {
        let _ = write!(
            msg,
            "; in addition an error occurred when closing {}: {}",
            failure.kind, failure.error
        );
    }
    msg
}

impl MigrateError {
    /// Create a credential error.
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a source error.
    pub fn source_error(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a close error for a resource of type `kind`.
    pub fn close(kind: &'static str, reason: impl ToString) -> Self {
        Self::Close {
            kind,
            reason: reason.to_string(),
        }
    }

    /// Wrap `self` with the construction stage it happened in.
    #[must_use]
    pub fn during(self, stage: impl Into<String>) -> Self {
        Self::Construction {
            stage: stage.into(),
            source: Box::new(self),
        }
    }

    /// Whether this is the "nothing to do" condition.
    #[must_use]
    pub fn is_no_change(&self) -> bool {
        matches!(self, Self::NoChange)
    }

    /// The error that started it all, skipping cleanup aggregation.
    #[must_use]
    pub fn original(&self) -> &Self {
        match self {
            Self::CleanupFailed { source, .. } => source.original(),
            other => other,
        }
    }
}

impl From<sqlx::Error> for MigrateError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(e) => Self::Connection(e.to_string()),
            sqlx::Error::Io(e) => Self::Connection(e.to_string()),
            sqlx::Error::Tls(e) => Self::Connection(e.to_string()),
            sqlx::Error::Database(e) => Self::Execution(e.to_string()),
            _ => Self::Execution(err.to_string()),
        }
    }
}
