//! Verbosity-aware migration logging.

use tracing::{info, warn};

/// Logger attached to a migration engine.
///
/// Lifecycle messages are always emitted; per-migration progress only when
/// verbose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationLogger {
    verbose: bool,
}

impl MigrationLogger {
    /// Create a logger.
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Whether per-migration progress is logged.
    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Log a lifecycle message.
    pub fn log(&self, message: &str) {
        info!(target: "dbmigrate", "{message}");
    }

    /// Log a progress message when verbose.
    pub fn log_verbose(&self, message: &str) {
        if self.verbose {
            info!(target: "dbmigrate", "{message}");
        }
    }

    /// Log a warning.
    pub fn warn(&self, message: &str) {
        warn!(target: "dbmigrate", "{message}");
    }
}
