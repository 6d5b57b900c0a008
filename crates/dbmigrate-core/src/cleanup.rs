//! Releasing acquired resources when a later step fails.

use crate::error::{CloseFailure, MigrateError, Result};
use async_trait::async_trait;
use tracing::debug;

/// A resource that must be closed explicitly.
#[async_trait]
pub trait Closer: Send {
    /// Human-readable resource type, used in aggregated error messages.
    fn kind(&self) -> &'static str;

    /// Release the resource.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl<T: Closer + ?Sized> Closer for Box<T> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

/// Close every resource in `closers` and fold any close failures into
/// `original`.
///
/// All resources are closed even when an earlier one fails. If every close
/// succeeds `original` is returned untouched.
pub async fn close_on_error(original: MigrateError, closers: Vec<&mut dyn Closer>) -> MigrateError {
    let mut failures = Vec::new();
    for closer in closers {
        let kind = closer.kind();
        debug!(resource = kind, error = %original, "Closing resource after error");
        if let Err(error) = closer.close().await {
            failures.push(CloseFailure { kind, error });
        }
    }

    if failures.is_empty() {
        original
    } else {
        MigrateError::CleanupFailed {
            source: Box::new(original),
            failures,
        }
    }
}
