//! # dbmigrate-core
//!
//! Schema migration sessions for PostgreSQL.
//!
//! This crate provides:
//! - [`DatabaseMigrator`], a session authenticated with a static password or
//!   an RDS IAM auth token
//! - schema creation before migration bookkeeping is set up
//! - up / down / migrate-to-version / drop operations
//! - cleanup of partially acquired resources with aggregated close errors
//! - embedded and directory migration sources
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbmigrate_config::{Config, DefaultSettings};
//! use dbmigrate_core::{DatabaseMigrator, DirectorySource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(&DefaultSettings::new())?;
//!     let source = DirectorySource::open("migrations").await?;
//!
//!     let mut migrator = DatabaseMigrator::new_local(&config, Box::new(source)).await?;
//!     let result = migrator.up().await;
//!     migrator.close_and_log_error().await;
//!     result?;
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cleanup;
pub mod driver;
pub mod dsn;
pub mod engine;
pub mod error;
pub mod logger;
pub mod migration;
pub mod migrator;
pub mod postgres;
pub mod source;
pub mod token;

pub use cleanup::{close_on_error, Closer};
pub use driver::{Backend, DatabaseDriver, DriverConfig, SqlConnection, VersionState};
pub use engine::{ConstructionFailure, Migrate};
pub use error::{CloseFailure, MigrateError, Result};
pub use logger::MigrationLogger;
pub use migration::Migration;
pub use migrator::{Credential, DatabaseMigrator, TokenAuth, DEFAULT_TOKEN_TIMEOUT};
pub use postgres::{PostgresBackend, PostgresConnection, PostgresDriver};
pub use source::{DirectorySource, EmbeddedSource, MigrationSource};
pub use token::{AwsCredentials, RdsIamTokenProvider, TokenProvider, TokenRequest};

/// Re-export sqlx types for convenience
pub use sqlx;
