//! Migration commands: up, down, goto, drop, version and force.
//!
//! Every command opens one session, runs one operation and closes the
//! session whether or not the operation succeeded.

use anyhow::{anyhow, bail, Result};
use clap::Args;
use dbmigrate_config::{Config, DefaultSettings, ProcessEnv};
use dbmigrate_core::token::region_from_env;
use dbmigrate_core::{
    DatabaseMigrator, DirectorySource, PostgresBackend, RdsIamTokenProvider, TokenAuth,
    VersionState,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::cli::AuthMode;
use crate::output::{self, CommandResult, OutputFormat};

/// Arguments for goto.
#[derive(Args, Debug)]
pub struct GotoArgs {
    /// Target migration version
    #[arg(value_name = "VERSION")]
    pub target: i64,
}

/// Arguments for drop.
#[derive(Args, Debug)]
pub struct DropArgs {
    /// Confirm dropping every table in the schema
    #[arg(long)]
    pub yes: bool,
}

/// Arguments for force.
#[derive(Args, Debug)]
pub struct ForceArgs {
    /// Version to record as applied
    #[arg(value_name = "VERSION")]
    pub target: i64,
}

/// Everything needed to open a session.
#[derive(Debug)]
pub struct SessionOptions {
    /// Migrations directory.
    pub path: PathBuf,
    /// Credential selection.
    pub auth: AuthMode,
    /// AWS region override for token auth.
    pub region: Option<String>,
    /// Deadline for building an auth token.
    pub token_timeout: Duration,
    /// Caller-supplied setting defaults.
    pub defaults: DefaultSettings,
}

/// Version pointer output.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct VersionOutput {
    /// Applied version, `None` when nothing is applied.
    pub version: Option<i64>,
    /// Whether the last migration failed part-way.
    pub dirty: bool,
}

impl From<Option<VersionState>> for VersionOutput {
    fn from(state: Option<VersionState>) -> Self {
        Self {
            version: state.map(|s| s.version),
            dirty: state.is_some_and(|s| s.dirty),
        }
    }
}

impl std::fmt::Display for VersionOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.version, self.dirty) {
            (None, _) => write!(f, "no migrations applied"),
            (Some(version), false) => write!(f, "version {version}"),
            (Some(version), true) => write!(f, "version {version} (dirty)"),
        }
    }
}

/// Apply all pending migrations.
pub async fn up(options: SessionOptions, format: OutputFormat) -> Result<()> {
    let mut migrator = open(options).await?;
    let start = Instant::now();
    let result = migrator.up().await;
    finish(migrator, result, "Migrated up", start, format).await
}

/// Roll back all applied migrations.
pub async fn down(options: SessionOptions, format: OutputFormat) -> Result<()> {
    let mut migrator = open(options).await?;
    let start = Instant::now();
    let result = migrator.down().await;
    finish(migrator, result, "Migrated down", start, format).await
}

/// Migrate to a specific version.
pub async fn goto(args: GotoArgs, options: SessionOptions, format: OutputFormat) -> Result<()> {
    let mut migrator = open(options).await?;
    let start = Instant::now();
    let result = migrator.migrate(args.target).await;
    let message = format!("Migrated to {}", args.target);
    finish(migrator, result, &message, start, format).await
}

/// Drop every table in the schema.
pub async fn drop(args: DropArgs, options: SessionOptions, format: OutputFormat) -> Result<()> {
    if !args.yes {
        bail!("drop removes every table in the schema, pass --yes to confirm");
    }
    let mut migrator = open(options).await?;
    let start = Instant::now();
    let result = migrator.drop_all().await;
    finish(migrator, result, "Dropped all tables", start, format).await
}

/// Show the current version.
pub async fn version(options: SessionOptions, format: OutputFormat) -> Result<()> {
    let mut migrator = open(options).await?;
    let result = migrator.version().await;
    migrator.close_and_log_error().await;

    let current = VersionOutput::from(result?);
    match format {
        OutputFormat::Json => output::json(&current),
        OutputFormat::Text => {
            output::key_value("Current", &current.to_string());
            Ok(())
        }
    }
}

/// Record a version without running migrations.
pub async fn force(args: ForceArgs, options: SessionOptions, format: OutputFormat) -> Result<()> {
    let mut migrator = open(options).await?;
    let start = Instant::now();
    let result = migrator.force(args.target).await;
    let message = format!("Forced version {}", args.target);
    finish(migrator, result, &message, start, format).await
}

async fn open(options: SessionOptions) -> Result<DatabaseMigrator> {
    let config = Config::load(&options.defaults)?;
    let source = DirectorySource::open(&options.path).await?;

    let use_token = match options.auth {
        AuthMode::Auto => !config.postgres_db.has_password(),
        AuthMode::Password => false,
        AuthMode::Token => true,
    };
    debug!(
        path = %options.path.display(),
        auth = if use_token { "token" } else { "password" },
        "Opening migration session"
    );

    if !use_token {
        return Ok(DatabaseMigrator::new_local(&config, Box::new(source)).await?);
    }

    let region = options
        .region
        .or_else(|| region_from_env(&ProcessEnv))
        .ok_or_else(|| anyhow!("token auth needs an AWS region, set --region or AWS_REGION"))?;
    let provider = RdsIamTokenProvider::from_env()?;
    let auth = TokenAuth::new(&provider, region).with_timeout(options.token_timeout);

    Ok(DatabaseMigrator::with_token(&PostgresBackend::default(), &config, Box::new(source), auth)
        .await?)
}

/// Close the session, then report `result` together with the version the
/// database ended up at.
async fn finish(
    mut migrator: DatabaseMigrator,
    result: dbmigrate_core::Result<()>,
    message: &str,
    start: Instant,
    format: OutputFormat,
) -> Result<()> {
    let state = match result {
        Ok(()) => migrator.version().await,
        Err(e) => Err(e),
    };
    migrator.close_and_log_error().await;

    match state {
        Ok(state) => {
            let current = VersionOutput::from(state);
            let elapsed = output::format_duration(start.elapsed());
            info!(elapsed = %elapsed, "{message}");
            let message = format!("{message} in {elapsed}, now at {current}");
            CommandResult::success(current, message).print(format)
        }
        Err(e) => {
            if format == OutputFormat::Json {
                CommandResult::<()>::failure(e.to_string()).print(format)?;
            }
            Err(e.into())
        }
    }
}
