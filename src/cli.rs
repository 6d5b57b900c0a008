//! CLI argument definitions using clap.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use dbmigrate_config::{keys, DefaultSettings};
use std::path::PathBuf;
use std::time::Duration;

use crate::commands;
use crate::output::OutputFormat;

/// dbmigrate - versioned schema migrations for PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "dbmigrate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding `{version}_{title}.up.sql` / `.down.sql` files
    #[arg(short, long, env = "MIGRATIONS_PATH", default_value = "migrations", global = true)]
    pub path: PathBuf,

    /// How to authenticate against the database
    #[arg(long, value_enum, default_value_t = AuthMode::Auto, global = true)]
    pub auth: AuthMode,

    /// AWS region for token auth (falls back to AWS_DEFAULT_REGION)
    #[arg(long, env = "AWS_REGION", global = true)]
    pub region: Option<String>,

    /// Deadline for building an auth token
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration, global = true)]
    pub token_timeout: Duration,

    /// Default for a setting, used when its environment variable is unset
    #[arg(long = "default", value_name = "KEY=VALUE", value_parser = parse_default, global = true)]
    pub defaults: Vec<(String, String)>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Credential used to open the session.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Password when one is configured, otherwise an IAM auth token
    Auto,
    /// The configured password
    Password,
    /// An RDS IAM auth token built from AWS credentials in the environment
    Token,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply all pending migrations
    Up,

    /// Roll back all applied migrations
    Down,

    /// Migrate up or down to a specific version
    Goto(commands::migrate::GotoArgs),

    /// Drop every table in the schema
    Drop(commands::migrate::DropArgs),

    /// Show the current version
    Version,

    /// Set the version without running migrations and clear the dirty flag
    Force(commands::migrate::ForceArgs),

    /// Show the resolved configuration
    Config,
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let format = OutputFormat::from_json_flag(self.json);
        let defaults = self.default_settings();

        let session = commands::migrate::SessionOptions {
            path: self.path,
            auth: self.auth,
            region: self.region,
            token_timeout: self.token_timeout,
            defaults,
        };

        match self.command {
            Commands::Config => commands::config::execute(&session.defaults, format),
            Commands::Up => commands::migrate::up(session, format).await,
            Commands::Down => commands::migrate::down(session, format).await,
            Commands::Goto(args) => commands::migrate::goto(args, session, format).await,
            Commands::Drop(args) => commands::migrate::drop(args, session, format).await,
            Commands::Version => commands::migrate::version(session, format).await,
            Commands::Force(args) => commands::migrate::force(args, session, format).await,
        }
    }

    fn default_settings(&self) -> DefaultSettings {
        self.defaults
            .iter()
            .fold(DefaultSettings::new(), |settings, (key, value)| {
                settings.with(key.as_str(), value.as_str())
            })
    }
}

/// Parse `KEY=VALUE`, accepting only known setting keys.
fn parse_default(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    if keys::by_name(key).is_none() {
        let known: Vec<&str> = keys::ALL.iter().map(|k| k.name).collect();
        return Err(format!("unknown setting {key:?}, expected one of {}", known.join(", ")));
    }
    Ok((key.to_string(), value.to_string()))
}
