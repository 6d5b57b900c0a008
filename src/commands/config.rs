//! Config command - show the resolved configuration.

use anyhow::Result;
use dbmigrate_config::{Config, DefaultSettings};
use serde::Serialize;

use crate::output::{self, CommandResult, OutputFormat};

const REDACTED: &str = "********";

/// Resolved configuration, safe to print.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ConfigOutput {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// A placeholder when a password is configured, `None` otherwise.
    pub password: Option<&'static str>,
    /// Database name.
    pub database: String,
    /// Schema holding migrated objects and the version table.
    pub schema: String,
    /// Whether per-migration progress is logged.
    pub verbose_logging: bool,
}

impl From<&Config> for ConfigOutput {
    fn from(config: &Config) -> Self {
        let db = &config.postgres_db;
        Self {
            host: db.host.clone(),
            port: db.port,
            user: db.user.clone(),
            password: db.has_password().then_some(REDACTED),
            database: db.database.clone(),
            schema: db.schema.clone(),
            verbose_logging: config.verbose_logging,
        }
    }
}

/// Execute the config command.
pub fn execute(defaults: &DefaultSettings, format: OutputFormat) -> Result<()> {
    let config = Config::load(defaults)?;
    let out = ConfigOutput::from(&config);

    match format {
        OutputFormat::Json => output::json(&CommandResult::success(out, "configuration resolved")),
        OutputFormat::Text => {
            output::section("PostgreSQL");
            output::key_value("Host", &out.host);
            output::key_value("Port", &out.port.to_string());
            output::key_value("User", &out.user);
            output::key_value("Password", out.password.unwrap_or("(not set)"));
            output::key_value("Database", &out.database);
            output::key_value("Schema", &out.schema);

            output::section("Logging");
            output::key_value("Verbose", &out.verbose_logging.to_string());

            if out.password.is_none() {
                println!();
                output::warning("no password configured, sessions will use IAM token auth");
            }
            Ok(())
        }
    }
}
