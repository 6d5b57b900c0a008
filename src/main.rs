//! # dbmigrate
//!
//! Applies versioned SQL migrations to a PostgreSQL schema, authenticating
//! with a password or an RDS IAM auth token.
//!
//! ## Usage
//!
//! ```bash
//! # Apply everything under ./migrations
//! POSTGRES_USER=postgres POSTGRES_PASSWORD=secret POSTGRES_SCHEMA=app dbmigrate up
//!
//! # Roll back to a version through an RDS proxy
//! dbmigrate --auth token --region us-east-1 goto 20250319124829
//!
//! # Show the resolved configuration
//! dbmigrate --default POSTGRES_SCHEMA=app config
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod output;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json);

    cli.execute().await
}

/// Initialize tracing based on verbosity and format.
///
/// Migration progress is logged at info level, so the default filter keeps
/// the `dbmigrate` target visible.
fn init_tracing(verbose: u8, json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::new("warn,dbmigrate=info"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(verbose > 1))
            .init();
    }
}
