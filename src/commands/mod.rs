//! CLI commands module.

pub mod config;
pub mod migrate;
