//! Integration tests for dbmigrate
//!
//! This crate provides:
//! - In-memory mock backends, drivers, sources and token providers
//! - Session lifecycle tests, including partial-failure cleanup
//! - Engine ordering and dirty-state tests
//! - Configuration precedence tests against the real process environment
//! - A live PostgreSQL test (ignored by default)

pub mod mock_database;

// Re-export commonly used items
pub use fixtures::*;
pub use helpers::*;
pub use mock_database::*;

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod engine_tests;
