//! schemactl library
//!
//! Config resolution, database resolution and schema migration commands,
//! exported for the binary and for integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod project;
pub mod provider;
pub mod schema;
