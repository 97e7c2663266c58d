//! Resolve the database connection and table prefix from application config.

use super::Database;
use crate::config::AppConfig;
use crate::error::{Result, SchemaError};
use tracing::debug;

/// Open the database described by `config`.
///
/// `resources.db` is preferred. Otherwise the first `resources.multidb`
/// entry flagged `default` is used, with the whole entry as its params.
/// Fails with `DatabaseNotInitialized` when neither yields a connection.
pub fn resolve_database(config: &AppConfig) -> Result<Database> {
    let resources = config.resources();

    if let Some(db) = resources.db {
        let adapter = db.adapter.ok_or(SchemaError::DatabaseNotInitialized)?;
        debug!(adapter = %adapter, "Using resources.db");
        return Database::connect(&adapter, &db.params);
    }

    if let Some(entry) = resources.default_multidb() {
        let adapter = entry.adapter.ok_or(SchemaError::DatabaseNotInitialized)?;
        debug!(adapter = %adapter, name = %entry.name, "Using default resources.multidb entry");
        return Database::connect(&adapter, &entry.params);
    }

    Err(SchemaError::DatabaseNotInitialized)
}

/// Table prefix for schema bookkeeping: `<table_prefix>_`, or empty.
pub fn table_prefix(config: &AppConfig) -> String {
    config
        .resources()
        .db
        .and_then(|db| db.table_prefix)
        .filter(|prefix| !prefix.is_empty())
        .map(|prefix| format!("{prefix}_"))
        .unwrap_or_default()
}
