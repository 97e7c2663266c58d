//! Database layer: connection handle and config-driven resolution.

mod resolve;

pub use resolve::{resolve_database, table_prefix};

use crate::error::{Result, SchemaError};
use rusqlite::Connection;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// Adapter names that open a SQLite database.
pub const SQLITE_ADAPTERS: &[&str] = &["pdo_sqlite", "sqlite", "sqlite3"];

/// Database handle wrapping a single connection.
///
/// One handle is opened per command and handed down by reference; it is not
/// pooled or shared across invocations.
pub struct Database {
    conn: Connection,
    adapter: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("adapter", &self.adapter)
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Database {
    /// Open a connection for `adapter` using its config `params`.
    pub fn connect(adapter: &str, params: &Map<String, Value>) -> Result<Self> {
        let normalized = adapter.trim().to_lowercase();
        if !SQLITE_ADAPTERS.contains(&normalized.as_str()) {
            return Err(SchemaError::UnsupportedAdapter(adapter.to_string()));
        }

        let dbname = params
            .get("dbname")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .ok_or(SchemaError::DatabaseNotInitialized)?;

        if dbname == ":memory:" {
            return Self::open_in_memory();
        }

        debug!(adapter = %normalized, dbname, "Opening database");
        Self::open(Path::new(dbname), normalized)
    }

    fn open(path: &Path, adapter: String) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, adapter })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            adapter: "pdo_sqlite".to_string(),
        })
    }

    /// The normalized adapter name this handle was opened with.
    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    /// Execute a function with access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        f(&self.conn)
    }

    /// Execute a function with mutable access to the connection (for transactions).
    pub fn with_conn_mut<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        f(&mut self.conn)
    }
}
