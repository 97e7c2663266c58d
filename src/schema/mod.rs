//! Schema migration management.
//!
//! The [`SchemaManager`] trait is the contract the command layer calls;
//! [`SqlSchemaManager`] implements it over a directory of SQL migration
//! scripts and a `<prefix>schema_version` table.
//!
//! # Example
//!
//! ```ignore
//! let mut db = Database::open_in_memory()?;
//! let mut manager = SqlSchemaManager::new("./scripts/migrations", &mut db, "");
//!
//! let target = manager.process_version(Some("+2"))?;
//! match manager.update_to(target)? {
//!     UpdateResult::Success => println!("now at {}", manager.current_schema_version()?),
//!     other => println!("{other:?}"),
//! }
//! ```

mod files;
mod manager;

pub use files::{MigrationFile, MigrationScript, discover_migrations};
pub use manager::{SCHEMA_VERSION_TABLE, SqlSchemaManager};

use crate::error::{Result, SchemaError};
use regex_lite::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Schema version identifier. 0 means no migration has been applied.
pub type SchemaVersion = i64;

/// Outcome of [`SchemaManager::update_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    /// The schema is already at the requested version.
    AtCurrentVersion,
    /// No migration scripts lie between the current and requested versions.
    NoMigrationsFound,
    /// At least one migration script ran.
    Success,
}

/// A raw version request, before it is resolved against the scripts on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionToken {
    /// Newest available version.
    Latest,
    /// One script forward.
    Next,
    /// One script back.
    Prev,
    /// Signed number of scripts to move.
    Step(i64),
    /// An exact version.
    Absolute(SchemaVersion),
}

impl VersionToken {
    /// Parse an optional raw token; `None` means latest.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw {
            None => Ok(VersionToken::Latest),
            Some(raw) => raw.parse(),
        }
    }
}

fn step_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([+-])(\d+)$").expect("valid step pattern"))
}

impl FromStr for VersionToken {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let invalid = || SchemaError::InvalidVersion(s.to_string());

        if trimmed.eq_ignore_ascii_case("next") {
            return Ok(VersionToken::Next);
        }
        if trimmed.eq_ignore_ascii_case("prev") {
            return Ok(VersionToken::Prev);
        }
        if let Some(caps) = step_pattern().captures(trimmed) {
            let steps: i64 = caps[2].parse().map_err(|_| invalid())?;
            return Ok(if &caps[1] == "-" {
                VersionToken::Step(-steps)
            } else {
                VersionToken::Step(steps)
            });
        }
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return trimmed
                .parse()
                .map(VersionToken::Absolute)
                .map_err(|_| invalid());
        }
        Err(invalid())
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionToken::Latest => write!(f, "latest"),
            VersionToken::Next => write!(f, "next"),
            VersionToken::Prev => write!(f, "prev"),
            VersionToken::Step(n) if *n >= 0 => write!(f, "+{n}"),
            VersionToken::Step(n) => write!(f, "{n}"),
            VersionToken::Absolute(v) => write!(f, "{v}"),
        }
    }
}

/// Token moving `steps` scripts forward, e.g. `+2`.
pub fn increment_token(steps: u32) -> String {
    format!("+{steps}")
}

/// Token moving `steps` scripts back, e.g. `-2`.
pub fn decrement_token(steps: u32) -> String {
    format!("-{steps}")
}

/// Calling contract for a schema migration manager.
pub trait SchemaManager {
    /// The applied schema version. Must not modify the database.
    fn current_schema_version(&mut self) -> Result<SchemaVersion>;

    /// Normalize a raw token (`None`, `next`, `prev`, `+N`, `-N`, or a
    /// number) into a concrete target version.
    fn process_version(&mut self, token: Option<&str>) -> Result<SchemaVersion>;

    /// Migrate up or down to `target`.
    fn update_to(&mut self, target: SchemaVersion) -> Result<UpdateResult>;
}
