//! Structured error types for config resolution, database access and migrations.

use std::path::PathBuf;
use thiserror::Error;

use crate::schema::SchemaVersion;

/// Errors raised while resolving configuration or running a schema command.
///
/// Every variant is caught at the command boundary and reported as text;
/// none of them escape a provider action.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The project has no registered application config file.
    #[error("A project with an application config file is required to use this provider.")]
    ConfigurationMissing,

    /// Unknown extension, unparseable content, or a non-associative document.
    #[error("Invalid configuration file provided; {reason} ({})", path.display())]
    InvalidConfigFormat { path: PathBuf, reason: String },

    /// The base config has no section for the requested environment.
    #[error("Section '{section}' cannot be found in {}", path.display())]
    SectionNotFound { section: String, path: PathBuf },

    #[error("Database was not initialized")]
    DatabaseNotInitialized,

    #[error("Unsupported database adapter '{0}'")]
    UnsupportedAdapter(String),

    #[error("Invalid version '{0}'; expected a number, next, prev, +N or -N")]
    InvalidVersion(String),

    #[error("Migrations directory not found: {}", .0.display())]
    MigrationsDirectoryMissing(PathBuf),

    #[error("Invalid migration file {}: {reason}", path.display())]
    InvalidMigration { path: PathBuf, reason: String },

    #[error("Migration {version} ({name}) failed: {source}")]
    MigrationFailed {
        version: SchemaVersion,
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

impl SchemaError {
    pub fn invalid_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidConfigFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_migration(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidMigration {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the host dispatcher before a provider action runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider '{provider}' has no action '{action}'")]
    UnknownAction { provider: String, action: String },

    #[error("Action '{action}' requires argument '{argument}'")]
    MissingArgument { action: String, argument: String },

    #[error("Action '{action}' accepts at most {max} argument(s), got {given}")]
    TooManyArguments {
        action: String,
        max: usize,
        given: usize,
    },

    #[error("Invalid value '{value}' for argument '{argument}'")]
    InvalidArgument { argument: String, value: String },
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
