//! Database schema provider: migration commands over the project's config.
//!
//! Every action resolves the merged application config for the requested
//! environment, opens the configured database, and hands both to a
//! [`SqlSchemaManager`]. Failures at any step are written to the response as
//! two lines and the action reports `false`.

use super::{ActionSpec, Provider, Registry, Response};
use crate::config::{DEFAULT_ENVIRONMENT, DEFAULT_MIGRATIONS_DIR, load_app_config};
use crate::db::{resolve_database, table_prefix};
use crate::error::{DispatchError, Result, SchemaError};
use crate::schema::{
    SchemaManager, SchemaVersion, SqlSchemaManager, UpdateResult, decrement_token,
    increment_token,
};
use std::path::Path;
use tracing::{debug, error};

/// First line of every error report.
pub const ERROR_HEADER: &str = "AN ERROR HAS OCCURED:";

const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "update",
        params: &["env", "dir"],
        required: 0,
    },
    ActionSpec {
        name: "updateTo",
        params: &["version", "env", "dir"],
        required: 1,
    },
    ActionSpec {
        name: "next",
        params: &["env", "dir"],
        required: 0,
    },
    ActionSpec {
        name: "prev",
        params: &["env", "dir"],
        required: 0,
    },
    ActionSpec {
        name: "inc",
        params: &["steps", "env", "dir"],
        required: 1,
    },
    ActionSpec {
        name: "dec",
        params: &["steps", "env", "dir"],
        required: 1,
    },
    ActionSpec {
        name: "current",
        params: &["env", "dir"],
        required: 0,
    },
];

/// Migration commands for the project's database.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabaseSchemaProvider;

impl DatabaseSchemaProvider {
    pub const NAME: &'static str = "database-schema";

    pub fn new() -> Self {
        Self
    }

    /// Migrate to the newest available version.
    pub fn update(&self, registry: &mut Registry, env: &str, dir: &Path) -> bool {
        self.update_to(registry, None, env, dir)
    }

    /// Migrate to `version`: `None` (latest), `next`, `prev`, `+N`, `-N`,
    /// or an exact version number.
    pub fn update_to(
        &self,
        registry: &mut Registry,
        version: Option<&str>,
        env: &str,
        dir: &Path,
    ) -> bool {
        match run_update(registry, version, env, dir) {
            Ok(lines) => {
                let response = registry.response_mut();
                for line in lines {
                    response.append_content(line);
                }
                true
            }
            Err(err) => {
                report_error(registry.response_mut(), &err);
                false
            }
        }
    }

    /// Run the next migration script.
    pub fn next(&self, registry: &mut Registry, env: &str, dir: &Path) -> bool {
        self.update_to(registry, Some("next"), env, dir)
    }

    /// Roll back the most recent migration script.
    pub fn prev(&self, registry: &mut Registry, env: &str, dir: &Path) -> bool {
        self.update_to(registry, Some("prev"), env, dir)
    }

    /// Move forward by `steps` scripts.
    pub fn inc(&self, registry: &mut Registry, steps: u32, env: &str, dir: &Path) -> bool {
        self.update_to(registry, Some(increment_token(steps).as_str()), env, dir)
    }

    /// Move back by `steps` scripts.
    pub fn dec(&self, registry: &mut Registry, steps: u32, env: &str, dir: &Path) -> bool {
        self.update_to(registry, Some(decrement_token(steps).as_str()), env, dir)
    }

    /// Report the current schema version without changing anything.
    pub fn current(&self, registry: &mut Registry, env: &str, dir: &Path) -> bool {
        match run_current(registry, env, dir) {
            Ok(version) => {
                registry
                    .response_mut()
                    .append_content(format!("Current schema version is {version}"));
                true
            }
            Err(err) => {
                report_error(registry.response_mut(), &err);
                false
            }
        }
    }
}

impl Provider for DatabaseSchemaProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn actions(&self) -> &'static [ActionSpec] {
        ACTIONS
    }

    fn invoke(
        &self,
        action: &str,
        args: &[String],
        registry: &mut Registry,
    ) -> std::result::Result<bool, DispatchError> {
        let spec = self
            .action(action)
            .ok_or_else(|| DispatchError::UnknownAction {
                provider: Self::NAME.to_string(),
                action: action.to_string(),
            })?;
        spec.check_args(args)?;

        // Actions with a leading value take env/dir one position later.
        let offset = spec.required;
        let env = args
            .get(offset)
            .map(String::as_str)
            .unwrap_or(DEFAULT_ENVIRONMENT);
        let dir = Path::new(
            args.get(offset + 1)
                .map(String::as_str)
                .unwrap_or(DEFAULT_MIGRATIONS_DIR),
        );

        let ok = match action {
            "update" => self.update(registry, env, dir),
            "updateTo" => self.update_to(registry, Some(args[0].as_str()), env, dir),
            "next" => self.next(registry, env, dir),
            "prev" => self.prev(registry, env, dir),
            "inc" => self.inc(registry, parse_steps(&args[0])?, env, dir),
            "dec" => self.dec(registry, parse_steps(&args[0])?, env, dir),
            "current" => self.current(registry, env, dir),
            _ => {
                return Err(DispatchError::UnknownAction {
                    provider: Self::NAME.to_string(),
                    action: action.to_string(),
                });
            }
        };
        Ok(ok)
    }
}

fn parse_steps(raw: &str) -> std::result::Result<u32, DispatchError> {
    raw.trim()
        .parse()
        .map_err(|_| DispatchError::InvalidArgument {
            argument: "steps".to_string(),
            value: raw.to_string(),
        })
}

fn run_update(
    registry: &Registry,
    version: Option<&str>,
    env: &str,
    dir: &Path,
) -> Result<Vec<String>> {
    let config = load_app_config(registry.project(), registry.user_settings(), env)?;
    let mut db = resolve_database(&config)?;
    let mut manager = SqlSchemaManager::new(dir, &mut db, table_prefix(&config));

    let start = manager.current_schema_version()?;
    let requested = manager.process_version(version)?;
    debug!(start, requested, dir = %dir.display(), "Updating schema");
    let result = manager.update_to(requested)?;
    let finish = manager.current_schema_version()?;

    Ok(describe_update(version, start, requested, result, finish))
}

fn run_current(registry: &Registry, env: &str, dir: &Path) -> Result<SchemaVersion> {
    let config = load_app_config(registry.project(), registry.user_settings(), env)?;
    let mut db = resolve_database(&config)?;
    let mut manager = SqlSchemaManager::new(dir, &mut db, table_prefix(&config));
    manager.current_schema_version()
}

/// Turn a manager outcome into status lines.
///
/// `finish` is the version after the run. On success two soft mismatches
/// are reported: moving down and stopping above the request (a script was
/// missing, so the next lowest one ran), and any other miss of the target.
pub fn describe_update(
    version: Option<&str>,
    start: SchemaVersion,
    requested: SchemaVersion,
    result: UpdateResult,
    finish: SchemaVersion,
) -> Vec<String> {
    match result {
        UpdateResult::AtCurrentVersion => vec![format!("Already at version {requested}")],
        UpdateResult::NoMigrationsFound => {
            let display = version
                .map(str::to_string)
                .unwrap_or_else(|| requested.to_string());
            vec![format!(
                "No migration files found to migrate from {finish} to {display}"
            )]
        }
        UpdateResult::Success => {
            let mut lines = vec![format!("Schema updated to version {finish}")];
            if start > requested && finish > requested {
                lines.push(format!(
                    "No migration file was found to migrate from {start} to {requested} so next lowest was run"
                ));
            } else if finish != requested {
                lines.push(format!(
                    "No migration files found to migrate from {finish} to {requested}"
                ));
            }
            lines
        }
    }
}

fn report_error(response: &mut Response, err: &SchemaError) {
    error!(error = %err, "Schema command failed");
    response.append_error(err);
}
