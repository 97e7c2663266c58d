//! Application config loading with override merging.
//!
//! Loads the project's base application config for one environment, then
//! merges each override file's matching section on top, in priority order.

use super::format::load_config_file;
use super::merge::deep_merge;
use super::overrides::resolve_override_paths;
use super::types::AppConfig;
use super::user::UserSettings;
use crate::error::{Result, SchemaError};
use crate::project::ProjectProfile;
use tracing::{debug, info};

/// Load the merged application config for `env`.
///
/// Fails with `ConfigurationMissing` when there is no project or the project
/// has no application config, and with `SectionNotFound` when the base file
/// lacks the environment. Override files without that section are skipped.
pub fn load_app_config(
    project: Option<&ProjectProfile>,
    settings: &UserSettings,
    env: &str,
) -> Result<AppConfig> {
    let app_config_path = project
        .and_then(ProjectProfile::application_config_file)
        .ok_or(SchemaError::ConfigurationMissing)?;

    // Base config, normally application.ini in the project's configs dir
    let base = load_config_file(app_config_path)?;
    let mut values = base.require_section(env)?;

    let override_settings = settings.app_config_override();
    let mut merged = Vec::new();
    for path in resolve_override_paths(app_config_path, override_settings.as_ref()) {
        let doc = load_config_file(&path)?;
        match doc.section(env)? {
            Some(section) => {
                debug!(path = %path.display(), env, "Merging override config");
                values = deep_merge(values, section);
                merged.push(path);
            }
            None => {
                debug!(path = %path.display(), env, "Override has no matching section; skipping");
            }
        }
    }

    info!(
        config = %app_config_path.display(),
        env,
        overrides = merged.len(),
        "Loaded application config"
    );

    Ok(AppConfig::new(env, app_config_path, merged, values))
}
