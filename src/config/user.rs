//! User-level tool settings.
//!
//! The settings file lives outside any project (by default `~/.schemactl.ini`)
//! and is parsed with the same loaders as application configs. Only the
//! `schemactl` block is read:
//!
//! ```ini
//! schemactl.appConfigOverride.skipLocal = 0
//! schemactl.appConfigOverride.name = "override.ini"
//! schemactl.appConfigOverride.path.1 = "/home/me/projects/account/configs/local.ini"
//! ```

use super::format::{ConfigFormat, load_config_file};
use super::overrides::AppConfigOverride;
use crate::error::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit user settings file.
pub const USER_CONFIG_ENV: &str = "SCHEMACTL_USER_CONFIG";

/// Top-level key holding this tool's settings.
const SETTINGS_KEY: &str = "schemactl";

const OVERRIDE_KEY: &str = "appConfigOverride";

/// File stem probed in the home directory.
const USER_FILE_STEM: &str = ".schemactl";

/// Parsed user settings. Empty when no settings file exists.
#[derive(Debug, Clone, Default)]
pub struct UserSettings {
    values: Value,
    source: Option<PathBuf>,
}

impl UserSettings {
    /// Settings with nothing configured.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build settings from an already parsed document root.
    pub fn from_value(values: Value) -> Self {
        Self {
            values,
            source: None,
        }
    }

    /// Load settings from an explicit file.
    pub fn load(path: &Path) -> Result<Self> {
        let doc = load_config_file(path)?;
        Ok(Self {
            values: Value::Object(doc.values().clone()),
            source: Some(path.to_path_buf()),
        })
    }

    /// Locate and load the user settings file.
    ///
    /// Precedence: `explicit`, then `$SCHEMACTL_USER_CONFIG`, then the first
    /// `~/.schemactl.<ext>` that exists. No file means empty settings.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(USER_CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        if let Some(home) = dirs::home_dir() {
            for ext in ConfigFormat::EXTENSIONS {
                let candidate = home.join(format!("{USER_FILE_STEM}.{ext}"));
                if candidate.is_file() {
                    return Self::load(&candidate);
                }
            }
        }

        debug!("No user settings file found");
        Ok(Self::empty())
    }

    /// The file the settings came from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The tool's settings block, if present.
    pub fn tool_settings(&self) -> Option<&Value> {
        self.values.get(SETTINGS_KEY).filter(|v| v.is_object())
    }

    /// The `appConfigOverride` block, if present.
    pub fn app_config_override(&self) -> Option<AppConfigOverride> {
        self.tool_settings()
            .and_then(|settings| settings.get(OVERRIDE_KEY))
            .filter(|v| v.is_object())
            .map(AppConfigOverride::from_value)
    }
}
