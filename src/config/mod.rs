//! Application configuration system.
//!
//! Builds one merged config per command from:
//! 1. **Base** - the project's application config, scoped to the environment
//! 2. **Overrides** - zero or more override files, merged in priority order
//!    (`local.<ext>` by convention, plus names/paths from the user settings)
//!
//! ## Merge Strategy
//! - Sections are deep merged key-by-key; the later file wins
//! - Override files lacking the environment's section are skipped
//!
//! ## Formats
//! `ini`, `xml`, `json`, `yaml`/`yml` and `toml`, optionally with a `.dist`
//! suffix. Each supports section inheritance.
//!
//! ## Environment Variables
//! - `SCHEMACTL_USER_CONFIG` - Explicit user settings file
//! - `SCHEMACTL_LOG` - Log filter directives (see `logging`)

mod format;
mod loader;
mod merge;
mod overrides;
mod types;
mod user;

pub use format::{ConfigDocument, ConfigFormat, effective_extension, load_config_file};
pub use loader::load_app_config;
pub use merge::deep_merge;
pub use overrides::{
    AppConfigOverride, LOCAL_PRIORITY, NAME_PRIORITY, OverrideSpec, PATH_PRIORITY, is_truthy,
    resolve_override_paths,
};
pub use types::*;
pub use user::{USER_CONFIG_ENV, UserSettings};
