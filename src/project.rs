//! Project profile: where a project keeps its application config.

use crate::config::ConfigFormat;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Conventional application config locations, relative to the project root
/// and without extension.
pub const APP_CONFIG_CANDIDATES: &[&str] =
    &["application/configs/application", "config/application"];

/// A host project and its registered application config file.
#[derive(Debug, Clone)]
pub struct ProjectProfile {
    root: PathBuf,
    app_config: Option<PathBuf>,
}

impl ProjectProfile {
    /// Search `root` for an application config in the conventional places.
    ///
    /// Each candidate is probed with every supported extension, then with
    /// the `.dist` variant of that extension.
    pub fn discover(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let app_config = find_app_config(&root);
        match app_config {
            Some(ref path) => debug!(path = %path.display(), "Found application config"),
            None => debug!(root = %root.display(), "No application config in project"),
        }
        Self { root, app_config }
    }

    /// Use an explicit application config. Relative paths resolve against
    /// `root`.
    pub fn with_app_config(root: impl Into<PathBuf>, app_config: impl AsRef<Path>) -> Self {
        let root = root.into();
        let app_config = root.join(app_config.as_ref());
        Self {
            root,
            app_config: Some(app_config),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The registered application config file, if the project has one.
    pub fn application_config_file(&self) -> Option<&Path> {
        self.app_config.as_deref()
    }
}

fn find_app_config(root: &Path) -> Option<PathBuf> {
    for candidate in APP_CONFIG_CANDIDATES {
        for ext in ConfigFormat::EXTENSIONS {
            let path = root.join(format!("{candidate}.{ext}"));
            if path.is_file() {
                return Some(path);
            }
            let dist = root.join(format!("{candidate}.{ext}.dist"));
            if dist.is_file() {
                return Some(dist);
            }
        }
    }
    None
}
