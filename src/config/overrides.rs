//! Override config discovery.
//!
//! Override files are merged on top of the base application config. The
//! resolver never fails: files that don't exist are left out,
//! priority keys that aren't integers are skipped, and a path whose priority
//! clashes with an earlier entry is queued at the end instead of replacing it.
//!
//! Sources, lowest default priority first:
//! 1. **Convention** - `local.<ext>` next to the base config (priority 100),
//!    disabled with `skipLocal`
//! 2. **Names** - file names looked up in the base config's directory
//!    (a single name gets priority 200)
//! 3. **Paths** - full or relative paths, used as given (a single path gets
//!    priority 300)
//!
//! Names and paths may also be mappings of `priority -> value`, e.g. in INI:
//!
//! ```ini
//! schemactl.appConfigOverride.name.60 = "dev.ini"
//! schemactl.appConfigOverride.path.1 = "./application/configs/ci.ini"
//! ```

use super::format::effective_extension;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const LOCAL_PRIORITY: i64 = 100;
pub const NAME_PRIORITY: i64 = 200;
pub const PATH_PRIORITY: i64 = 300;

/// File stem probed next to the base config.
const LOCAL_STEM: &str = "local";

/// A single value or an ordered `priority -> value` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideSpec {
    Single(String),
    Ordered(Vec<(i64, String)>),
}

impl OverrideSpec {
    /// Read an override setting from a config value. Returns `None` for shapes
    /// that carry no usable entry (null, arrays, nested maps).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(OverrideSpec::Single(s.clone())),
            Value::Number(n) => Some(OverrideSpec::Single(n.to_string())),
            Value::Object(map) => {
                let mut entries = Vec::with_capacity(map.len());
                for (key, entry) in map {
                    let Ok(priority) = key.trim().parse::<i64>() else {
                        warn!(key = %key, "Ignoring override entry with a non-numeric priority");
                        continue;
                    };
                    match entry {
                        Value::String(s) => entries.push((priority, s.clone())),
                        other => {
                            warn!(priority, value = %other, "Ignoring non-string override entry");
                        }
                    }
                }
                Some(OverrideSpec::Ordered(entries))
            }
            _ => None,
        }
    }

    fn entries(&self, default_priority: i64) -> Vec<(i64, String)> {
        match self {
            OverrideSpec::Single(value) => vec![(default_priority, value.clone())],
            OverrideSpec::Ordered(entries) => entries.clone(),
        }
    }
}

/// The `appConfigOverride` block of the user settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfigOverride {
    pub skip_local: bool,
    pub name: Option<OverrideSpec>,
    pub path: Option<OverrideSpec>,
}

impl AppConfigOverride {
    pub fn from_value(value: &Value) -> Self {
        Self {
            skip_local: value.get("skipLocal").map(is_truthy).unwrap_or(false),
            name: value.get("name").and_then(OverrideSpec::from_value),
            path: value.get("path").and_then(OverrideSpec::from_value),
        }
    }
}

/// Interpret a loosely typed config flag (`true`, `1`, `"yes"`, `"on"`...).
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        _ => false,
    }
}

/// Ordered override list under construction.
#[derive(Debug, Default)]
struct PathList {
    ranked: Vec<(i64, PathBuf)>,
    collided: Vec<PathBuf>,
}

impl PathList {
    fn position(&self, priority: i64) -> Option<usize> {
        self.ranked.iter().position(|(p, _)| *p == priority)
    }

    fn insert_or_replace(&mut self, priority: i64, path: PathBuf) {
        match self.position(priority) {
            Some(index) => self.ranked[index].1 = path,
            None => self.ranked.push((priority, path)),
        }
    }

    fn insert_or_queue(&mut self, priority: i64, path: PathBuf) {
        if self.position(priority).is_some() {
            debug!(
                priority,
                path = %path.display(),
                "Override priority taken; queueing at the end"
            );
            self.collided.push(path);
        } else {
            self.ranked.push((priority, path));
        }
    }

    fn into_sorted(mut self) -> Vec<PathBuf> {
        self.ranked.sort_by_key(|(priority, _)| *priority);
        self.ranked
            .into_iter()
            .map(|(_, path)| path)
            .chain(self.collided)
            .collect()
    }
}

/// Resolve the ordered list of override files for `app_config_path`.
///
/// The result is in merge order: the last file wins.
pub fn resolve_override_paths(
    app_config_path: &Path,
    settings: Option<&AppConfigOverride>,
) -> Vec<PathBuf> {
    let config_dir = app_config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut list = PathList::default();

    let skip_local = settings.is_some_and(|s| s.skip_local);
    if !skip_local {
        if let Some(ext) = effective_extension(app_config_path) {
            let local = config_dir.join(format!("{LOCAL_STEM}.{ext}"));
            if local.is_file() {
                list.insert_or_replace(LOCAL_PRIORITY, local);
            }
        }
    }

    let Some(settings) = settings else {
        return list.into_sorted();
    };

    if let Some(ref names) = settings.name {
        for (priority, name) in names.entries(NAME_PRIORITY) {
            let candidate = config_dir.join(&name);
            if candidate.is_file() {
                list.insert_or_replace(priority, candidate);
            } else {
                debug!(path = %candidate.display(), "Override file not found; skipping");
            }
        }
    }

    if let Some(ref paths) = settings.path {
        for (priority, path) in paths.entries(PATH_PRIORITY) {
            let candidate = PathBuf::from(&path);
            if !candidate.exists() {
                debug!(path = %candidate.display(), "Override path not found; skipping");
                continue;
            }
            list.insert_or_queue(priority, candidate);
        }
    }

    list.into_sorted()
}
