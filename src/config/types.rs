//! Configuration types.
//!
//! The merged application config stays a `serde_json::Value` tree so any
//! format can feed it; the parts this tool acts on are read through typed
//! views.

use super::overrides::is_truthy;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default configuration environment.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Default directory holding migration scripts.
pub const DEFAULT_MIGRATIONS_DIR: &str = "./scripts/migrations";

/// Merged application configuration for one environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    environment: String,
    source: PathBuf,
    overrides: Vec<PathBuf>,
    values: Value,
}

impl AppConfig {
    pub fn new(
        environment: impl Into<String>,
        source: impl Into<PathBuf>,
        overrides: Vec<PathBuf>,
        values: Value,
    ) -> Self {
        Self {
            environment: environment.into(),
            source: source.into(),
            overrides,
            values,
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// The base config file.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Override files that were actually merged, in merge order.
    pub fn overrides(&self) -> &[PathBuf] {
        &self.overrides
    }

    pub fn values(&self) -> &Value {
        &self.values
    }

    /// Look up a dotted key such as `resources.db.adapter`.
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        dotted
            .split('.')
            .try_fold(&self.values, |node, key| node.get(key))
    }

    /// Look up a dotted key and render scalars as a string.
    pub fn get_str(&self, dotted: &str) -> Option<String> {
        match self.get(dotted)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Typed view of the `resources` block.
    ///
    /// `db` and `multidb` are read independently, so a malformed `db` block
    /// still leaves a usable `multidb` fallback.
    pub fn resources(&self) -> ResourcesConfig {
        let db = self
            .get("resources.db")
            .and_then(|value| match DbResource::deserialize(value) {
                Ok(db) => Some(db),
                Err(err) => {
                    warn!(error = %err, "Ignoring malformed resources.db");
                    None
                }
            });
        let multidb = self
            .get("resources.multidb")
            .and_then(Value::as_object)
            .cloned();
        ResourcesConfig { db, multidb }
    }
}

/// The `resources` block of an application config.
#[derive(Debug, Clone, Default)]
pub struct ResourcesConfig {
    pub db: Option<DbResource>,
    pub multidb: Option<Map<String, Value>>,
}

impl ResourcesConfig {
    /// First `multidb` entry flagged `default`, in document order.
    pub fn default_multidb(&self) -> Option<MultiDbEntry> {
        self.multidb
            .as_ref()?
            .iter()
            .filter_map(|(name, entry)| MultiDbEntry::from_value(name, entry))
            .find(|entry| entry.default)
    }
}

/// `resources.db`: a single database connection.
#[derive(Debug, Clone, Deserialize)]
pub struct DbResource {
    #[serde(default, deserialize_with = "deserialize_scalar_string")]
    pub adapter: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default, deserialize_with = "deserialize_scalar_string")]
    pub table_prefix: Option<String>,
}

/// One named connection under `resources.multidb`.
///
/// The whole entry doubles as the connection params.
#[derive(Debug, Clone)]
pub struct MultiDbEntry {
    pub name: String,
    pub adapter: Option<String>,
    pub default: bool,
    pub params: Map<String, Value>,
}

impl MultiDbEntry {
    fn from_value(name: &str, value: &Value) -> Option<Self> {
        let params = value.as_object()?.clone();
        Some(Self {
            name: name.to_string(),
            adapter: params.get("adapter").and_then(scalar_string),
            default: params.get("default").is_some_and(is_truthy),
            params,
        })
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accept strings and numbers; INI gives strings, YAML may give numbers.
fn deserialize_scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(scalar_string))
}
