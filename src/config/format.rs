//! Config file parsing for every supported format.
//!
//! Each parser produces the same intermediate representation: a map of
//! top-level sections (`serde_json::Value`) plus the section inheritance
//! declared by the file. Inheritance is written per format:
//!
//! | format        | syntax                                   |
//! |---------------|------------------------------------------|
//! | `ini`         | `[development : production]`             |
//! | `xml`         | `<development extends="production">`     |
//! | `json`        | `"development": {"_extends": "production"}` |
//! | `yaml`/`yml`  | `development: { _extends: production }`  |
//! | `toml`        | `[development]` with `_extends = "production"` |
//!
//! A trailing `.dist` suffix is ignored when detecting the format, so
//! `application.ini.dist` is read as INI.

use super::merge::deep_merge;
use crate::error::{Result, SchemaError};
use ini::{Ini, ParseOption};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key used by the JSON, YAML and TOML formats to declare a parent section.
const EXTENDS_KEY: &str = "_extends";

/// Attribute used by the XML format to declare a parent section.
const XML_EXTENDS_ATTR: &str = "extends";

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Ini,
    Xml,
    Json,
    Yaml,
    Toml,
    /// Recognized but never loadable: a PHP array cannot be evaluated here.
    Php,
}

impl ConfigFormat {
    /// All extensions a config file may carry, in probing order.
    pub const EXTENSIONS: &'static [&'static str] =
        &["ini", "xml", "json", "yaml", "yml", "toml"];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ini" => Some(ConfigFormat::Ini),
            "xml" => Some(ConfigFormat::Xml),
            "json" => Some(ConfigFormat::Json),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "toml" => Some(ConfigFormat::Toml),
            "php" | "inc" => Some(ConfigFormat::Php),
            _ => None,
        }
    }

    /// Detect the format of `path`, stripping a `.dist` suffix first.
    pub fn detect(path: &Path) -> Result<Self> {
        effective_extension(path)
            .as_deref()
            .and_then(Self::from_extension)
            .ok_or_else(|| SchemaError::invalid_format(path, "unknown config type"))
    }
}

/// The extension that decides the format, with `.dist` stripped.
///
/// Returns the extension as written (case preserved), or `None` when the file
/// has no usable extension.
pub fn effective_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("dist") {
        let stem = Path::new(path.file_stem()?);
        return stem.extension()?.to_str().map(str::to_string);
    }
    Some(ext.to_string())
}

/// A parsed config file: top-level sections plus their inheritance.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    path: PathBuf,
    sections: Map<String, Value>,
    extends: HashMap<String, String>,
}

impl ConfigDocument {
    /// Parse `content` as `format`. `path` is only used for error messages.
    pub fn parse(path: &Path, format: ConfigFormat, content: &str) -> Result<Self> {
        let (sections, extends) = match format {
            ConfigFormat::Ini => parse_ini(path, content)?,
            ConfigFormat::Xml => parse_xml(path, content)?,
            ConfigFormat::Json => {
                let value = serde_json::from_str::<Value>(content).map_err(|e| {
                    SchemaError::invalid_format(path, format!("JSON parse error: {e}"))
                })?;
                split_extends(path, value)?
            }
            ConfigFormat::Yaml => {
                let value = serde_yaml::from_str::<Value>(content).map_err(|e| {
                    SchemaError::invalid_format(path, format!("YAML parse error: {e}"))
                })?;
                split_extends(path, value)?
            }
            ConfigFormat::Toml => {
                let value = toml::from_str::<Value>(content).map_err(|e| {
                    SchemaError::invalid_format(path, format!("TOML parse error: {e}"))
                })?;
                split_extends(path, value)?
            }
            ConfigFormat::Php => {
                return Err(SchemaError::invalid_format(
                    path,
                    "PHP config files cannot be evaluated; use ini, xml, json, yaml or toml",
                ));
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            sections,
            extends,
        })
    }

    /// The whole document, without inheritance markers.
    pub fn values(&self) -> &Map<String, Value> {
        &self.sections
    }

    /// Resolve a section and everything it extends.
    ///
    /// Returns `Ok(None)` when the section does not exist.
    pub fn section(&self, name: &str) -> Result<Option<Value>> {
        self.resolve_section(name, &mut Vec::new())
    }

    /// Like [`ConfigDocument::section`] but a missing section is an error.
    pub fn require_section(&self, name: &str) -> Result<Value> {
        self.section(name)?.ok_or_else(|| SchemaError::SectionNotFound {
            section: name.to_string(),
            path: self.path.clone(),
        })
    }

    fn resolve_section(&self, name: &str, chain: &mut Vec<String>) -> Result<Option<Value>> {
        let Some(data) = self.sections.get(name) else {
            return Ok(None);
        };

        if chain.iter().any(|seen| seen == name) {
            return Err(SchemaError::invalid_format(
                &self.path,
                format!(
                    "circular section inheritance: {} -> {}",
                    chain.join(" -> "),
                    name
                ),
            ));
        }

        chain.push(name.to_string());
        let resolved = match self.extends.get(name) {
            Some(parent) => match self.resolve_section(parent, chain)? {
                Some(parent_value) => deep_merge(parent_value, data.clone()),
                None => {
                    return Err(SchemaError::invalid_format(
                        &self.path,
                        format!("section '{name}' extends unknown section '{parent}'"),
                    ));
                }
            },
            None => data.clone(),
        };
        chain.pop();

        Ok(Some(resolved))
    }
}

/// Read and parse a config file, choosing the parser from its extension.
///
/// The extension is checked before the file is opened, so an unsupported
/// type fails without touching the filesystem.
pub fn load_config_file(path: &Path) -> Result<ConfigDocument> {
    let format = ConfigFormat::detect(path)?;
    debug!(path = %path.display(), format = ?format, "Loading config file");
    let content = std::fs::read_to_string(path)?;
    ConfigDocument::parse(path, format, &content)
}

type Parsed = (Map<String, Value>, HashMap<String, String>);

/// Pull `_extends` markers out of each top-level section.
fn split_extends(path: &Path, value: Value) -> Result<Parsed> {
    let Value::Object(mut sections) = value else {
        return Err(SchemaError::invalid_format(
            path,
            "document does not contain an associative structure",
        ));
    };

    let mut extends = HashMap::new();
    for (name, section) in sections.iter_mut() {
        let Value::Object(section_map) = section else {
            continue;
        };
        match section_map.shift_remove(EXTENDS_KEY) {
            Some(Value::String(parent)) => {
                extends.insert(name.clone(), parent);
            }
            Some(other) => {
                return Err(SchemaError::invalid_format(
                    path,
                    format!("section '{name}' has a non-string {EXTENDS_KEY}: {other}"),
                ));
            }
            None => {}
        }
    }

    Ok((sections, extends))
}

fn parse_ini(path: &Path, content: &str) -> Result<Parsed> {
    let options = ParseOption {
        enabled_escape: false,
        ..ParseOption::default()
    };
    let ini = Ini::load_from_str_opt(content, options)
        .map_err(|e| SchemaError::invalid_format(path, format!("INI parse error: {e}")))?;

    let mut root = Map::new();
    let mut extends = HashMap::new();

    for (header, props) in ini.iter() {
        match header {
            None => {
                for (key, value) in props.iter() {
                    insert_dotted(&mut root, key, Value::String(value.to_string()));
                }
            }
            Some(header) => {
                let (name, parent) = split_section_header(path, header)?;
                if let Some(parent) = parent {
                    extends.insert(name.clone(), parent);
                }
                let section = root
                    .entry(name)
                    .or_insert_with(|| Value::Object(Map::new()));
                if !section.is_object() {
                    *section = Value::Object(Map::new());
                }
                if let Value::Object(section_map) = section {
                    for (key, value) in props.iter() {
                        insert_dotted(section_map, key, Value::String(value.to_string()));
                    }
                }
            }
        }
    }

    Ok((root, extends))
}

/// Split `child : parent` into its parts. Only one parent is allowed.
fn split_section_header(path: &Path, header: &str) -> Result<(String, Option<String>)> {
    match header.split_once(':') {
        None => Ok((header.trim().to_string(), None)),
        Some((name, parent)) => {
            if parent.contains(':') {
                return Err(SchemaError::invalid_format(
                    path,
                    format!("section '{}' may only extend one parent", name.trim()),
                ));
            }
            Ok((name.trim().to_string(), Some(parent.trim().to_string())))
        }
    }
}

/// Insert `a.b.c = value` as nested maps. A `key[]` leaf appends to an array.
fn insert_dotted(map: &mut Map<String, Value>, key: &str, value: Value) {
    match key.split_once('.') {
        Some((head, rest)) => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child_map) = child {
                insert_dotted(child_map, rest, value);
            }
        }
        None => match key.strip_suffix("[]") {
            Some(list_key) => {
                let entry = map
                    .entry(list_key.to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                match entry {
                    Value::Array(items) => items.push(value),
                    other => *other = Value::Array(vec![value]),
                }
            }
            None => {
                map.insert(key.to_string(), value);
            }
        },
    }
}

fn parse_xml(path: &Path, content: &str) -> Result<Parsed> {
    let doc = roxmltree::Document::parse(content)
        .map_err(|e| SchemaError::invalid_format(path, format!("XML parse error: {e}")))?;

    let mut root = Map::new();
    let mut extends = HashMap::new();

    for section in doc.root_element().children().filter(|n| n.is_element()) {
        let name = section.tag_name().name().to_string();
        if let Some(parent) = section
            .attributes()
            .find(|attr| attr.name() == XML_EXTENDS_ATTR)
        {
            extends.insert(name.clone(), parent.value().to_string());
        }
        insert_repeated(&mut root, name, xml_node_value(section, true));
    }

    Ok((root, extends))
}

/// Convert an element to a value. Leaves become strings; attributes and
/// child elements become keys. Repeated child elements become arrays.
fn xml_node_value(node: roxmltree::Node<'_, '_>, is_section: bool) -> Value {
    let children: Vec<_> = node.children().filter(|n| n.is_element()).collect();
    let attributes: Vec<_> = node
        .attributes()
        .filter(|attr| !(is_section && attr.name() == XML_EXTENDS_ATTR))
        .collect();

    // Sections are always maps, even when empty.
    if children.is_empty() && attributes.is_empty() && !is_section {
        let text = node.text().map(str::trim).unwrap_or_default();
        return Value::String(text.to_string());
    }

    let mut map = Map::new();
    for attr in attributes {
        map.insert(attr.name().to_string(), Value::String(attr.value().to_string()));
    }
    for child in children {
        insert_repeated(
            &mut map,
            child.tag_name().name().to_string(),
            xml_node_value(child, false),
        );
    }
    Value::Object(map)
}

fn insert_repeated(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn parse(name: &str, content: &str) -> ConfigDocument {
        let path = PathBuf::from(name);
        let format = ConfigFormat::detect(&path).unwrap();
        ConfigDocument::parse(&path, format, content).unwrap()
    }

    #[test]
    fn test_detect_strips_dist_suffix() {
        assert_eq!(
            ConfigFormat::detect(Path::new("configs/application.ini.dist")).unwrap(),
            ConfigFormat::Ini
        );
        assert_eq!(
            ConfigFormat::detect(Path::new("local.YML.dist")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::detect(Path::new("app.inc")).unwrap(),
            ConfigFormat::Php
        );
    }

    #[test]
    fn test_detect_rejects_unknown_types() {
        for name in ["notes.txt", "application", "application.dist"] {
            let err = ConfigFormat::detect(Path::new(name)).unwrap_err();
            assert!(
                matches!(err, SchemaError::InvalidConfigFormat { .. }),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_type_fails_before_reading() {
        let err = load_config_file(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidConfigFormat { .. }));
    }

    #[test]
    fn test_php_is_recognized_but_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("application.php");
        std::fs::write(&path, "<?php return array();").unwrap();
        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidConfigFormat { .. }));
    }

    #[test]
    fn test_ini_nests_dotted_keys_and_resolves_inheritance() {
        let doc = parse(
            "application.ini",
            r#"
[production]
resources.db.adapter = pdo_sqlite
resources.db.params.dbname = "/var/db/prod.db"
phpSettings.display_errors = 0

[development : production]
resources.db.params.dbname = "/tmp/dev.db"
phpSettings.display_errors = 1
"#,
        );

        let dev = doc.require_section("development").unwrap();
        assert_eq!(dev["resources"]["db"]["adapter"], "pdo_sqlite");
        assert_eq!(dev["resources"]["db"]["params"]["dbname"], "/tmp/dev.db");
        assert_eq!(dev["phpSettings"]["display_errors"], "1");

        let prod = doc.require_section("production").unwrap();
        assert_eq!(prod["resources"]["db"]["params"]["dbname"], "/var/db/prod.db");
    }

    #[test]
    fn test_ini_inline_comments_are_stripped() {
        let doc = parse(
            "application.ini",
            "[production] ; base\n\
             resources.db.adapter = pdo_sqlite\n\
             \n\
             [development : production]\n\
             resources.db.params.dbname = dev.db ; local copy\n\
             resources.db.table_prefix = app\t# shared\n",
        );
        let dev = doc.require_section("development").unwrap();
        assert_eq!(dev["resources"]["db"]["adapter"], "pdo_sqlite");
        assert_eq!(dev["resources"]["db"]["params"]["dbname"], "dev.db");
        assert_eq!(dev["resources"]["db"]["table_prefix"], "app");
    }

    #[test]
    fn test_ini_array_keys_append() {
        let doc = parse(
            "application.ini",
            "[production]\nplugins[] = a\nplugins[] = b\n",
        );
        let prod = doc.require_section("production").unwrap();
        assert_eq!(prod["plugins"], json!(["a", "b"]));
    }

    #[test]
    fn test_ini_global_keys_stay_at_root() {
        let doc = parse(
            "user.ini",
            "schemactl.appConfigOverride.skipLocal = 1\n",
        );
        assert_eq!(
            doc.values()["schemactl"]["appConfigOverride"]["skipLocal"],
            "1"
        );
    }

    #[test]
    fn test_missing_section_is_none_or_error() {
        let doc = parse("application.ini", "[production]\na = 1\n");
        assert!(doc.section("testing").unwrap().is_none());
        let err = doc.require_section("testing").unwrap_err();
        assert!(matches!(err, SchemaError::SectionNotFound { .. }));
    }

    #[test]
    fn test_unknown_parent_is_an_error() {
        let doc = parse("application.ini", "[staging : production]\na = 1\n");
        let err = doc.section("staging").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidConfigFormat { .. }));
    }

    #[test]
    fn test_circular_inheritance_is_an_error() {
        let doc = parse(
            "application.yaml",
            "a:\n  _extends: b\n  x: 1\nb:\n  _extends: a\n  y: 2\n",
        );
        let err = doc.section("a").unwrap_err();
        assert!(err.to_string().contains("circular"));
    }

    #[test]
    fn test_yaml_extends() {
        let doc = parse(
            "application.yml",
            r#"
production:
  resources:
    db:
      adapter: pdo_sqlite
      params:
        dbname: prod.db
development:
  _extends: production
  resources:
    db:
      params:
        dbname: dev.db
"#,
        );
        let dev = doc.require_section("development").unwrap();
        assert_eq!(dev["resources"]["db"]["adapter"], "pdo_sqlite");
        assert_eq!(dev["resources"]["db"]["params"]["dbname"], "dev.db");
        assert!(dev.get(EXTENDS_KEY).is_none());
    }

    #[test]
    fn test_json_extends() {
        let doc = parse(
            "application.json",
            r#"{
                "production": {"resources": {"db": {"adapter": "pdo_sqlite", "table_prefix": "app"}}},
                "testing": {"_extends": "production", "resources": {"db": {"table_prefix": "test"}}}
            }"#,
        );
        let testing = doc.require_section("testing").unwrap();
        assert_eq!(testing["resources"]["db"]["adapter"], "pdo_sqlite");
        assert_eq!(testing["resources"]["db"]["table_prefix"], "test");
    }

    #[test]
    fn test_toml_extends() {
        let doc = parse(
            "application.toml",
            r#"
[production.resources.db]
adapter = "pdo_sqlite"

[development]
_extends = "production"

[development.resources.db.params]
dbname = "dev.db"
"#,
        );
        let dev = doc.require_section("development").unwrap();
        assert_eq!(dev["resources"]["db"]["adapter"], "pdo_sqlite");
        assert_eq!(dev["resources"]["db"]["params"]["dbname"], "dev.db");
    }

    #[test]
    fn test_xml_sections_attributes_and_repeats() {
        let doc = parse(
            "application.xml",
            r#"<?xml version="1.0"?>
<configdata>
  <production>
    <resources>
      <db adapter="pdo_sqlite">
        <params><dbname>prod.db</dbname></params>
      </db>
    </resources>
    <plugin>a</plugin>
    <plugin>b</plugin>
  </production>
  <development extends="production">
    <resources><db><params><dbname>dev.db</dbname></params></db></resources>
  </development>
</configdata>"#,
        );
        let dev = doc.require_section("development").unwrap();
        assert_eq!(dev["resources"]["db"]["adapter"], "pdo_sqlite");
        assert_eq!(dev["resources"]["db"]["params"]["dbname"], "dev.db");
        assert_eq!(dev["plugin"], json!(["a", "b"]));
    }

    #[test]
    fn test_non_associative_document_is_rejected() {
        let path = PathBuf::from("list.json");
        let err = ConfigDocument::parse(&path, ConfigFormat::Json, "[1, 2, 3]").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidConfigFormat { .. }));
    }

    #[test]
    fn test_malformed_content_is_invalid_format() {
        let path = PathBuf::from("broken.json");
        let err = ConfigDocument::parse(&path, ConfigFormat::Json, "{ not json").unwrap_err();
        assert!(err.to_string().contains("JSON parse error"));
    }
}
