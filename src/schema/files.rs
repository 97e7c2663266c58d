//! Migration script discovery and parsing.
//!
//! Scripts are named `<version>-<Name>.sql`, e.g. `003-AddOrdersTable.sql`.
//! A script holds both directions, separated by marker lines:
//!
//! ```sql
//! -- migrate:up
//! CREATE TABLE {prefix}orders (id INTEGER PRIMARY KEY);
//!
//! -- migrate:down
//! DROP TABLE {prefix}orders;
//! ```
//!
//! A script without markers is up-only. `{prefix}` is replaced by the table
//! prefix before execution.

use super::SchemaVersion;
use crate::error::{Result, SchemaError};
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Placeholder replaced by the table prefix.
pub const PREFIX_PLACEHOLDER: &str = "{prefix}";

fn file_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)-(.+)\.sql$").expect("valid file name pattern"))
}

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^--\s*migrate:(up|down)\s*$").expect("valid marker pattern")
    })
}

/// A migration script on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub version: SchemaVersion,
    pub name: String,
    pub path: PathBuf,
}

impl MigrationFile {
    /// Parse a script file name. Returns `None` for names that don't match.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let caps = file_name_pattern().captures(file_name)?;
        Some(Self {
            version: caps[1].parse().ok()?,
            name: caps[2].to_string(),
            path: path.to_path_buf(),
        })
    }

    /// Read the script and substitute the table prefix.
    pub fn load_script(&self, table_prefix: &str) -> Result<MigrationScript> {
        let content = std::fs::read_to_string(&self.path)?;
        let content = content.replace(PREFIX_PLACEHOLDER, table_prefix);
        MigrationScript::parse(&content)
            .map_err(|reason| SchemaError::invalid_migration(&self.path, reason))
    }
}

/// The two directions of a migration script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationScript {
    pub up: String,
    pub down: Option<String>,
}

impl MigrationScript {
    /// Split script text on `-- migrate:up` / `-- migrate:down` markers.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        #[derive(PartialEq)]
        enum Part {
            Preamble,
            Up,
            Down,
        }

        let has_markers = content
            .lines()
            .any(|line| marker_pattern().is_match(line.trim()));
        if !has_markers {
            return Ok(Self {
                up: content.trim().to_string(),
                down: None,
            });
        }

        let mut part = Part::Preamble;
        let mut up: Option<String> = None;
        let mut down: Option<String> = None;

        for line in content.lines() {
            if let Some(caps) = marker_pattern().captures(line.trim()) {
                let (next, slot) = if caps[1].eq_ignore_ascii_case("up") {
                    (Part::Up, &mut up)
                } else {
                    (Part::Down, &mut down)
                };
                if slot.is_some() {
                    return Err(format!("duplicate '{}' marker", line.trim()));
                }
                *slot = Some(String::new());
                part = next;
                continue;
            }

            let target = match part {
                Part::Preamble => continue,
                Part::Up => up.as_mut(),
                Part::Down => down.as_mut(),
            };
            if let Some(buf) = target {
                buf.push_str(line);
                buf.push('\n');
            }
        }

        let up = up.ok_or_else(|| "missing '-- migrate:up' section".to_string())?;
        Ok(Self {
            up: up.trim().to_string(),
            down: down
                .map(|sql| sql.trim().to_string())
                .filter(|sql| !sql.is_empty()),
        })
    }
}

/// List migration scripts in `dir`, sorted by version.
///
/// Files that don't follow the naming scheme are ignored. Two scripts with
/// the same version are an error.
pub fn discover_migrations(dir: &Path) -> Result<Vec<MigrationFile>> {
    if !dir.is_dir() {
        return Err(SchemaError::MigrationsDirectoryMissing(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match MigrationFile::from_path(&path) {
            Some(file) => files.push(file),
            None => debug!(path = %path.display(), "Ignoring non-migration file"),
        }
    }

    files.sort_by_key(|file| file.version);
    if let Some(pair) = files.windows(2).find(|pair| pair[0].version == pair[1].version) {
        return Err(SchemaError::invalid_migration(
            &pair[1].path,
            format!(
                "version {} is also used by {}",
                pair[1].version,
                pair[0].path.display()
            ),
        ));
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_name_parsing() {
        let file = MigrationFile::from_path(Path::new("/m/003-AddOrders.sql")).unwrap();
        assert_eq!(file.version, 3);
        assert_eq!(file.name, "AddOrders");

        assert!(MigrationFile::from_path(Path::new("/m/README.md")).is_none());
        assert!(MigrationFile::from_path(Path::new("/m/AddOrders.sql")).is_none());
        assert!(MigrationFile::from_path(Path::new("/m/003_AddOrders.sql")).is_none());
    }

    #[test]
    fn test_script_with_both_directions() {
        let script = MigrationScript::parse(
            "-- leading comment\n-- migrate:up\nCREATE TABLE a (id INTEGER);\n\n-- Migrate:Down\nDROP TABLE a;\n",
        )
        .unwrap();
        assert_eq!(script.up, "CREATE TABLE a (id INTEGER);");
        assert_eq!(script.down.as_deref(), Some("DROP TABLE a;"));
    }

    #[test]
    fn test_script_without_markers_is_up_only() {
        let script = MigrationScript::parse("CREATE TABLE a (id INTEGER);\n").unwrap();
        assert_eq!(script.up, "CREATE TABLE a (id INTEGER);");
        assert!(script.down.is_none());
    }

    #[test]
    fn test_script_with_only_down_is_rejected() {
        let err = MigrationScript::parse("-- migrate:down\nDROP TABLE a;\n").unwrap_err();
        assert!(err.contains("migrate:up"));
    }

    #[test]
    fn test_duplicate_marker_is_rejected() {
        let err = MigrationScript::parse("-- migrate:up\nA;\n-- migrate:up\nB;\n").unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn test_prefix_substitution() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("001-Users.sql");
        std::fs::write(
            &path,
            "-- migrate:up\nCREATE TABLE {prefix}users (id INTEGER);\n-- migrate:down\nDROP TABLE {prefix}users;\n",
        )
        .unwrap();

        let file = MigrationFile::from_path(&path).unwrap();
        let script = file.load_script("shop_").unwrap();
        assert_eq!(script.up, "CREATE TABLE shop_users (id INTEGER);");
        assert_eq!(script.down.as_deref(), Some("DROP TABLE shop_users;"));
    }

    #[test]
    fn test_discover_sorts_and_filters() {
        let temp = TempDir::new().unwrap();
        for name in ["010-Ten.sql", "002-Two.sql", "notes.txt", "001-One.sql"] {
            std::fs::write(temp.path().join(name), "SELECT 1;").unwrap();
        }
        std::fs::create_dir(temp.path().join("005-Dir.sql")).unwrap();

        let versions: Vec<_> = discover_migrations(temp.path())
            .unwrap()
            .into_iter()
            .map(|f| f.version)
            .collect();
        assert_eq!(versions, vec![1, 2, 10]);
    }

    #[test]
    fn test_discover_rejects_duplicate_versions() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("001-One.sql"), "SELECT 1;").unwrap();
        std::fs::write(temp.path().join("01-Again.sql"), "SELECT 1;").unwrap();

        let err = discover_migrations(temp.path()).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidMigration { .. }));
    }

    #[test]
    fn test_discover_missing_dir() {
        let temp = TempDir::new().unwrap();
        let err = discover_migrations(&temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, SchemaError::MigrationsDirectoryMissing(_)));
    }
}
