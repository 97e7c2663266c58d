//! SQL-script schema manager backed by a version table.

use super::files::{MigrationFile, discover_migrations};
use super::{SchemaManager, SchemaVersion, UpdateResult, VersionToken};
use crate::db::Database;
use crate::error::{Result, SchemaError};
use rusqlite::params;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Name of the version bookkeeping table, before the prefix is applied.
pub const SCHEMA_VERSION_TABLE: &str = "schema_version";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// Applies and rolls back SQL migration scripts from one directory.
///
/// Each script runs in its own transaction together with the version update,
/// so a failing script leaves the schema at the last good version.
pub struct SqlSchemaManager<'a> {
    dir: PathBuf,
    db: &'a mut Database,
    table_prefix: String,
}

impl<'a> SqlSchemaManager<'a> {
    pub fn new(
        dir: impl Into<PathBuf>,
        db: &'a mut Database,
        table_prefix: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            db,
            table_prefix: table_prefix.into(),
        }
    }

    /// Full name of the version table, prefix included.
    pub fn version_table(&self) -> String {
        format!("{}{}", self.table_prefix, SCHEMA_VERSION_TABLE)
    }

    /// Versions of the scripts on disk, ascending.
    pub fn available_versions(&self) -> Result<Vec<SchemaVersion>> {
        Ok(discover_migrations(&self.dir)?
            .into_iter()
            .map(|file| file.version)
            .collect())
    }

    /// Scripts to run when moving from `from` to `to`, in execution order.
    fn migrations_between(
        &self,
        from: SchemaVersion,
        to: SchemaVersion,
    ) -> Result<Vec<MigrationFile>> {
        let files = discover_migrations(&self.dir)?;
        let selected = if to > from {
            files
                .into_iter()
                .filter(|f| f.version > from && f.version <= to)
                .collect()
        } else {
            let mut down: Vec<_> = files
                .into_iter()
                .filter(|f| f.version > to && f.version <= from)
                .collect();
            down.reverse();
            down
        };
        Ok(selected)
    }

    fn ensure_version_table(&mut self) -> Result<()> {
        let table = self.version_table();
        self.db.with_conn(|conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS \"{table}\" (version INTEGER NOT NULL PRIMARY KEY)"
            ))?;
            let rows: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))?;
            if rows == 0 {
                conn.execute(&format!("INSERT INTO \"{table}\" (version) VALUES (0)"), [])?;
            }
            Ok(())
        })
    }

    fn run_migration(&mut self, file: &MigrationFile, direction: Direction) -> Result<()> {
        let script = file.load_script(&self.table_prefix)?;
        let (sql, new_version) = match direction {
            Direction::Up => (Some(script.up), file.version),
            Direction::Down => (script.down, file.version - 1),
        };
        if sql.is_none() {
            warn!(
                version = file.version,
                name = %file.name,
                "Script has no down section; only the version is changed"
            );
        }

        let table = self.version_table();
        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if let Some(sql) = sql.as_deref().filter(|sql| !sql.is_empty()) {
                tx.execute_batch(sql)
                    .map_err(|source| SchemaError::MigrationFailed {
                        version: file.version,
                        name: file.name.clone(),
                        source,
                    })?;
            }
            tx.execute(
                &format!("UPDATE \"{table}\" SET version = ?1"),
                params![new_version],
            )?;
            tx.commit()?;
            Ok(())
        })?;

        info!(
            version = file.version,
            name = %file.name,
            direction = %direction,
            "Applied migration"
        );
        Ok(())
    }
}

impl SchemaManager for SqlSchemaManager<'_> {
    fn current_schema_version(&mut self) -> Result<SchemaVersion> {
        let table = self.version_table();
        self.db.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
                params![table],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(0);
            }
            let version: Option<SchemaVersion> = conn.query_row(
                &format!("SELECT MAX(version) FROM \"{table}\""),
                [],
                |row| row.get(0),
            )?;
            Ok(version.unwrap_or(0))
        })
    }

    fn process_version(&mut self, token: Option<&str>) -> Result<SchemaVersion> {
        let token = VersionToken::parse(token)?;
        if let VersionToken::Absolute(version) = token {
            return Ok(version);
        }

        let current = self.current_schema_version()?;
        let versions = self.available_versions()?;
        let target = match token {
            VersionToken::Latest => versions.last().copied().unwrap_or(current).max(current),
            VersionToken::Next => step_target(current, 1, &versions),
            VersionToken::Prev => step_target(current, -1, &versions),
            VersionToken::Step(steps) => step_target(current, steps, &versions),
            VersionToken::Absolute(version) => version,
        };

        debug!(token = %token, current, target, "Resolved version request");
        Ok(target)
    }

    fn update_to(&mut self, target: SchemaVersion) -> Result<UpdateResult> {
        let current = self.current_schema_version()?;
        if target == current {
            return Ok(UpdateResult::AtCurrentVersion);
        }

        let files = self.migrations_between(current, target)?;
        if files.is_empty() {
            return Ok(UpdateResult::NoMigrationsFound);
        }

        let direction = if target > current {
            Direction::Up
        } else {
            Direction::Down
        };
        info!(
            from = current,
            to = target,
            scripts = files.len(),
            direction = %direction,
            "Migrating schema"
        );

        self.ensure_version_table()?;
        for file in &files {
            self.run_migration(file, direction)?;
        }

        Ok(UpdateResult::Success)
    }
}

/// Resolve a signed step count against the available script versions.
///
/// Forward steps land on the N-th script above `current`, clamped to the
/// newest. Backward steps undo N scripts at or below `current`; undoing a
/// script leaves the schema one below its version.
pub fn step_target(
    current: SchemaVersion,
    steps: i64,
    versions: &[SchemaVersion],
) -> SchemaVersion {
    if steps >= 0 {
        let above: Vec<_> = versions.iter().copied().filter(|v| *v > current).collect();
        if steps == 0 || above.is_empty() {
            return current;
        }
        let index = usize::try_from(steps - 1)
            .unwrap_or(usize::MAX)
            .min(above.len() - 1);
        above[index]
    } else {
        let below: Vec<_> = versions
            .iter()
            .rev()
            .copied()
            .filter(|v| *v <= current)
            .collect();
        let count = usize::try_from(steps.unsigned_abs()).unwrap_or(usize::MAX);
        match below.get(count - 1) {
            Some(version) => version - 1,
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_migration(dir: &Path, file_name: &str, table: &str) {
        std::fs::write(
            dir.join(file_name),
            format!(
                "-- migrate:up\nCREATE TABLE {{prefix}}{table} (id INTEGER PRIMARY KEY);\n\
                 -- migrate:down\nDROP TABLE {{prefix}}{table};\n"
            ),
        )
        .unwrap();
    }

    fn table_exists(db: &Database, table: &str) -> bool {
        db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
                params![table],
                |row| row.get(0),
            )?)
        })
        .unwrap()
    }

    fn setup(files: &[(&str, &str)]) -> (TempDir, Database) {
        let temp = TempDir::new().unwrap();
        for (file_name, table) in files {
            write_migration(temp.path(), file_name, table);
        }
        (temp, Database::open_in_memory().unwrap())
    }

    #[test]
    fn test_step_target_forward() {
        let versions = [1, 2, 5, 9];
        assert_eq!(step_target(0, 1, &versions), 1);
        assert_eq!(step_target(2, 1, &versions), 5);
        assert_eq!(step_target(2, 2, &versions), 9);
        assert_eq!(step_target(2, 10, &versions), 9);
        assert_eq!(step_target(9, 1, &versions), 9);
        assert_eq!(step_target(3, 0, &versions), 3);
    }

    #[test]
    fn test_step_target_backward() {
        let versions = [1, 2, 5, 9];
        assert_eq!(step_target(9, -1, &versions), 8);
        assert_eq!(step_target(9, -2, &versions), 4);
        assert_eq!(step_target(9, -4, &versions), 0);
        assert_eq!(step_target(9, -10, &versions), 0);
        assert_eq!(step_target(4, -1, &versions), 1);
        assert_eq!(step_target(0, -1, &versions), 0);
    }

    #[test]
    fn test_current_version_is_zero_without_side_effects() {
        let (temp, mut db) = setup(&[]);
        let mut manager = SqlSchemaManager::new(temp.path(), &mut db, "");
        assert_eq!(manager.current_schema_version().unwrap(), 0);
        drop(manager);
        assert!(!table_exists(&db, SCHEMA_VERSION_TABLE));
    }

    #[test]
    fn test_update_to_latest() {
        let (temp, mut db) = setup(&[("001-Users.sql", "users"), ("002-Orders.sql", "orders")]);
        {
            let mut manager = SqlSchemaManager::new(temp.path(), &mut db, "");
            let target = manager.process_version(None).unwrap();
            assert_eq!(target, 2);
            assert_eq!(manager.update_to(target).unwrap(), UpdateResult::Success);
            assert_eq!(manager.current_schema_version().unwrap(), 2);
            assert_eq!(manager.update_to(2).unwrap(), UpdateResult::AtCurrentVersion);
        }
        assert!(table_exists(&db, "users"));
        assert!(table_exists(&db, "orders"));
    }

    #[test]
    fn test_latest_without_scripts_stays_put() {
        let (temp, mut db) = setup(&[]);
        let mut manager = SqlSchemaManager::new(temp.path(), &mut db, "");
        let target = manager.process_version(None).unwrap();
        assert_eq!(target, 0);
        assert_eq!(manager.update_to(target).unwrap(), UpdateResult::AtCurrentVersion);
    }

    #[test]
    fn test_rollback_runs_down_sections() {
        let (temp, mut db) = setup(&[("001-Users.sql", "users"), ("002-Orders.sql", "orders")]);
        {
            let mut manager = SqlSchemaManager::new(temp.path(), &mut db, "");
            manager.update_to(2).unwrap();
            let target = manager.process_version(Some("prev")).unwrap();
            assert_eq!(target, 1);
            assert_eq!(manager.update_to(target).unwrap(), UpdateResult::Success);
            assert_eq!(manager.current_schema_version().unwrap(), 1);
        }
        assert!(table_exists(&db, "users"));
        assert!(!table_exists(&db, "orders"));
    }

    #[test]
    fn test_down_past_missing_scripts_lands_below_last_script() {
        let (temp, mut db) = setup(&[("003-Users.sql", "users")]);
        let mut manager = SqlSchemaManager::new(temp.path(), &mut db, "");
        manager.update_to(3).unwrap();
        assert_eq!(manager.current_schema_version().unwrap(), 3);

        let target = manager.process_version(Some("1")).unwrap();
        assert_eq!(manager.update_to(target).unwrap(), UpdateResult::Success);
        assert_eq!(manager.current_schema_version().unwrap(), 2);
    }

    #[test]
    fn test_no_scripts_in_range() {
        let (temp, mut db) = setup(&[("001-Users.sql", "users")]);
        let mut manager = SqlSchemaManager::new(temp.path(), &mut db, "");
        manager.update_to(1).unwrap();
        assert_eq!(manager.update_to(5).unwrap(), UpdateResult::NoMigrationsFound);
        assert_eq!(manager.current_schema_version().unwrap(), 1);
    }

    #[test]
    fn test_failed_script_rolls_back_and_keeps_earlier_work() {
        let (temp, mut db) = setup(&[("001-Users.sql", "users")]);
        std::fs::write(
            temp.path().join("002-Broken.sql"),
            "-- migrate:up\nCREATE TABLE broken (id INTEGER);\nTHIS IS NOT SQL;\n",
        )
        .unwrap();

        {
            let mut manager = SqlSchemaManager::new(temp.path(), &mut db, "");
            let err = manager.update_to(2).unwrap_err();
            assert!(matches!(err, SchemaError::MigrationFailed { version: 2, .. }));
            assert_eq!(manager.current_schema_version().unwrap(), 1);
        }
        assert!(table_exists(&db, "users"));
        assert!(!table_exists(&db, "broken"));
    }

    #[test]
    fn test_prefix_applies_to_version_table_and_scripts() {
        let (temp, mut db) = setup(&[("001-Users.sql", "users")]);
        {
            let mut manager = SqlSchemaManager::new(temp.path(), &mut db, "shop_");
            assert_eq!(manager.version_table(), "shop_schema_version");
            manager.update_to(1).unwrap();
        }
        assert!(table_exists(&db, "shop_schema_version"));
        assert!(table_exists(&db, "shop_users"));
        assert!(!table_exists(&db, SCHEMA_VERSION_TABLE));
    }

    #[test]
    fn test_missing_directory_is_reported() {
        let temp = TempDir::new().unwrap();
        let mut db = Database::open_in_memory().unwrap();
        let mut manager = SqlSchemaManager::new(temp.path().join("nope"), &mut db, "");
        let err = manager.process_version(None).unwrap_err();
        assert!(matches!(err, SchemaError::MigrationsDirectoryMissing(_)));
    }
}
