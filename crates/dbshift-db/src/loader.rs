use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use dbshift_common::{Error, Result};
use regex::Regex;
use tracing::{debug, info};

use crate::migration::{Direction, Migration, MigrationId};

/// `<id>_<name>_<up|down>.sql`, e.g. `100_create_users_up.sql`.
static MIGRATION_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)_(\w+)_(up|down)\.sql$").expect("migration file pattern is valid")
});

#[derive(Default)]
struct PendingPair {
    name: String,
    up: Option<String>,
    down: Option<String>,
}

/// Read every migration in `dir`, sorted by ascending id.
///
/// Each migration needs both an `up` and a `down` file sharing the same id and
/// name. Files that do not follow the naming scheme are ignored.
pub fn migrations_from_path(dir: &Path) -> Result<Vec<Migration>> {
    info!("loading migrations from {}", dir.display());
    let entries = fs::read_dir(dir)
        .map_err(|e| Error::Load(format!("failed to read {}: {e}", dir.display())))?;

    let mut pairs: BTreeMap<MigrationId, PendingPair> = BTreeMap::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| Error::Load(format!("failed to read {}: {e}", dir.display())))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            debug!("skipping non-utf8 file name in {}", dir.display());
            continue;
        };
        let Some(caps) = MIGRATION_FILE.captures(file_name) else {
            debug!("skipping {file_name}: not a migration file");
            continue;
        };

        let id = parse_id(&caps[1], file_name)?;
        let name = &caps[2];
        let direction: Direction = caps[3].parse()?;

        let sql = fs::read_to_string(&path)
            .map_err(|e| Error::Load(format!("failed to read {}: {e}", path.display())))?;

        let pair = pairs.entry(id).or_insert_with(|| PendingPair {
            name: name.to_string(),
            ..Default::default()
        });
        if pair.name != name {
            return Err(Error::Load(format!(
                "migration {id} has mismatched names: {} and {name}",
                pair.name
            )));
        }

        let slot = match direction {
            Direction::Up => &mut pair.up,
            Direction::Down => &mut pair.down,
        };
        if slot.replace(sql).is_some() {
            return Err(Error::DuplicateMigration(id));
        }
    }

    let mut migrations = Vec::with_capacity(pairs.len());
    for (id, pair) in pairs {
        let up = pair
            .up
            .ok_or_else(|| Error::Load(format!("migration {id} ({}) has no up file", pair.name)))?;
        let down = pair.down.ok_or_else(|| {
            Error::Load(format!("migration {id} ({}) has no down file", pair.name))
        })?;
        migrations.push(Migration::new(id, pair.name, up, down));
    }

    debug!("found {} migrations in {}", migrations.len(), dir.display());
    Ok(migrations)
}

fn parse_id(raw: &str, file_name: &str) -> Result<MigrationId> {
    let id: MigrationId = raw
        .parse()
        .map_err(|e| Error::InvalidMigrationId(format!("{file_name}: {e}")))?;
    if id == 0 {
        return Err(Error::InvalidMigrationId(format!(
            "{file_name}: ids must be positive"
        )));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write(dir: &Path, name: &str, sql: &str) {
        fs::write(dir.join(name), sql).unwrap();
    }

    #[test]
    fn loads_pairs_sorted_by_id() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "110_second_up.sql", "CREATE TABLE b (id INTEGER)");
        write(dir.path(), "110_second_down.sql", "DROP TABLE b");
        write(dir.path(), "100_create_users_up.sql", "CREATE TABLE a (id INTEGER)");
        write(dir.path(), "100_create_users_down.sql", "DROP TABLE a");

        let migrations = migrations_from_path(dir.path()).unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].id(), 100);
        assert_eq!(migrations[0].name(), "create_users");
        assert_eq!(migrations[0].up(), "CREATE TABLE a (id INTEGER)");
        assert_eq!(migrations[0].down(), "DROP TABLE a");
        assert_eq!(migrations[1].id(), 110);
        assert!(migrations.iter().all(|m| !m.is_active()));
    }

    #[test]
    fn ignores_unrelated_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1_init_up.sql", "");
        write(dir.path(), "1_init_down.sql", "");
        write(dir.path(), "README.md", "# notes");
        write(dir.path(), "2_init_sideways.sql", "");
        fs::create_dir(dir.path().join("3_nested_up.sql")).unwrap();

        let migrations = migrations_from_path(dir.path()).unwrap();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0].up(), "");
    }

    #[test]
    fn missing_half_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "5_lonely_up.sql", "SELECT 1");

        let err = migrations_from_path(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Load(ref msg) if msg.contains("no down file")));
    }

    #[test]
    fn duplicate_id_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "5_same_up.sql", "");
        write(dir.path(), "005_same_up.sql", "");
        write(dir.path(), "5_same_down.sql", "");

        let err = migrations_from_path(dir.path()).unwrap_err();
        assert!(matches!(err, Error::DuplicateMigration(5)));
    }

    #[test]
    fn mismatched_names_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "5_alpha_up.sql", "");
        write(dir.path(), "5_beta_down.sql", "");

        let err = migrations_from_path(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Load(ref msg) if msg.contains("mismatched")));
    }

    #[test]
    fn zero_and_oversized_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0_zero_up.sql", "");
        assert!(matches!(
            migrations_from_path(dir.path()),
            Err(Error::InvalidMigrationId(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "99999999999999999999_huge_up.sql", "");
        assert!(matches!(
            migrations_from_path(dir.path()),
            Err(Error::InvalidMigrationId(_))
        ));
    }

    #[test]
    fn unreadable_directory_is_a_load_error() {
        let err = migrations_from_path(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, Error::Load(_)));
    }
}
