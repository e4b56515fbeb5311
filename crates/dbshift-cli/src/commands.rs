use std::io::Write;

use anyhow::{Context, Result};
use dbshift_common::Dialect;
use dbshift_config::AppConfig;
use dbshift_db::{Database, Migrator, adapter_for};
use rusqlite::Connection;
use tracing::info;

use crate::cli::Command;

/// Open the database named by the config.
pub fn open_database(config: &AppConfig) -> Result<Box<dyn Database>> {
    let url = &config.database.url;
    match config.database.dialect {
        Dialect::Sqlite => {
            info!("opening sqlite database at {url}");
            let conn = Connection::open(url)
                .with_context(|| format!("failed to open sqlite database {url}"))?;
            Ok(Box::new(conn))
        }
        Dialect::Postgres => open_postgres(url),
        Dialect::Mysql => open_mysql(url),
    }
}

#[cfg(feature = "postgres")]
fn open_postgres(url: &str) -> Result<Box<dyn Database>> {
    Ok(Box::new(dbshift_db::PgDatabase::connect(url)?))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(_url: &str) -> Result<Box<dyn Database>> {
    anyhow::bail!("dbshift was built without postgres support (enable the `postgres` feature)")
}

#[cfg(feature = "mysql")]
fn open_mysql(url: &str) -> Result<Box<dyn Database>> {
    Ok(Box::new(dbshift_db::MysqlDatabase::connect(url)?))
}

#[cfg(not(feature = "mysql"))]
fn open_mysql(_url: &str) -> Result<Box<dyn Database>> {
    anyhow::bail!("dbshift was built without mysql support (enable the `mysql` feature)")
}

/// Build a migrator from the config and run `command` against `db`.
/// Human-readable results go to `out`.
pub fn execute(
    db: &dyn Database,
    config: &AppConfig,
    command: &Command,
    out: &mut dyn Write,
) -> Result<()> {
    let adapter = adapter_for(config.database.dialect, &config.migrations.table)?;
    let dir = &config.migrations.dir;
    let mut migrator = Migrator::from_path(db, adapter, dir)
        .with_context(|| format!("failed to prepare migrations from {}", dir.display()))?
        .transactional(config.migrations.transactional);

    match command {
        Command::Migrate => {
            let applied = migrator.migrate()?;
            if applied.is_empty() {
                writeln!(out, "nothing to migrate")?;
            }
            for id in applied {
                writeln!(out, "applied {id}")?;
            }
        }
        Command::Rollback { steps, all } => {
            let reverted = if *all {
                migrator.rollback_all()?
            } else {
                migrator.rollback_n(*steps)?
            };
            if reverted.is_empty() {
                writeln!(out, "nothing to roll back")?;
            }
            for id in reverted {
                writeln!(out, "rolled back {id}")?;
            }
        }
        Command::Status => {
            for migration in migrator.migrations() {
                writeln!(
                    out,
                    "{:>8}  {:<8}  {}",
                    migration.id(),
                    migration.status(),
                    migration.name()
                )?;
            }
            for id in migrator.orphaned_ids()? {
                writeln!(out, "{id:>8}  {:<8}  (no migration file)", "orphaned")?;
            }
        }
        Command::Apply { id, direction } => {
            migrator.apply(*id, direction)?;
            writeln!(out, "applied {id} {}", direction.to_ascii_lowercase())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use dbshift_common::Error;

    use super::*;

    fn write_migrations(dir: &Path) {
        std::fs::write(dir.join("1_users_up.sql"), "CREATE TABLE users (id INTEGER)").unwrap();
        std::fs::write(dir.join("1_users_down.sql"), "DROP TABLE users").unwrap();
        std::fs::write(dir.join("2_posts_up.sql"), "CREATE TABLE posts (id INTEGER)").unwrap();
        std::fs::write(dir.join("2_posts_down.sql"), "DROP TABLE posts").unwrap();
    }

    fn sqlite_config(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.dialect = Dialect::Sqlite;
        config.database.url = dir.join("app.db").display().to_string();
        config.migrations.dir = dir.to_path_buf();
        config
    }

    fn run(db: &dyn Database, config: &AppConfig, command: Command) -> Result<String> {
        let mut out = Vec::new();
        execute(db, config, &command, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn migrate_status_and_rollback_against_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        write_migrations(dir.path());
        let config = sqlite_config(dir.path());
        let db = open_database(&config).unwrap();

        let out = run(db.as_ref(), &config, Command::Migrate).unwrap();
        assert_eq!(out, "applied 1\napplied 2\n");

        let out = run(db.as_ref(), &config, Command::Migrate).unwrap();
        assert_eq!(out, "nothing to migrate\n");

        let out = run(db.as_ref(), &config, Command::Status).unwrap();
        assert!(out.contains("1  active    users"));
        assert!(out.contains("2  active    posts"));

        let out = run(
            db.as_ref(),
            &config,
            Command::Rollback {
                steps: 1,
                all: false,
            },
        )
        .unwrap();
        assert_eq!(out, "rolled back 2\n");

        let out = run(db.as_ref(), &config, Command::Status).unwrap();
        assert!(out.contains("2  inactive  posts"));
    }

    #[test]
    fn state_survives_reopening_the_database() {
        let dir = tempfile::tempdir().unwrap();
        write_migrations(dir.path());
        let config = sqlite_config(dir.path());
        {
            let db = open_database(&config).unwrap();
            run(db.as_ref(), &config, Command::Migrate).unwrap();
        }

        let db = open_database(&config).unwrap();
        let out = run(
            db.as_ref(),
            &config,
            Command::Rollback {
                steps: 0,
                all: true,
            },
        )
        .unwrap();
        assert_eq!(out, "rolled back 2\nrolled back 1\n");
    }

    #[test]
    fn apply_rejects_unknown_direction() {
        let dir = tempfile::tempdir().unwrap();
        write_migrations(dir.path());
        let config = sqlite_config(dir.path());
        let db = open_database(&config).unwrap();

        let err = run(
            db.as_ref(),
            &config,
            Command::Apply {
                id: 1,
                direction: "sideways".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnrecognizedDirection(_))
        ));

        let out = run(
            db.as_ref(),
            &config,
            Command::Apply {
                id: 1,
                direction: "UP".into(),
            },
        )
        .unwrap();
        assert_eq!(out, "applied 1 up\n");
    }

    #[test]
    fn status_lists_orphaned_rows() {
        let dir = tempfile::tempdir().unwrap();
        write_migrations(dir.path());
        let config = sqlite_config(dir.path());
        let db = open_database(&config).unwrap();
        run(db.as_ref(), &config, Command::Status).unwrap();
        db.execute_with_id("INSERT INTO dbshift (migration_id) VALUES (?1)", 99)
            .unwrap();

        let out = run(db.as_ref(), &config, Command::Status).unwrap();
        assert!(out.contains("99  orphaned  (no migration file)"));
    }

    #[test]
    fn missing_migration_dir_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sqlite_config(dir.path());
        config.migrations.dir = dir.path().join("nope");
        let db = open_database(&config).unwrap();

        let err = run(db.as_ref(), &config, Command::Migrate).unwrap_err();
        assert!(format!("{err:#}").contains("failed to prepare migrations"));
    }

    #[cfg(not(feature = "postgres"))]
    #[test]
    fn postgres_requires_the_feature() {
        let mut config = AppConfig::default();
        config.database.url = "postgres://localhost/app".into();
        let err = open_database(&config).err().unwrap();
        assert!(err.to_string().contains("without postgres support"));
    }
}
