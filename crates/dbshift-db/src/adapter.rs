use dbshift_common::{Dialect, Error, Result};

/// Default name of the tracking table.
pub const DEFAULT_TABLE: &str = "dbshift";

/// Dialect-specific SQL text for the statements the migrator needs.
///
/// Implementations only produce SQL; the migrator decides when to run it.
/// Every parametrized statement binds exactly one value in position 1.
pub trait Adapter: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Name of the tracking table this adapter targets.
    fn table(&self) -> &str;

    /// DDL for the tracking table. Must be safe to run repeatedly.
    fn create_migration_table_sql(&self) -> String;

    /// INSERT of one migration id into the tracking table.
    fn migration_log_insert_sql(&self) -> String;

    /// DELETE of one migration id's row.
    fn migration_log_delete_sql(&self) -> String;

    /// SELECT of `migration_id` for a single id. No row means inactive.
    fn get_migration_sql(&self) -> String;

    /// Every applied id in ascending order.
    fn select_applied_sql(&self) -> String;

    /// Returns the table name when a table with the bound name exists.
    fn select_migration_table_sql(&self) -> String;

    /// Break a migration script into the statements the driver executes.
    fn split_commands(&self, script: &str) -> Vec<String> {
        if script.trim().is_empty() {
            Vec::new()
        } else {
            vec![script.to_string()]
        }
    }

    /// Whether DDL can be rolled back inside a transaction.
    fn transactional_ddl(&self) -> bool {
        true
    }

    fn begin_sql(&self) -> &'static str {
        "BEGIN"
    }

    fn commit_sql(&self) -> &'static str {
        "COMMIT"
    }

    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK"
    }
}

/// Build the adapter for `dialect` with the given tracking table name.
pub fn adapter_for(dialect: Dialect, table: &str) -> Result<Box<dyn Adapter>> {
    validate_table_name(table)?;
    let table = table.to_string();
    Ok(match dialect {
        Dialect::Postgres => Box::new(Postgres { table }),
        Dialect::Mysql => Box::new(Mysql { table }),
        Dialect::Sqlite => Box::new(Sqlite { table }),
    })
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::Config(format!(
            "invalid tracking table name: {table:?}"
        )));
    }
    if table.len() > 63 {
        return Err(Error::Config(format!("tracking table name too long: {table}")));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Postgres {
    table: String,
}

impl Default for Postgres {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl Adapter for Postgres {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn table(&self) -> &str {
        &self.table
    }

    fn create_migration_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                migration_id BIGINT UNIQUE NOT NULL
            )",
            self.table
        )
    }

    fn migration_log_insert_sql(&self) -> String {
        format!("INSERT INTO {} (migration_id) VALUES ($1)", self.table)
    }

    fn migration_log_delete_sql(&self) -> String {
        format!("DELETE FROM {} WHERE migration_id = $1", self.table)
    }

    fn get_migration_sql(&self) -> String {
        format!(
            "SELECT migration_id FROM {} WHERE migration_id = $1",
            self.table
        )
    }

    fn select_applied_sql(&self) -> String {
        format!(
            "SELECT migration_id FROM {} ORDER BY migration_id ASC",
            self.table
        )
    }

    fn select_migration_table_sql(&self) -> String {
        "SELECT tablename::text FROM pg_catalog.pg_tables WHERE tablename = $1".to_string()
    }
}

/// MySQL and MariaDB.
#[derive(Debug, Clone)]
pub struct Mysql {
    table: String,
}

impl Default for Mysql {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl Adapter for Mysql {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn table(&self) -> &str {
        &self.table
    }

    fn create_migration_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INT NOT NULL AUTO_INCREMENT,
                migration_id BIGINT NOT NULL UNIQUE,
                PRIMARY KEY (id)
            )",
            self.table
        )
    }

    fn migration_log_insert_sql(&self) -> String {
        format!("INSERT INTO {} (migration_id) VALUES (?)", self.table)
    }

    fn migration_log_delete_sql(&self) -> String {
        format!("DELETE FROM {} WHERE migration_id = ?", self.table)
    }

    fn get_migration_sql(&self) -> String {
        format!(
            "SELECT migration_id FROM {} WHERE migration_id = ?",
            self.table
        )
    }

    fn select_applied_sql(&self) -> String {
        format!(
            "SELECT migration_id FROM {} ORDER BY migration_id ASC",
            self.table
        )
    }

    fn select_migration_table_sql(&self) -> String {
        "SELECT table_name FROM information_schema.tables \
         WHERE table_name = ? AND table_schema = (SELECT DATABASE())"
            .to_string()
    }

    // Statements are sent one at a time. A `;` inside a string literal
    // is not recognised.
    fn split_commands(&self, script: &str) -> Vec<String> {
        script
            .split(';')
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn transactional_ddl(&self) -> bool {
        false
    }

    fn begin_sql(&self) -> &'static str {
        "START TRANSACTION"
    }
}

/// SQLite 3.
#[derive(Debug, Clone)]
pub struct Sqlite {
    table: String,
}

impl Default for Sqlite {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl Adapter for Sqlite {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn table(&self) -> &str {
        &self.table
    }

    fn create_migration_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY,
                migration_id INTEGER NOT NULL UNIQUE
            )",
            self.table
        )
    }

    fn migration_log_insert_sql(&self) -> String {
        format!("INSERT INTO {} (migration_id) VALUES (?1)", self.table)
    }

    fn migration_log_delete_sql(&self) -> String {
        format!("DELETE FROM {} WHERE migration_id = ?1", self.table)
    }

    fn get_migration_sql(&self) -> String {
        format!(
            "SELECT migration_id FROM {} WHERE migration_id = ?1",
            self.table
        )
    }

    fn select_applied_sql(&self) -> String {
        format!(
            "SELECT migration_id FROM {} ORDER BY migration_id ASC",
            self.table
        )
    }

    fn select_migration_table_sql(&self) -> String {
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1".to_string()
    }
}
