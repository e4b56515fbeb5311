use dbshift_common::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};

/// The handful of driver operations the migrator needs.
///
/// Methods take `&self` so the caller keeps using the same handle while a
/// migrator borrows it. Drivers that need exclusive access wrap their
/// connection in a `Mutex`.
pub trait Database {
    /// Run a script that may hold several statements and returns no rows.
    fn execute_script(&self, sql: &str) -> Result<()>;

    /// Run one statement with `id` bound to its only placeholder.
    /// Returns the number of affected rows.
    fn execute_with_id(&self, sql: &str, id: i64) -> Result<u64>;

    /// First column of the first row, if any, with `id` bound.
    fn query_id(&self, sql: &str, id: i64) -> Result<Option<i64>>;

    /// First column of every row, in result order.
    fn query_ids(&self, sql: &str) -> Result<Vec<i64>>;

    /// First column of the first row, if any, with `name` bound.
    fn query_name(&self, sql: &str, name: &str) -> Result<Option<String>>;
}

impl Database for Connection {
    fn execute_script(&self, sql: &str) -> Result<()> {
        self.execute_batch(sql)
            .map_err(|e| Error::Database(format!("failed to execute script: {e}")))
    }

    fn execute_with_id(&self, sql: &str, id: i64) -> Result<u64> {
        let affected = self
            .execute(sql, params![id])
            .map_err(|e| Error::Database(format!("failed to execute statement: {e}")))?;
        Ok(affected as u64)
    }

    fn query_id(&self, sql: &str, id: i64) -> Result<Option<i64>> {
        self.query_row(sql, params![id], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(format!("failed to query migration log: {e}")))
    }

    fn query_ids(&self, sql: &str) -> Result<Vec<i64>> {
        let mut stmt = self
            .prepare(sql)
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(|e| Error::Database(format!("failed to query migration log: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(format!("failed to read migration log row: {e}")))
    }

    fn query_name(&self, sql: &str, name: &str) -> Result<Option<String>> {
        self.query_row(sql, params![name], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(format!("failed to query table name: {e}")))
    }
}
