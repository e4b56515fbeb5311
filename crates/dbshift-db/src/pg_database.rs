use std::sync::{Mutex, MutexGuard};

use dbshift_common::{Error, Result};
use postgres::{Client, NoTls};
use tracing::info;

use crate::database::Database;

/// Postgres handle for the migrator, backed by the synchronous `postgres` client.
pub struct PgDatabase {
    client: Mutex<Client>,
}

impl PgDatabase {
    pub fn connect(url: &str) -> Result<Self> {
        info!("connecting to postgres");
        let client = Client::connect(url, NoTls)
            .map_err(|e| Error::Database(format!("failed to connect to postgres: {e}")))?;
        Ok(Self::new(client))
    }

    pub fn new(client: Client) -> Self {
        Self {
            client: Mutex::new(client),
        }
    }

    fn client(&self) -> Result<MutexGuard<'_, Client>> {
        self.client
            .lock()
            .map_err(|_| Error::Database("postgres client lock poisoned".into()))
    }
}

impl Database for PgDatabase {
    fn execute_script(&self, sql: &str) -> Result<()> {
        self.client()?
            .batch_execute(sql)
            .map_err(|e| Error::Database(format!("failed to execute script: {e}")))
    }

    fn execute_with_id(&self, sql: &str, id: i64) -> Result<u64> {
        self.client()?
            .execute(sql, &[&id])
            .map_err(|e| Error::Database(format!("failed to execute statement: {e}")))
    }

    fn query_id(&self, sql: &str, id: i64) -> Result<Option<i64>> {
        let row = self
            .client()?
            .query_opt(sql, &[&id])
            .map_err(|e| Error::Database(format!("failed to query migration log: {e}")))?;
        row.map(|row| row.try_get::<_, i64>(0))
            .transpose()
            .map_err(|e| Error::Database(format!("failed to read migration log row: {e}")))
    }

    fn query_ids(&self, sql: &str) -> Result<Vec<i64>> {
        let rows = self
            .client()?
            .query(sql, &[])
            .map_err(|e| Error::Database(format!("failed to query migration log: {e}")))?;
        rows.iter()
            .map(|row| row.try_get::<_, i64>(0))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(format!("failed to read migration log row: {e}")))
    }

    fn query_name(&self, sql: &str, name: &str) -> Result<Option<String>> {
        let row = self
            .client()?
            .query_opt(sql, &[&name])
            .map_err(|e| Error::Database(format!("failed to query table name: {e}")))?;
        row.map(|row| row.try_get::<_, String>(0))
            .transpose()
            .map_err(|e| Error::Database(format!("failed to read table name: {e}")))
    }
}
