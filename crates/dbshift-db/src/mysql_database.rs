use std::sync::{Mutex, MutexGuard};

use dbshift_common::{Error, Result};
use mysql::prelude::Queryable;
use mysql::{Conn, Opts};
use tracing::info;

use crate::database::Database;

/// MySQL/MariaDB handle for the migrator.
pub struct MysqlDatabase {
    conn: Mutex<Conn>,
}

impl MysqlDatabase {
    pub fn connect(url: &str) -> Result<Self> {
        info!("connecting to mysql");
        let opts = Opts::from_url(url)
            .map_err(|e| Error::Database(format!("invalid mysql url: {e}")))?;
        let conn = Conn::new(opts)
            .map_err(|e| Error::Database(format!("failed to connect to mysql: {e}")))?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: Conn) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn connection(&self) -> Result<MutexGuard<'_, Conn>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("mysql connection lock poisoned".into()))
    }
}

impl Database for MysqlDatabase {
    fn execute_script(&self, sql: &str) -> Result<()> {
        self.connection()?
            .query_drop(sql)
            .map_err(|e| Error::Database(format!("failed to execute script: {e}")))
    }

    fn execute_with_id(&self, sql: &str, id: i64) -> Result<u64> {
        let mut conn = self.connection()?;
        conn.exec_drop(sql, (id,))
            .map_err(|e| Error::Database(format!("failed to execute statement: {e}")))?;
        Ok(conn.affected_rows())
    }

    fn query_id(&self, sql: &str, id: i64) -> Result<Option<i64>> {
        self.connection()?
            .exec_first::<i64, _, _>(sql, (id,))
            .map_err(|e| Error::Database(format!("failed to query migration log: {e}")))
    }

    fn query_ids(&self, sql: &str) -> Result<Vec<i64>> {
        self.connection()?
            .query::<i64, _>(sql)
            .map_err(|e| Error::Database(format!("failed to query migration log: {e}")))
    }

    fn query_name(&self, sql: &str, name: &str) -> Result<Option<String>> {
        self.connection()?
            .exec_first::<String, _, _>(sql, (name,))
            .map_err(|e| Error::Database(format!("failed to query table name: {e}")))
    }
}
