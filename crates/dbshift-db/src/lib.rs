pub mod adapter;
pub mod database;
pub mod loader;
pub mod migration;
pub mod migrator;
#[cfg(feature = "mysql")]
pub mod mysql_database;
#[cfg(feature = "postgres")]
pub mod pg_database;

pub use adapter::{Adapter, DEFAULT_TABLE, Mysql, Postgres, Sqlite, adapter_for};
pub use database::Database;
pub use loader::migrations_from_path;
pub use migration::{Direction, Migration, MigrationId, Status};
pub use migrator::Migrator;
#[cfg(feature = "mysql")]
pub use mysql_database::MysqlDatabase;
#[cfg(feature = "postgres")]
pub use pg_database::PgDatabase;
