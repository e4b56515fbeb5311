use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("failed to load migrations: {0}")]
    Load(String),

    #[error("duplicate migration id: {0}")]
    DuplicateMigration(i64),

    #[error("invalid migration id: {0}")]
    InvalidMigrationId(String),

    #[error("unrecognized migration direction: {0:?}")]
    UnrecognizedDirection(String),

    #[error("migration {id} ({name}) failed: {reason}")]
    Execution {
        id: i64,
        name: String,
        reason: String,
    },

    #[error("migration error: {0}")]
    Migration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}
