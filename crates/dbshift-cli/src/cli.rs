use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dbshift_common::Dialect;
use dbshift_config::{AppConfig, ConfigLoader, LogFormat};

#[derive(Debug, Parser)]
#[command(name = "dbshift", version, about = "Apply and roll back versioned SQL migrations")]
pub struct Cli {
    /// Path to a YAML or TOML config file
    #[arg(short, long, env = "DBSHIFT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Database URL (file path for sqlite)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// SQL dialect: postgres, mysql or sqlite
    #[arg(long, global = true)]
    pub dialect: Option<Dialect>,

    /// Directory holding `<id>_<name>_<up|down>.sql` files
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Name of the tracking table
    #[arg(long, global = true)]
    pub table: Option<String>,

    /// Do not wrap each migration step in a transaction
    #[arg(long, global = true)]
    pub no_transaction: bool,

    /// Log output format
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply every pending migration
    Migrate,
    /// Roll back the most recent migrations
    Rollback {
        /// How many migrations to roll back
        #[arg(default_value_t = 1)]
        steps: usize,
        /// Roll back every applied migration
        #[arg(long, conflicts_with = "steps")]
        all: bool,
    },
    /// Show each migration and whether it is applied
    Status,
    /// Apply a single migration in one direction
    Apply {
        /// Migration id
        id: i64,
        /// `up` or `down`
        direction: String,
    },
}

impl Cli {
    /// Config file (or defaults) with command-line flags layered on top.
    pub fn resolve_config(&self) -> Result<AppConfig> {
        let mut config = ConfigLoader::load_or_default(self.config.as_deref())?;
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if let Some(dialect) = self.dialect {
            config.database.dialect = dialect;
        }
        if let Some(dir) = &self.dir {
            config.migrations.dir = dir.clone();
        }
        if let Some(table) = &self.table {
            config.migrations.table = table.clone();
        }
        if self.no_transaction {
            config.migrations.transactional = false;
        }
        if let Some(format) = self.log_format {
            config.log.format = format;
        }
    }
}
