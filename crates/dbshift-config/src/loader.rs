use std::path::{Path, PathBuf};

use dbshift_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

pub const ENV_DATABASE_URL: &str = "DBSHIFT_DATABASE_URL";
pub const ENV_DIALECT: &str = "DBSHIFT_DIALECT";
pub const ENV_MIGRATIONS_DIR: &str = "DBSHIFT_MIGRATIONS_DIR";

/// Reads `AppConfig` from YAML or TOML and layers environment overrides on top.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `path`, apply `DBSHIFT_*` environment overrides.
    pub fn load(path: &Path) -> Result<AppConfig> {
        info!("loading config from {}", path.display());
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let mut config = Self::parse(&contents, ext)?;
        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load `path` if given, otherwise start from defaults. Environment
    /// overrides apply either way.
    pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig> {
        match path {
            Some(path) => Self::load(path),
            None => {
                debug!("no config file given, using defaults");
                let mut config = AppConfig::default();
                Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
                Ok(config)
            }
        }
    }

    /// Parse config text in the format named by `ext`.
    pub fn parse(contents: &str, ext: &str) -> Result<AppConfig> {
        match ext {
            "yml" | "yaml" => serde_yaml::from_str(contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
            "toml" => toml::from_str(contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}"))),
            other => Err(Error::Config(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }

    /// Overlay values from `lookup` (normally the process environment).
    pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL).filter(|v| !v.is_empty()) {
            debug!("database url overridden by {ENV_DATABASE_URL}");
            config.database.url = url;
        }
        if let Some(dialect) = lookup(ENV_DIALECT).filter(|v| !v.is_empty()) {
            config.database.dialect = dialect.parse()?;
        }
        if let Some(dir) = lookup(ENV_MIGRATIONS_DIR).filter(|v| !v.is_empty()) {
            config.migrations.dir = PathBuf::from(dir);
        }
        Ok(())
    }
}
