//! Process configuration for the registrar core.
//!
//! # Responsibility
//! - Describe storage and logging settings with sensible defaults.
//! - Load settings from a JSON file and apply environment overrides.
//!
//! # Invariants
//! - Every field has a default, so an empty JSON object is a valid config.
//! - Environment variables always win over file values.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DB_PATH: &str = "REGISTRAR_DB_PATH";
pub const ENV_LOCK_TIMEOUT_MS: &str = "REGISTRAR_LOCK_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "REGISTRAR_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "REGISTRAR_LOG_DIR";

/// Errors raised while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    NotFound(PathBuf),
    Io(std::io::Error),
    Parse(serde_json::Error),
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "configuration file not found: {}", path.display()),
            Self::Io(err) => write!(f, "{err}"),
            Self::Parse(err) => write!(f, "invalid configuration: {err}"),
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for `{key}`")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::NotFound(_) | Self::InvalidValue { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./registrar.db")
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    crate::logging::default_log_level().to_string()
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Upper bound on waiting for the enrollment write lock.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl StorageConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Logging settings. `log_dir = None` leaves file logging disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

/// Top-level registrar configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrarConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RegistrarConfig {
    /// Loads a JSON config file, then applies process environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let file = File::open(path)?;
        let mut config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Builds a config from defaults plus process environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = lookup(ENV_DB_PATH) {
            self.storage.database_path = PathBuf::from(path.trim());
        }
        if let Some(raw) = lookup(ENV_LOCK_TIMEOUT_MS) {
            self.storage.lock_timeout_ms =
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: ENV_LOCK_TIMEOUT_MS,
                        value: raw.clone(),
                    })?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level.trim().to_string();
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            self.logging.log_dir = Some(PathBuf::from(dir.trim()));
        }

        Ok(())
    }
}
