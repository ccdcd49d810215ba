//! Configuration file loading and resolution.
//!
//! Loads configuration from `config.toml` in the platform config directory
//! (e.g. `~/.config/vpnhist/config.toml` on Linux).
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `VPNHIST_CONFIG`: Override config file path
//! - `VPNHIST_DATA_DIR`: Data directory (history files live in `<dir>/history`)
//! - `VPNHIST_TTL_DAYS`: Discovered API lifetime in days
//! - `VPNHIST_SAVE_FAILURE`: `log` or `propagate`

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::error::{HistoryError, Result};
use crate::storage::history::{DEFAULT_DISCOVERED_API_TTL, HistoryOptions, SavePolicy};

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Environment variable to override config file path.
pub const ENV_CONFIG: &str = "VPNHIST_CONFIG";
/// Environment variable for the data directory.
pub const ENV_DATA_DIR: &str = "VPNHIST_DATA_DIR";
/// Environment variable for the discovered API TTL in days.
pub const ENV_TTL_DAYS: &str = "VPNHIST_TTL_DAYS";
/// Environment variable for the save failure policy.
pub const ENV_SAVE_FAILURE: &str = "VPNHIST_SAVE_FAILURE";

const SECS_PER_DAY: u64 = 24 * 3600;

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved configuration after merging CLI, env vars, and config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Application data directory.
    pub data_dir: PathBuf,
    /// Lifetime of cached discovered APIs.
    pub discovered_api_ttl: Duration,
    /// What mutations do when persisting fails.
    pub save_policy: SavePolicy,
    /// Log level from the config file, if any.
    pub log_level: Option<String>,
    /// Log format from the config file, if any.
    pub log_format: Option<String>,
    /// Config file that was consulted (it may not exist).
    pub config_path: PathBuf,
    /// Source of each setting for debugging.
    pub sources: ConfigSources,
}

/// Tracks the source of each configuration value.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub data_dir: ConfigSource,
    pub discovered_api_ttl: ConfigSource,
    pub save_policy: ConfigSource,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value from CLI flag.
    Cli,
    /// Value from environment variable.
    Env,
    /// Value from config file.
    ConfigFile,
    /// Built-in default.
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl ResolvedConfig {
    /// Resolve configuration from the CLI data dir flag, the process
    /// environment, and the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file exists but is invalid
    /// - An environment override holds an invalid value
    pub fn resolve(cli_data_dir: Option<&Path>) -> Result<Self> {
        Self::resolve_with(cli_data_dir, &AppPaths::new(), |key| std::env::var(key).ok())
    }

    /// Resolve with explicit paths and environment lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ResolvedConfig::resolve`].
    pub fn resolve_with(
        cli_data_dir: Option<&Path>,
        paths: &AppPaths,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let config_path = env(ENV_CONFIG)
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| paths.config_file(), PathBuf::from);
        let config = Config::load_from(&config_path)?;
        config.validate()?;

        let mut sources = ConfigSources::default();

        let data_dir =
            Self::resolve_data_dir(cli_data_dir, &env, &config, paths, &mut sources.data_dir);
        let discovered_api_ttl =
            Self::resolve_ttl(&env, &config, &mut sources.discovered_api_ttl)?;
        let save_policy = Self::resolve_save_policy(&env, &config, &mut sources.save_policy)?;

        Ok(Self {
            data_dir,
            discovered_api_ttl,
            save_policy,
            log_level: config.logging.level,
            log_format: config.logging.format,
            config_path,
            sources,
        })
    }

    fn resolve_data_dir(
        cli_data_dir: Option<&Path>,
        env: &impl Fn(&str) -> Option<String>,
        config: &Config,
        paths: &AppPaths,
        source: &mut ConfigSource,
    ) -> PathBuf {
        // 1. CLI flag
        if let Some(dir) = cli_data_dir {
            *source = ConfigSource::Cli;
            return dir.to_path_buf();
        }

        // 2. Environment variable
        if let Some(dir) = env(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            *source = ConfigSource::Env;
            return PathBuf::from(dir.trim());
        }

        // 3. Config file
        if let Some(dir) = &config.history.data_dir {
            *source = ConfigSource::ConfigFile;
            return dir.clone();
        }

        // 4. Default
        *source = ConfigSource::Default;
        paths.data.clone()
    }

    fn resolve_ttl(
        env: &impl Fn(&str) -> Option<String>,
        config: &Config,
        source: &mut ConfigSource,
    ) -> Result<Duration> {
        if let Some(raw) = env(ENV_TTL_DAYS) {
            let ttl = raw
                .trim()
                .parse::<u64>()
                .ok()
                .and_then(ttl_from_days)
                .ok_or_else(|| HistoryError::ConfigInvalid {
                    key: ENV_TTL_DAYS.to_string(),
                    value: raw.clone(),
                    message: "expected a positive number of days".to_string(),
                })?;
            *source = ConfigSource::Env;
            return Ok(ttl);
        }

        let days = config.history.discovered_api_ttl_days;
        *source = if days == HistoryConfig::default().discovered_api_ttl_days {
            ConfigSource::Default
        } else {
            ConfigSource::ConfigFile
        };
        // validate() already rejected zero and overflowing values
        Ok(ttl_from_days(days).unwrap_or(DEFAULT_DISCOVERED_API_TTL))
    }

    fn resolve_save_policy(
        env: &impl Fn(&str) -> Option<String>,
        config: &Config,
        source: &mut ConfigSource,
    ) -> Result<SavePolicy> {
        if let Some(raw) = env(ENV_SAVE_FAILURE) {
            let policy = SavePolicy::from_arg(&raw).ok_or_else(|| HistoryError::ConfigInvalid {
                key: ENV_SAVE_FAILURE.to_string(),
                value: raw.clone(),
                message: "expected 'log' or 'propagate'".to_string(),
            })?;
            *source = ConfigSource::Env;
            return Ok(policy);
        }

        let policy = config.history.save_failure;
        *source = if policy == SavePolicy::default() {
            ConfigSource::Default
        } else {
            ConfigSource::ConfigFile
        };
        Ok(policy)
    }

    /// Directory holding the history slot files.
    #[must_use]
    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join("history")
    }

    /// Store options derived from this configuration.
    #[must_use]
    pub const fn history_options(&self) -> HistoryOptions {
        HistoryOptions {
            discovered_api_ttl: self.discovered_api_ttl,
            save_policy: self.save_policy,
        }
    }
}

fn ttl_from_days(days: u64) -> Option<Duration> {
    if days == 0 {
        return None;
    }
    days.checked_mul(SECS_PER_DAY).map(Duration::from_secs)
}

// =============================================================================
// Config File
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// History store settings.
    pub history: HistoryConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// History store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Lifetime of cached discovered APIs, in days.
    pub discovered_api_ttl_days: u64,
    /// What mutations do when persisting fails (`log` or `propagate`).
    pub save_failure: SavePolicy,
    /// Override for the data directory.
    pub data_dir: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level (error, warn, info, debug, trace).
    pub level: Option<String>,
    /// Default log format (human, json, compact).
    pub format: Option<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            discovered_api_ttl_days: DEFAULT_DISCOVERED_API_TTL.as_secs() / SECS_PER_DAY,
            save_failure: SavePolicy::default(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from the default config file path.
    ///
    /// # Errors
    /// Returns an error only if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().config_file())
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error only if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| HistoryError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns an error if the discovered API TTL is zero or too large.
    pub fn validate(&self) -> Result<()> {
        let days = self.history.discovered_api_ttl_days;
        if ttl_from_days(days).is_none() {
            return Err(HistoryError::ConfigInvalid {
                key: "history.discovered_api_ttl_days".to_string(),
                value: days.to_string(),
                message: "must be a positive number of days".to_string(),
            });
        }
        Ok(())
    }
}
