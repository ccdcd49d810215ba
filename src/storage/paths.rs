//! Application paths for config and history data.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Application paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Configuration directory.
    pub config: PathBuf,
    /// Data directory (history slots live here).
    pub data: PathBuf,
}

impl AppPaths {
    /// Create paths for the vpnhist application.
    #[must_use]
    pub fn new() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("org", "eduvpn", "vpnhist") {
            Self {
                config: proj_dirs.config_dir().to_path_buf(),
                data: proj_dirs.data_dir().to_path_buf(),
            }
        } else {
            // Fallback to home directory
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            Self {
                config: home.join(".config/vpnhist"),
                data: home.join(".local/share/vpnhist"),
            }
        }
    }

    /// Paths with the data directory replaced.
    #[must_use]
    pub fn with_data_dir(mut self, data: impl AsRef<Path>) -> Self {
        self.data = data.as_ref().to_path_buf();
        self
    }

    /// Path to the config file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Directory holding the history slot files.
    #[must_use]
    pub fn history_dir(&self) -> PathBuf {
        self.data.join("history")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

/// Module-level function for accessing dirs crate.
mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
    }
}
