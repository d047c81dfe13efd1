//! Path management for mongo-backup
//!
//! ## Path Resolution Order
//!
//! 1. `MONGO_BACKUP_HOME` environment variable (if set)
//! 2. The platform configuration directory, e.g. `~/.config/mongo-backup`
//!    on Linux or `%APPDATA%\mongo-backup\config` on Windows

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::BackupError;

/// Environment variable overriding the home directory
pub const HOME_ENV: &str = "MONGO_BACKUP_HOME";

/// Manages all paths used by mongo-backup
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Base directory for configuration and the local catalog
    base_dir: PathBuf,
}

impl AppPaths {
    /// Resolve the home directory
    ///
    /// # Errors
    ///
    /// Returns an error if no platform configuration directory exists.
    pub fn new() -> Result<Self, BackupError> {
        let base_dir = match std::env::var_os(HOME_ENV) {
            Some(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Create AppPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Default location of the file catalog
    pub fn catalog_file(&self) -> PathBuf {
        self.base_dir.join("catalog.jsonl")
    }

    /// Ensure the base directory exists
    pub fn ensure_directories(&self) -> Result<(), BackupError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| BackupError::Io(format!("Failed to create base directory: {}", e)))
    }

    /// Check if a settings file has been written
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

fn resolve_default_path() -> Result<PathBuf, BackupError> {
    ProjectDirs::from("", "", "mongo-backup")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| {
            BackupError::Config(format!(
                "Could not determine a configuration directory; set {}",
                HOME_ENV
            ))
        })
}
