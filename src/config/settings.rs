//! User settings for mongo-backup
//!
//! Staging directory, timeouts, cipher and catalog backends, and the
//! locations of the external tools. Every field has a default, so a missing
//! or partial `config.json` is valid.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::AppPaths;
use crate::crypto::KeyDerivationParams;
use crate::error::BackupError;

/// Which cipher seals the staged dumps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CipherBackend {
    /// `openssl enc -aes-256-cbc` (default, interoperable with existing artifacts)
    #[default]
    Openssl,
    /// In-process Argon2id + AES-256-GCM
    Native,
}

/// Where backup records are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackend {
    /// A collection on the database server, through `mongosh`
    #[default]
    Mongo,
    /// A local JSON-lines file
    File,
}

/// Per-step time limits in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub dump_secs: u64,
    pub restore_secs: u64,
    pub encrypt_secs: u64,
    pub decrypt_secs: u64,
    pub catalog_secs: u64,
    /// Upper bound on waiting for the dump archive to settle
    pub settle_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            dump_secs: 300,
            restore_secs: 300,
            encrypt_secs: 180,
            decrypt_secs: 300,
            catalog_secs: 30,
            settle_secs: 5,
        }
    }
}

impl Timeouts {
    pub fn dump(&self) -> Duration {
        Duration::from_secs(self.dump_secs)
    }

    pub fn restore(&self) -> Duration {
        Duration::from_secs(self.restore_secs)
    }

    pub fn encrypt(&self) -> Duration {
        Duration::from_secs(self.encrypt_secs)
    }

    pub fn decrypt(&self) -> Duration {
        Duration::from_secs(self.decrypt_secs)
    }

    pub fn catalog(&self) -> Duration {
        Duration::from_secs(self.catalog_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }
}

/// Encryption settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CipherSettings {
    pub backend: CipherBackend,

    /// Argon2id cost parameters for newly sealed native artifacts
    pub key_params: KeyDerivationParams,
}

/// Catalog location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub backend: CatalogBackend,

    /// Database holding the catalog collection
    pub database: String,

    /// Catalog collection name
    pub collection: String,

    /// Catalog file for the file backend (defaults to `<home>/catalog.jsonl`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            backend: CatalogBackend::default(),
            database: "backup".to_string(),
            collection: "backups".to_string(),
            file: None,
        }
    }
}

/// External program names or paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub mongodump: String,
    pub mongorestore: String,
    pub mongosh: String,
    pub openssl: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            mongodump: "mongodump".to_string(),
            mongorestore: "mongorestore".to_string(),
            mongosh: "mongosh".to_string(),
            openssl: "openssl".to_string(),
        }
    }
}

/// User settings for mongo-backup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Directory holding staged dumps and encrypted artifacts
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default)]
    pub cipher: CipherSettings,

    #[serde(default)]
    pub catalog: CatalogSettings,

    #[serde(default)]
    pub tools: ToolPaths,
}

fn default_schema_version() -> u32 {
    1
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            staging_dir: default_staging_dir(),
            timeouts: Timeouts::default(),
            cipher: CipherSettings::default(),
            catalog: CatalogSettings::default(),
            tools: ToolPaths::default(),
        }
    }
}

impl Settings {
    /// Resolved location of the file catalog
    pub fn catalog_file(&self, paths: &AppPaths) -> PathBuf {
        self.catalog
            .file
            .clone()
            .unwrap_or_else(|| paths.catalog_file())
    }

    /// Load settings from disk, or use defaults if the file doesn't exist
    pub fn load_or_create(paths: &AppPaths) -> Result<Self, BackupError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path)
                .map_err(|e| BackupError::Io(format!("Failed to read settings file: {}", e)))?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                BackupError::Config(format!(
                    "Failed to parse settings file {}: {}",
                    settings_path.display(),
                    e
                ))
            })?;

            Ok(settings)
        } else {
            // Not persisted until the caller asks
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &AppPaths) -> Result<(), BackupError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| BackupError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| BackupError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}
