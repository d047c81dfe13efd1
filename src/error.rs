//! Error types for mongo-backup
//!
//! Every pipeline step reports one of the variants below. Components never
//! abort the process; the orchestrator and `main` decide what is fatal.

use thiserror::Error;

/// The main error type for backup, restore and query operations
#[derive(Error, Debug)]
pub enum BackupError {
    /// The dump tool failed or the staged archive could not be prepared
    #[error("Dump failed: {0}")]
    Dump(String),

    /// The restore tool failed; the target database was not confirmed restored
    #[error("Restore failed: {0}")]
    Restore(String),

    /// The cipher could not produce an encrypted artifact
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Wrong passphrase or corrupted artifact
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// The catalog rejected a record
    #[error("Catalog write failed: {0}")]
    CatalogWrite(String),

    /// The catalog could not be read or returned malformed records
    #[error("Catalog read failed: {0}")]
    CatalogRead(String),

    /// The primary operation succeeded but a staged file was left behind
    #[error("Cleanup of {path} failed: {reason}")]
    Cleanup { path: String, reason: String },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Invalid input such as a malformed backup name
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Coarse classification of a [`BackupError`], used when reporting which
/// kind of failure ended an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Dump,
    Restore,
    Encryption,
    Decryption,
    CatalogWrite,
    CatalogRead,
    Cleanup,
    Config,
    Io,
    Json,
    Validation,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Dump => "DumpFailure",
            Self::Restore => "RestoreFailure",
            Self::Encryption => "EncryptionFailure",
            Self::Decryption => "DecryptionFailure",
            Self::CatalogWrite => "CatalogWriteFailure",
            Self::CatalogRead => "CatalogReadFailure",
            Self::Cleanup => "CleanupFailure",
            Self::Config => "ConfigFailure",
            Self::Io => "IoFailure",
            Self::Json => "JsonFailure",
            Self::Validation => "ValidationFailure",
        };
        f.write_str(label)
    }
}

impl BackupError {
    /// Create a cleanup error for a path that could not be removed
    pub fn cleanup(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        Self::Cleanup {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Dump(_) => FailureKind::Dump,
            Self::Restore(_) => FailureKind::Restore,
            Self::Encryption(_) => FailureKind::Encryption,
            Self::Decryption(_) => FailureKind::Decryption,
            Self::CatalogWrite(_) => FailureKind::CatalogWrite,
            Self::CatalogRead(_) => FailureKind::CatalogRead,
            Self::Cleanup { .. } => FailureKind::Cleanup,
            Self::Config(_) => FailureKind::Config,
            Self::Io(_) => FailureKind::Io,
            Self::Json(_) => FailureKind::Json,
            Self::Validation(_) => FailureKind::Validation,
        }
    }

    /// Cleanup failures leave data intact and are reported as warnings
    pub fn is_cleanup(&self) -> bool {
        matches!(self, Self::Cleanup { .. })
    }
}

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for mongo-backup operations
pub type BackupResult<T> = Result<T, BackupError>;
