//! Artifact naming
//!
//! A backup of database `orders` taken at unix time `1700000000` is called
//! `orders-1700000000`; its plaintext dump is staged as
//! `<staging>/orders-1700000000.gz` and its encrypted artifact as
//! `<staging>/orders-1700000000.aes`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{BackupError, BackupResult};

/// Extension of the plaintext (gzip) dump archive
pub const DUMP_EXTENSION: &str = "gz";

/// Extension of the encrypted artifact
pub const ENCRYPTED_EXTENSION: &str = "aes";

/// Derives logical names and staging paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNamer {
    staging_dir: PathBuf,
}

impl ArtifactNamer {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Logical name for a backup of `database` created at `instant`
    pub fn name(database: &str, instant: DateTime<Utc>) -> String {
        format!("{}-{}", database, instant.timestamp())
    }

    /// Path of the plaintext dump for a logical name
    pub fn dump_path(&self, name: &str) -> PathBuf {
        self.staging_dir
            .join(format!("{}.{}", name, DUMP_EXTENSION))
    }

    /// Path of the encrypted artifact for a logical name
    pub fn encrypted_path(&self, name: &str) -> PathBuf {
        self.staging_dir
            .join(format!("{}.{}", name, ENCRYPTED_EXTENSION))
    }

    /// Check an operator-supplied name and return its database part
    ///
    /// Rejects anything that is not `<database>-<digits>` or that could
    /// address a file outside the staging directory.
    pub fn validate(name: &str) -> BackupResult<&str> {
        let invalid = |why: &str| {
            BackupError::Validation(format!("invalid backup name '{}': {}", name, why))
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.contains(['/', '\\']) || name.contains("..") {
            return Err(invalid("name must not contain path components"));
        }

        let (database, timestamp) = name
            .rsplit_once('-')
            .ok_or_else(|| invalid("expected <database>-<timestamp>"))?;
        if database.is_empty() {
            return Err(invalid("database part is empty"));
        }
        if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("timestamp part must be a unix timestamp"));
        }

        Ok(database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_orders_scenario() {
        let instant = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let namer = ArtifactNamer::new("/tmp");

        let name = ArtifactNamer::name("orders", instant);
        assert_eq!(name, "orders-1700000000");
        assert_eq!(namer.dump_path(&name), PathBuf::from("/tmp/orders-1700000000.gz"));
        assert_eq!(
            namer.encrypted_path(&name),
            PathBuf::from("/tmp/orders-1700000000.aes")
        );
    }

    #[test]
    fn test_name_is_deterministic() {
        let instant = Utc.timestamp_opt(1_600_000_000, 999_000_000).unwrap();
        assert_eq!(
            ArtifactNamer::name("users", instant),
            ArtifactNamer::name("users", instant)
        );
        // Sub-second precision does not leak into the name
        assert_eq!(ArtifactNamer::name("users", instant), "users-1600000000");
    }

    #[test]
    fn test_paths_differ_only_by_extension() {
        let namer = ArtifactNamer::new("/var/staging");
        let dump = namer.dump_path("a-1");
        let sealed = namer.encrypted_path("a-1");
        assert_eq!(dump.parent(), sealed.parent());
        assert_eq!(dump.file_stem(), sealed.file_stem());
        assert_ne!(dump, sealed);
    }

    #[test]
    fn test_validate_accepts_generated_names() {
        assert_eq!(ArtifactNamer::validate("orders-1700000000").unwrap(), "orders");
        assert_eq!(
            ArtifactNamer::validate("my-shop-db-1700000000").unwrap(),
            "my-shop-db"
        );
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        for bad in [
            "",
            "orders",
            "-1700000000",
            "orders-",
            "orders-17000x",
            "../etc/passwd-1",
            "a/b-1",
            "orders-1700000000.aes",
        ] {
            assert!(ArtifactNamer::validate(bad).is_err(), "accepted {:?}", bad);
        }
    }
}
