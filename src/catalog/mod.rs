//! Backup catalog
//!
//! The catalog records one document per completed backup and lists them
//! back. It exposes no update or delete: records are never mutated and
//! retention is out of scope.
//!
//! Two stores are provided:
//!
//! - `MongoCatalog`: the `backup.backups` collection on the database server
//! - `FileCatalog`: a local JSON-lines file
//!
//! Listing returns raw documents; callers turn them into typed records with
//! [`crate::models::parse_records`], which reports malformed documents as
//! `CatalogRead` failures.

mod file;
mod mongo;

pub use file::FileCatalog;
pub use mongo::MongoCatalog;

use crate::error::BackupResult;
use crate::models::BackupRecord;

/// Insert/list access to backup metadata
pub trait CatalogStore {
    /// Human-readable location, for logs
    fn describe(&self) -> String;

    /// Append one record; fails with `CatalogWrite`
    fn insert(&self, record: &BackupRecord) -> BackupResult<()>;

    /// All raw records; fails with `CatalogRead`
    fn list_all(&self) -> BackupResult<Vec<serde_json::Value>>;
}
