//! Backup catalog record
//!
//! One `BackupRecord` is written per successful backup. The serialized form
//! is a flat document with the fields `name`, `time`, `database`, `path` and
//! `size`, which is also what older catalogs contain.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{BackupError, BackupResult};

/// Bytes per catalog megabyte
pub const BYTES_PER_MEGABYTE: u64 = 1_048_576;

/// Whole megabytes, truncating
pub fn megabytes(bytes: u64) -> u64 {
    bytes / BYTES_PER_MEGABYTE
}

/// Metadata about one completed backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Logical name, `<database>-<unixTimestamp>`
    pub name: String,
    /// Creation time, RFC 3339
    pub time: String,
    /// Source database
    pub database: String,
    /// Path of the encrypted artifact
    pub path: String,
    /// Encrypted artifact size in whole megabytes
    #[serde(deserialize_with = "size_from_number")]
    pub size: u64,
}

impl BackupRecord {
    /// Parse a raw catalog document
    ///
    /// Unknown fields such as `_id` are ignored.
    pub fn from_document(doc: &serde_json::Value) -> BackupResult<Self> {
        serde_json::from_value(doc.clone())
            .map_err(|e| BackupError::CatalogRead(format!("malformed backup record {}: {}", doc, e)))
    }

    /// Creation time, if the stored timestamp parses
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.time).ok()
    }
}

/// Parse every raw document, failing on the first malformed one
pub fn parse_records(docs: &[serde_json::Value]) -> BackupResult<Vec<BackupRecord>> {
    docs.iter().map(BackupRecord::from_document).collect()
}

// Document stores hand integers back as doubles at times; accept any
// non-negative whole number.
fn size_from_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Number::deserialize(deserializer)?;
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        _ => Err(serde::de::Error::custom(format!(
            "size must be a non-negative integer, got {}",
            value
        ))),
    }
}
