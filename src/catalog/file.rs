//! Append-only JSON-lines catalog
//!
//! Each line of the catalog file is one complete backup record. Records are
//! appended and flushed immediately; nothing is ever rewritten.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::CatalogStore;
use crate::error::{BackupError, BackupResult};
use crate::models::BackupRecord;

/// Catalog stored in a local JSONL file
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogStore for FileCatalog {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn insert(&self, record: &BackupRecord) -> BackupResult<()> {
        let write_err = |what: &str, e: std::io::Error| {
            BackupError::CatalogWrite(format!("{} {}: {}", what, self.path.display(), e))
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| write_err("failed to create directory for", e))?;
        }

        let json = serde_json::to_string(record)
            .map_err(|e| BackupError::CatalogWrite(format!("failed to serialize record: {}", e)))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| write_err("failed to open", e))?;

        writeln!(file, "{}", json).map_err(|e| write_err("failed to append to", e))?;
        file.flush().map_err(|e| write_err("failed to flush", e))?;

        Ok(())
    }

    fn list_all(&self) -> BackupResult<Vec<serde_json::Value>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).map_err(|e| {
            BackupError::CatalogRead(format!("failed to open {}: {}", self.path.display(), e))
        })?;

        let mut docs = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                BackupError::CatalogRead(format!("failed to read line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let doc = serde_json::from_str(&line).map_err(|e| {
                BackupError::CatalogRead(format!(
                    "invalid JSON at line {} of {}: {}",
                    line_num + 1,
                    self.path.display(),
                    e
                ))
            })?;
            docs.push(doc);
        }

        Ok(docs)
    }
}
