//! Catalog stored in a MongoDB collection
//!
//! Talks to the server through `mongosh --eval`, reusing the connection
//! URI of the invocation. Records live in the `backups` collection of the
//! `backup` database unless configured otherwise.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::CatalogStore;
use crate::crypto::SecureString;
use crate::error::{BackupError, BackupResult};
use crate::models::{BackupRecord, ConnectionSpec};
use crate::process::{CommandLine, ProcessRunner};

/// Catalog collection accessed through the MongoDB shell
pub struct MongoCatalog {
    mongosh: String,
    runner: Arc<dyn ProcessRunner>,
    uri: SecureString,
    redacted_uri: String,
    database: String,
    collection: String,
    timeout: Duration,
}

impl MongoCatalog {
    pub fn new(
        mongosh: impl Into<String>,
        runner: Arc<dyn ProcessRunner>,
        conn: &ConnectionSpec,
        database: impl Into<String>,
        collection: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            mongosh: mongosh.into(),
            runner,
            uri: SecureString::new(conn.uri()),
            redacted_uri: conn.redacted_uri().to_string(),
            database: database.into(),
            collection: collection.into(),
            timeout,
        }
    }

    /// JavaScript expression selecting the catalog collection
    fn collection_expr(&self) -> BackupResult<String> {
        // JSON string literals are valid JavaScript string literals
        Ok(format!(
            "db.getSiblingDB({}).getCollection({})",
            serde_json::to_string(&self.database)?,
            serde_json::to_string(&self.collection)?
        ))
    }

    fn eval(&self, script: &str) -> Result<String, crate::process::ProcessFailure> {
        let cmd = CommandLine::new(&self.mongosh)
            .secret_arg(self.uri.as_str(), self.redacted_uri.as_str())
            .args(["--quiet", "--eval", script]);
        self.runner.run(&cmd, self.timeout)
    }
}

impl CatalogStore for MongoCatalog {
    fn describe(&self) -> String {
        format!("mongodb {}.{}", self.database, self.collection)
    }

    fn insert(&self, record: &BackupRecord) -> BackupResult<()> {
        let script = format!(
            "{}.insertOne({})",
            self.collection_expr()
                .map_err(|e| BackupError::CatalogWrite(e.to_string()))?,
            serde_json::to_string(record)
                .map_err(|e| BackupError::CatalogWrite(e.to_string()))?
        );

        let out = self
            .eval(&script)
            .map_err(|e| BackupError::CatalogWrite(e.to_string()))?;
        debug!(output = out.trim(), "Catalog insert acknowledged");
        Ok(())
    }

    fn list_all(&self) -> BackupResult<Vec<serde_json::Value>> {
        let script = format!(
            "print(EJSON.stringify({}.find({{}}, {{_id: 0}}).toArray(), {{relaxed: true}}))",
            self.collection_expr()
                .map_err(|e| BackupError::CatalogRead(e.to_string()))?
        );

        let out = self
            .eval(&script)
            .map_err(|e| BackupError::CatalogRead(e.to_string()))?;

        parse_listing(&out)
    }
}

/// Extract the JSON array printed by the listing script
///
/// The shell may print warnings before the result, so the last line that
/// looks like an array is used.
fn parse_listing(output: &str) -> BackupResult<Vec<serde_json::Value>> {
    let line = output
        .lines()
        .map(str::trim)
        .rev()
        .find(|l| l.starts_with('['))
        .ok_or_else(|| {
            BackupError::CatalogRead(format!("unexpected catalog output: {}", output.trim()))
        })?;

    serde_json::from_str(line)
        .map_err(|e| BackupError::CatalogRead(format!("invalid catalog listing: {}", e)))
}
