//! Dump and restore through the MongoDB database tools
//!
//! `dump` produces a gzip archive with `mongodump --forceTableScan`.
//! `restore` replays one with `mongorestore --drop`, which drops every
//! collection in the archive from the target before restoring it, and then
//! removes the staged archive.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::{BackupError, BackupResult};
use crate::models::ConnectionSpec;
use crate::process::{CommandLine, ProcessFailure, ProcessRunner};

/// Runs `mongodump` / `mongorestore`
pub struct MongoTools {
    mongodump: String,
    mongorestore: String,
    runner: Arc<dyn ProcessRunner>,
    dump_timeout: Duration,
    restore_timeout: Duration,
}

impl MongoTools {
    pub fn new(
        mongodump: impl Into<String>,
        mongorestore: impl Into<String>,
        runner: Arc<dyn ProcessRunner>,
        dump_timeout: Duration,
        restore_timeout: Duration,
    ) -> Self {
        Self {
            mongodump: mongodump.into(),
            mongorestore: mongorestore.into(),
            runner,
            dump_timeout,
            restore_timeout,
        }
    }

    /// Dump the database behind `conn` into a gzip archive at `output`
    ///
    /// On failure the archive may be absent or partial; the caller discards it.
    pub fn dump(&self, conn: &ConnectionSpec, output: &Path) -> BackupResult<()> {
        info!("Backing up via {}", conn.redacted_uri());

        let cmd = CommandLine::new(&self.mongodump)
            .arg("--forceTableScan")
            .secret_arg(
                format!("--uri={}", conn.uri()),
                format!("--uri={}", conn.redacted_uri()),
            )
            .arg(format!("--archive={}", output.display()))
            .arg("--gzip");

        self.runner
            .run(&cmd, self.dump_timeout)
            .map_err(|e| BackupError::Dump(describe(&e)))?;

        info!("{} dumped successfully", output.display());
        Ok(())
    }

    /// Restore the archive at `archive` into the database behind `conn`,
    /// dropping existing collections first, then delete the archive
    pub fn restore(&self, conn: &ConnectionSpec, archive: &Path) -> BackupResult<()> {
        info!("Restoring {} via {}", archive.display(), conn.redacted_uri());

        let cmd = CommandLine::new(&self.mongorestore)
            .arg("--drop")
            .secret_arg(
                format!("--uri={}", conn.uri()),
                format!("--uri={}", conn.redacted_uri()),
            )
            .arg(format!("--archive={}", archive.display()))
            .arg("--gzip");

        self.runner
            .run(&cmd, self.restore_timeout)
            .map_err(|e| BackupError::Restore(describe(&e)))?;

        info!("{} restored successfully", archive.display());

        fs::remove_file(archive).map_err(|e| BackupError::cleanup(archive, e))
    }
}

fn describe(failure: &ProcessFailure) -> String {
    if failure.is_missing_binary() {
        format!("{} (is {} installed and on PATH?)", failure, failure.program)
    } else {
        failure.to_string()
    }
}
