//! Backup, restore and query pipelines
//!
//! Each operation walks a fixed sequence of stages and stops at the first
//! terminal failure, reporting the stage it reached. Only cleanup failures
//! are downgraded to warnings; everything else ends the operation.
//!
//! ```text
//! backup:  Idle -> Dumping -> Settling -> Encrypting -> Cataloging -> Done
//! restore: Idle -> Decrypting -> Restoring -> Done
//! query:   Idle -> Querying -> Done
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use super::naming::ArtifactNamer;
use super::readiness::{wait_for_stable_file, SettlePolicy};
use crate::catalog::{CatalogStore, FileCatalog, MongoCatalog};
use crate::config::{AppPaths, CatalogBackend, CipherBackend, Settings};
use crate::crypto::{Cipher, EncryptionEnvelope, NativeCipher, OpensslCipher};
use crate::engine::MongoTools;
use crate::error::{BackupError, FailureKind};
use crate::models::{megabytes, parse_records, BackupRecord, ConnectionSpec};
use crate::process::ProcessRunner;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Dumping,
    Settling,
    Encrypting,
    Cataloging,
    Decrypting,
    Restoring,
    Querying,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Dumping => "dumping",
            Self::Settling => "settling",
            Self::Encrypting => "encrypting",
            Self::Cataloging => "cataloging",
            Self::Decrypting => "decrypting",
            Self::Restoring => "restoring",
            Self::Querying => "querying",
            Self::Done => "done",
        };
        f.write_str(label)
    }
}

/// A terminal failure and the stage at which it happened
#[derive(Debug, Error)]
#[error("{kind} while {stage}: {source}")]
pub struct OperationFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    #[source]
    pub source: BackupError,
}

impl OperationFailure {
    pub fn new(stage: Stage, source: BackupError) -> Self {
        Self {
            stage,
            kind: source.kind(),
            source,
        }
    }
}

/// Result of a successful backup
#[derive(Debug)]
pub struct BackupOutcome {
    /// The record inserted into the catalog
    pub record: BackupRecord,
    /// Non-fatal cleanup problems
    pub warnings: Vec<BackupError>,
}

/// Result of a successful restore
#[derive(Debug)]
pub struct RestoreOutcome {
    pub name: String,
    pub warnings: Vec<BackupError>,
}

/// Result of a catalog query
#[derive(Debug, Default)]
pub struct QueryOutcome {
    pub records: Vec<BackupRecord>,
}

impl QueryOutcome {
    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Tracks and logs the current stage of one operation
struct StageTracker {
    operation: &'static str,
    current: Stage,
}

impl StageTracker {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            current: Stage::Idle,
        }
    }

    fn enter(&mut self, stage: Stage) {
        info!(operation = self.operation, from = %self.current, stage = %stage, "Stage transition");
        self.current = stage;
    }

    fn fail(&self, source: BackupError) -> OperationFailure {
        error!(
            operation = self.operation,
            stage = %self.current,
            kind = %source.kind(),
            "{}",
            source
        );
        OperationFailure::new(self.current, source)
    }
}

/// Coordinates the dump tool, the encryption envelope and the catalog
pub struct BackupOrchestrator {
    tools: MongoTools,
    envelope: EncryptionEnvelope,
    catalog: Box<dyn CatalogStore>,
    settle: SettlePolicy,
}

impl BackupOrchestrator {
    pub fn new(
        tools: MongoTools,
        envelope: EncryptionEnvelope,
        catalog: Box<dyn CatalogStore>,
        settle: SettlePolicy,
    ) -> Self {
        Self {
            tools,
            envelope,
            catalog,
            settle,
        }
    }

    /// Wire up every component from the user's settings
    pub fn from_settings(
        settings: &Settings,
        paths: &AppPaths,
        conn: &ConnectionSpec,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        let timeouts = &settings.timeouts;
        let tools = MongoTools::new(
            settings.tools.mongodump.as_str(),
            settings.tools.mongorestore.as_str(),
            Arc::clone(&runner),
            timeouts.dump(),
            timeouts.restore(),
        );

        let cipher: Box<dyn Cipher> = match settings.cipher.backend {
            CipherBackend::Openssl => Box::new(OpensslCipher::new(
                settings.tools.openssl.as_str(),
                Arc::clone(&runner),
                timeouts.encrypt(),
                timeouts.decrypt(),
            )),
            CipherBackend::Native => Box::new(NativeCipher::new(settings.cipher.key_params)),
        };
        let envelope = EncryptionEnvelope::new(ArtifactNamer::new(settings.staging_dir.clone()), cipher);

        let catalog: Box<dyn CatalogStore> = match settings.catalog.backend {
            CatalogBackend::Mongo => Box::new(MongoCatalog::new(
                settings.tools.mongosh.as_str(),
                runner,
                conn,
                settings.catalog.database.as_str(),
                settings.catalog.collection.as_str(),
                timeouts.catalog(),
            )),
            CatalogBackend::File => Box::new(FileCatalog::new(settings.catalog_file(paths))),
        };

        let settle = SettlePolicy {
            timeout: timeouts.settle(),
            ..SettlePolicy::default()
        };

        Self::new(tools, envelope, catalog, settle)
    }

    pub fn namer(&self) -> &ArtifactNamer {
        self.envelope.namer()
    }

    /// Back up the database behind `conn`, named after the current time
    pub fn backup(&self, conn: &ConnectionSpec) -> Result<BackupOutcome, OperationFailure> {
        self.backup_at(conn, Utc::now())
    }

    /// Back up the database behind `conn`, named after `now`
    pub fn backup_at(
        &self,
        conn: &ConnectionSpec,
        now: DateTime<Utc>,
    ) -> Result<BackupOutcome, OperationFailure> {
        let mut stage = StageTracker::new("backup");
        let database = conn.require_database().map_err(|e| stage.fail(e))?;
        if conn.password().is_empty() {
            return Err(stage.fail(BackupError::Validation(
                "a password is required to encrypt the backup (--pass or MONGO_PASSWORD)".into(),
            )));
        }

        let name = ArtifactNamer::name(database, now);
        let dump_path = self.namer().dump_path(&name);
        let sealed_path = self.namer().encrypted_path(&name);

        stage.enter(Stage::Dumping);
        for staged in [&dump_path, &sealed_path] {
            if staged.exists() {
                return Err(stage.fail(BackupError::Dump(format!(
                    "{} already exists; refusing to overwrite",
                    staged.display()
                ))));
            }
        }

        if let Err(e) = self.tools.dump(conn, &dump_path) {
            discard(&dump_path);
            return Err(stage.fail(e));
        }

        stage.enter(Stage::Settling);
        if let Err(e) = wait_for_stable_file(&dump_path, &self.settle) {
            discard(&dump_path);
            return Err(stage.fail(e));
        }

        stage.enter(Stage::Encrypting);
        let mut warnings = Vec::new();
        match self.envelope.seal(&name, conn.password().as_str()) {
            Ok(()) => {}
            Err(e) if e.is_cleanup() => {
                warn!(backup = %name, "{}", e);
                warnings.push(e);
            }
            Err(e) => return Err(stage.fail(e)),
        }

        let bytes = fs::metadata(&sealed_path)
            .map(|m| m.len())
            .map_err(|e| {
                stage.fail(BackupError::Encryption(format!(
                    "encrypted artifact {} is unreadable: {}",
                    sealed_path.display(),
                    e
                )))
            })?;

        let record = BackupRecord {
            name: name.clone(),
            time: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            database: database.to_string(),
            path: sealed_path.display().to_string(),
            size: megabytes(bytes),
        };

        stage.enter(Stage::Cataloging);
        if let Err(e) = self.catalog.insert(&record) {
            let e = match e {
                BackupError::CatalogWrite(reason) => BackupError::CatalogWrite(format!(
                    "{}; artifact {} exists but is not cataloged",
                    reason, record.path
                )),
                other => other,
            };
            return Err(stage.fail(e));
        }

        info!(backup = %name, catalog = %self.catalog.describe(), size_mb = record.size, "Backup cataloged");
        stage.enter(Stage::Done);
        Ok(BackupOutcome { record, warnings })
    }

    /// Restore the backup named in `conn` into its database
    ///
    /// Existing collections contained in the archive are dropped first.
    pub fn restore(&self, conn: &ConnectionSpec) -> Result<RestoreOutcome, OperationFailure> {
        let mut stage = StageTracker::new("restore");

        let name = conn.backup_name().ok_or_else(|| {
            stage.fail(BackupError::Validation(
                "a backup name is required for restore".into(),
            ))
        })?;
        let owner = ArtifactNamer::validate(name).map_err(|e| stage.fail(e))?;
        let database = conn.require_database().map_err(|e| stage.fail(e))?;
        if owner != database {
            return Err(stage.fail(BackupError::Validation(format!(
                "backup '{}' belongs to database '{}', not '{}'",
                name, owner, database
            ))));
        }

        stage.enter(Stage::Decrypting);
        self.envelope
            .open(name, conn.password().as_str())
            .map_err(|e| stage.fail(e))?;

        stage.enter(Stage::Restoring);
        let archive = self.namer().dump_path(name);
        let mut warnings = Vec::new();
        match self.tools.restore(conn, &archive) {
            Ok(()) => {}
            Err(e) if e.is_cleanup() => {
                warn!(backup = name, "{}", e);
                warnings.push(e);
            }
            Err(e) => {
                discard(&archive);
                return Err(stage.fail(e));
            }
        }

        stage.enter(Stage::Done);
        Ok(RestoreOutcome {
            name: name.to_string(),
            warnings,
        })
    }

    /// List cataloged backups, optionally only those of one database
    pub fn query(&self, database: Option<&str>) -> Result<QueryOutcome, OperationFailure> {
        let mut stage = StageTracker::new("query");
        stage.enter(Stage::Querying);

        let docs = self.catalog.list_all().map_err(|e| stage.fail(e))?;
        let mut records = parse_records(&docs).map_err(|e| stage.fail(e))?;
        if let Some(database) = database {
            records.retain(|r| r.database == database);
        }

        stage.enter(Stage::Done);
        Ok(QueryOutcome { records })
    }
}

fn discard(path: &Path) {
    if path.exists() {
        match fs::remove_file(path) {
            Ok(()) => info!(path = %path.display(), "Removed staged file"),
            Err(e) => warn!(path = %path.display(), error = %e, "Could not remove staged file"),
        }
    }
}
