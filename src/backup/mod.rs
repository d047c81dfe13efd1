//! Backup system for mongo-backup
//!
//! # Architecture
//!
//! - `ArtifactNamer`: logical names and staging paths
//! - `wait_for_stable_file`: waits for a fresh dump archive to settle
//! - `BackupOrchestrator`: runs the backup, restore and query pipelines
//!
//! # Artifacts
//!
//! A backup of database `orders` taken at unix time `1700000000` is staged
//! as `orders-1700000000.gz` by the dump tool, sealed into
//! `orders-1700000000.aes`, and cataloged under the name
//! `orders-1700000000`. Only the encrypted artifact outlives a successful
//! backup.
//!
//! # Example
//!
//! ```rust,ignore
//! use mongo_backup::backup::BackupOrchestrator;
//! use mongo_backup::config::{AppPaths, Settings};
//! use mongo_backup::process::SystemRunner;
//!
//! let paths = AppPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let orchestrator =
//!     BackupOrchestrator::from_settings(&settings, &paths, &conn, Arc::new(SystemRunner::new()));
//!
//! let outcome = orchestrator.backup(&conn)?;
//! println!("{}", outcome.record.path);
//! ```

mod naming;
mod orchestrator;
mod readiness;

pub use naming::{ArtifactNamer, DUMP_EXTENSION, ENCRYPTED_EXTENSION};
pub use orchestrator::{
    BackupOrchestrator, BackupOutcome, OperationFailure, QueryOutcome, RestoreOutcome, Stage,
};
pub use readiness::{wait_for_stable_file, SettlePolicy};
