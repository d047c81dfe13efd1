//! mongo-backup - encrypted MongoDB backups with a queryable catalog
//!
//! This library orchestrates three external concerns: the MongoDB dump and
//! restore tools, a symmetric cipher around each dump archive, and a catalog
//! recording which backups exist and where.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `backup`: Artifact naming and the backup/restore/query pipelines
//! - `catalog`: Backup record storage (MongoDB collection or JSONL file)
//! - `cli`: Command handlers for the `mongo-backup` binary
//! - `config`: Configuration and path management
//! - `crypto`: Encryption envelope and cipher backends
//! - `display`: Terminal formatting of catalog records
//! - `engine`: `mongodump` / `mongorestore` invocation
//! - `error`: Custom error types
//! - `models`: Connection parameters and backup records
//! - `process`: External command execution with timeouts
//!
//! # Example
//!
//! ```rust,ignore
//! use mongo_backup::config::{AppPaths, Settings};
//!
//! let paths = AppPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! ```

pub mod backup;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod display;
pub mod engine;
pub mod error;
pub mod models;
pub mod process;

pub use error::{BackupError, BackupResult, FailureKind};
