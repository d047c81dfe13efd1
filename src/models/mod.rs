//! Core data models for mongo-backup
//!
//! Connection parameters for one invocation and the catalog record written
//! for each completed backup.

pub mod connection;
pub mod record;

pub use connection::{ConnectionParams, ConnectionSpec, DEFAULT_PORT};
pub use record::{megabytes, parse_records, BackupRecord, BYTES_PER_MEGABYTE};
