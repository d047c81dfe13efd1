//! Configuration module for mongo-backup
//!
//! This module provides configuration management including:
//! - home directory resolution
//! - `config.json` settings with defaults for every field

pub mod paths;
pub mod settings;

pub use paths::{AppPaths, HOME_ENV};
pub use settings::{CatalogBackend, CipherBackend, Settings};
