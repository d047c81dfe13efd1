//! CLI command handlers
//!
//! This module contains the implementation of CLI commands, bridging the
//! clap argument parsing with the backup pipelines.

pub mod backup;
pub mod config;
pub mod connection;

pub use backup::{
    handle_dump_command, handle_query_command, handle_restore_command, print_restore_warning,
    QueryArgs,
};
pub use config::handle_config_command;
pub use connection::ConnectionArgs;
