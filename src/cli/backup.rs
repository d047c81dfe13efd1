//! Backup CLI commands
//!
//! Implements the `dump`, `restore` and `query` commands on top of the
//! backup orchestrator.

use anyhow::Result;
use clap::Args;

use crate::backup::{ArtifactNamer, BackupOrchestrator};
use crate::display::{format_record_count, format_record_details, format_record_json, format_record_list};
use crate::error::BackupError;
use crate::models::ConnectionSpec;

/// Options for `query`
#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// List backups of every database, not just --db
    #[arg(short, long)]
    pub all: bool,

    /// Print records as JSON
    #[arg(long)]
    pub json: bool,
}

/// Back up the database behind `conn`
pub fn handle_dump_command(orchestrator: &BackupOrchestrator, conn: &ConnectionSpec) -> Result<()> {
    println!("Backing up {}...", conn.require_database()?);

    let outcome = orchestrator.backup(conn)?;
    print_warnings(&outcome.warnings);

    println!("Backup created!");
    print!("{}", format_record_details(&outcome.record));
    Ok(())
}

/// Explain what a forced restore would do, without doing it
pub fn print_restore_warning(name: &str, conn: &ConnectionSpec) -> Result<()> {
    let database = ArtifactNamer::validate(name)?;

    println!("WARNING: This will DROP every collection in '{}' that the backup contains", database);
    println!("and replace it with the contents of {}.", name);
    println!("To proceed, run again with --force flag:");
    println!("  mongo-backup restore {} --db {} --force", name, database);
    if !conn.database().is_empty() && conn.database() != database {
        println!();
        println!(
            "Note: --db is '{}', but this backup belongs to '{}'.",
            conn.database(),
            database
        );
    }
    Ok(())
}

/// Restore the backup named in `conn`
pub fn handle_restore_command(orchestrator: &BackupOrchestrator, conn: &ConnectionSpec) -> Result<()> {
    println!("Restoring {}...", conn.backup_name().unwrap_or_default());

    let outcome = orchestrator.restore(conn)?;
    print_warnings(&outcome.warnings);

    println!("Restore complete: {}", outcome.name);
    Ok(())
}

/// List cataloged backups
pub fn handle_query_command(
    orchestrator: &BackupOrchestrator,
    conn: &ConnectionSpec,
    args: &QueryArgs,
) -> Result<()> {
    let filter = if args.all || conn.database().is_empty() {
        None
    } else {
        Some(conn.database())
    };

    let outcome = orchestrator.query(filter)?;

    if args.json {
        println!("{}", format_record_json(&outcome.records)?);
    } else {
        println!("{}", format_record_list(&outcome.records));
    }
    println!();
    println!("{}", format_record_count(outcome.count()));
    Ok(())
}

fn print_warnings(warnings: &[BackupError]) {
    for warning in warnings {
        println!("Warning: {}", warning);
    }
}
