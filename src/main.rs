use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mongo_backup::backup::BackupOrchestrator;
use mongo_backup::cli::{
    handle_config_command, handle_dump_command, handle_query_command, handle_restore_command,
    print_restore_warning, ConnectionArgs, QueryArgs,
};
use mongo_backup::config::{AppPaths, Settings};
use mongo_backup::process::SystemRunner;

#[derive(Parser)]
#[command(
    name = "mongo-backup",
    author = "Kaylee Beyene",
    version,
    about = "Encrypted MongoDB backups with a queryable catalog",
    long_about = "mongo-backup dumps a MongoDB database with mongodump, encrypts the \
                  archive, and records it in a catalog. Backups can be listed and \
                  restored by name."
)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up --db, encrypt the archive and catalog it
    #[command(alias = "backup")]
    Dump,

    /// Restore a backup by name, dropping the collections it contains first
    Restore {
        /// Backup name, e.g. orders-1700000000
        name: String,

        /// Actually run the restore
        #[arg(short, long)]
        force: bool,
    },

    /// List cataloged backups
    #[command(alias = "list")]
    Query(QueryArgs),

    /// Show current configuration and paths
    Config,
}

impl Commands {
    fn label(&self) -> &'static str {
        match self {
            Commands::Dump => "dump",
            Commands::Restore { .. } => "restore",
            Commands::Query(_) => "query",
            Commands::Config => "config",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let paths = AppPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;
    let runner = Arc::new(SystemRunner::new());
    let label = cli.command.label();

    match &cli.command {
        Commands::Config => {
            handle_config_command(&paths, &settings)?;
        }
        Commands::Dump => {
            let conn = cli.connection.connect(None)?;
            let orchestrator = BackupOrchestrator::from_settings(&settings, &paths, &conn, runner);
            handle_dump_command(&orchestrator, &conn)?;
        }
        Commands::Restore { name, force } => {
            let conn = cli.connection.connect(Some(name.clone()))?;
            if !force {
                return print_restore_warning(name, &conn);
            }
            let orchestrator = BackupOrchestrator::from_settings(&settings, &paths, &conn, runner);
            handle_restore_command(&orchestrator, &conn)?;
        }
        Commands::Query(args) => {
            let conn = cli.connection.connect(None)?;
            let orchestrator = BackupOrchestrator::from_settings(&settings, &paths, &conn, runner);
            handle_query_command(&orchestrator, &conn, args)?;
        }
    }

    println!("The {} command has completed.", label);
    Ok(())
}

/// Initialize tracing with appropriate verbosity
///
/// Logs go to stderr so table and JSON output on stdout stay clean.
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
