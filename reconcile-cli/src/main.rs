//! Reconcile — two-sided record sync CLI.
//!
//! # Usage
//!
//! ```text
//! reconcile init <name> --local <dir> --cloud <dir> [--lock-ms N] [--time-key K] [--unique-key K]
//! reconcile profile list
//! reconcile plan <name> [--json]
//! reconcile sync <name> [--json]
//! reconcile sync --all [--json]
//! reconcile status [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    init::InitArgs, plan::PlanArgs, profile::ProfileCommand, status::StatusArgs, sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "reconcile",
    version,
    about = "Reconcile records between a local store and a cloud store",
    long_about = None,
)]
struct Cli {
    /// Log engine activity to stderr (debug level).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a sync profile pairing a local and a cloud directory.
    Init(InitArgs),

    /// Manage registered sync profiles.
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// Show the tasks the next sync would run, without running them.
    Plan(PlanArgs),

    /// Run one reconciliation cycle for a profile.
    Sync(SyncArgs),

    /// Show last-sync state across registered profiles.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Profile { command } => commands::profile::run(command),
        Commands::Plan(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}
