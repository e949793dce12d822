//! `reconcile profile list`

use anyhow::{Context, Result};
use clap::Subcommand;

use reconcile_core::profile;

/// Manage registered sync profiles.
#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// List all registered profiles.
    List,
}

pub fn run(cmd: ProfileCommand) -> Result<()> {
    match cmd {
        ProfileCommand::List => list(),
    }
}

fn list() -> Result<()> {
    let profiles = profile::list().context("failed to load profiles")?;

    if profiles.is_empty() {
        println!("No profiles registered.");
        println!("Run: reconcile init <name> --local <dir> --cloud <dir>");
        return Ok(());
    }

    for p in &profiles {
        println!("{}", p.name);
        println!("  local: {}", p.local_dir.display());
        println!("  cloud: {}", p.cloud_dir.display());
        println!(
            "  keys:  id={} time={}  lock={}ms",
            p.abstract_key.unique_key, p.abstract_key.time_key, p.lock_resolving_ms
        );
    }
    Ok(())
}
