//! `reconcile plan <name>` — classified tasks, nothing executed.

use anyhow::{Context, Result};
use clap::Args;

use reconcile_sync::pipeline;

use super::{block_on, home, sync::print_tasks};

/// Arguments for `reconcile plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Name of the profile to plan.
    pub profile: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let tasks = block_on(pipeline::plan(&home, &self.profile))?
            .with_context(|| format!("plan failed for '{}'", self.profile))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&tasks).context("failed to serialize plan JSON")?
            );
            return Ok(());
        }

        if tasks.is_empty() {
            println!("[plan] '{}' is in sync", self.profile);
            return Ok(());
        }
        println!("[plan] '{}' — {} task(s)", self.profile, tasks.len());
        print_tasks(&tasks);
        Ok(())
    }
}
