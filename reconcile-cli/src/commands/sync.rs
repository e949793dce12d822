//! `reconcile sync` — run one reconciliation cycle.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use reconcile_core::{SyncTaskMap, TaskState};
use reconcile_sync::pipeline::{self, ProfileSyncResult, SyncScope};

use super::{block_on, home};

/// Arguments for `reconcile sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Name of the profile to sync (omit when using `--all`).
    pub profile: Option<String>,

    /// Sync every registered profile.
    #[arg(long, conflicts_with = "profile")]
    pub all: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let scope = if self.all {
            SyncScope::All
        } else {
            let name = self
                .profile
                .clone()
                .context("provide a profile name or use --all")?;
            SyncScope::Profile(name)
        };

        let results = block_on(pipeline::run(&home, scope, false))?.context("sync failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&results).context("failed to serialize sync JSON")?
            );
        } else {
            if results.is_empty() {
                println!("No profiles registered. Run `reconcile init` first.");
            }
            for result in &results {
                print_result(result);
            }
        }

        let failed: usize = results.iter().map(ProfileSyncResult::failed).sum();
        if failed > 0 {
            bail!("{failed} task(s) failed; they will be retried on the next sync");
        }
        Ok(())
    }
}

fn print_result(result: &ProfileSyncResult) {
    let name = &result.profile;
    if result.tasks.is_empty() {
        println!("✓ '{name}' — nothing to do");
        return;
    }
    let failed = result.failed();
    println!(
        "✓ '{name}' synced ({} resolved, {failed} failed)",
        result.tasks.len() - failed
    );
    print_tasks(&result.tasks);
}

/// One line per task: marker, key, action and, unless successful, state.
pub(crate) fn print_tasks(tasks: &SyncTaskMap) {
    for (key, task) in tasks {
        match task.state {
            TaskState::Success => println!("  {}  {key}  {}", "✓".green(), task.action_type),
            TaskState::Pending => println!("  ~  {key}  {}", task.action_type),
            state => println!(
                "  {}  {key}  {}  ({state})",
                "✗".red(),
                task.action_type
            ),
        }
    }
}
