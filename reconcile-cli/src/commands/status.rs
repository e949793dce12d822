//! `reconcile status` — last-sync visibility across profiles.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use reconcile_core::profile::{self, SyncProfile};
use reconcile_core::Side;
use reconcile_sync::snapshot_store;

use super::home;

/// Arguments for `reconcile status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let profiles = profile::list_at(&home).context("failed to load profiles")?;
        let rows = profiles
            .iter()
            .map(|p| profile_status(&home, p))
            .collect::<Result<Vec<_>>>()?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(rows);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
struct ProfileStatus {
    profile: String,
    local_dir: String,
    cloud_dir: String,
    last_sync_at: Option<DateTime<Utc>>,
    last_sync_age: String,
    local_entries: usize,
    cloud_entries: usize,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "profile")]
    profile: String,
    #[tabled(rename = "last sync")]
    last_sync: String,
    #[tabled(rename = "local")]
    local: String,
    #[tabled(rename = "cloud")]
    cloud: String,
}

fn profile_status(home: &Path, profile: &SyncProfile) -> Result<ProfileStatus> {
    let load = |side: Side| {
        let key = side.cache_key(profile.store_id());
        snapshot_store::load_at(home, &key)
            .with_context(|| format!("failed to load cached snapshot '{key}'"))
    };
    let local = load(Side::Local)?;
    let cloud = load(Side::Cloud)?;

    let last_sync_at = local
        .iter()
        .chain(cloud.iter())
        .map(|file| file.synced_at)
        .max();
    let last_sync_age = last_sync_at
        .map(format_datetime_age)
        .unwrap_or_else(|| "never".to_string());

    Ok(ProfileStatus {
        profile: profile.name.0.clone(),
        local_dir: profile.local_dir.display().to_string(),
        cloud_dir: profile.cloud_dir.display().to_string(),
        last_sync_at,
        last_sync_age,
        local_entries: local.map(|f| f.entries.len()).unwrap_or(0),
        cloud_entries: cloud.map(|f| f.entries.len()).unwrap_or(0),
    })
}

fn print_table(rows: Vec<ProfileStatus>) {
    let never = rows.iter().filter(|r| r.last_sync_at.is_none()).count();
    println!(
        "Reconcile v{} | {} profiles | {} never synced",
        env!("CARGO_PKG_VERSION"),
        rows.len(),
        never,
    );

    if rows.is_empty() {
        println!("No profiles registered.");
        return;
    }

    let table_rows: Vec<StatusTableRow> = rows
        .into_iter()
        .map(|row| StatusTableRow {
            profile: row.profile.bold().to_string(),
            last_sync: if row.last_sync_at.is_some() {
                row.last_sync_age
            } else {
                row.last_sync_age.bright_black().to_string()
            },
            local: format!("{} ({} cached)", row.local_dir, row.local_entries),
            cloud: format!("{} ({} cached)", row.cloud_dir, row.cloud_entries),
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");

    if never > 0 {
        println!("Run 'reconcile sync --all' to reconcile every profile.");
    }
}

fn format_datetime_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    if seconds < 60 {
        return format!("{seconds}s ago");
    }
    if seconds < 60 * 60 {
        return format!("{}m ago", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h ago", seconds / (60 * 60));
    }
    format!("{}d ago", seconds / (60 * 60 * 24))
}
