//! Shared sync pipeline entrypoint used by the CLI.
//!
//! Wires a [`SyncProfile`] to concrete collaborators: a [`DirStore`] per
//! side and [`FileSnapshotStorage`] under the same home.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use reconcile_core::profile::{self, SyncProfile};
use reconcile_core::{ProfileName, SyncTaskMap};

use crate::backend::BasicMethods;
use crate::dir_store::DirStore;
use crate::error::SyncError;
use crate::snapshot_store::FileSnapshotStorage;
use crate::strategy::{SyncOptions, SyncStrategy};

/// Scope for a sync pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// Sync every registered profile.
    All,
    /// Sync a single named profile.
    Profile(String),
}

/// Outcome of running one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSyncResult {
    pub profile: ProfileName,
    pub dry_run: bool,
    pub tasks: SyncTaskMap,
}

impl ProfileSyncResult {
    /// Tasks that ended in a failure state.
    pub fn failed(&self) -> usize {
        self.tasks.values().filter(|t| t.state.is_failure()).count()
    }
}

/// Build the orchestrator for `profile`.
pub fn strategy_for(home: &Path, profile: &SyncProfile) -> SyncStrategy {
    let keys = profile.abstract_key.clone();
    let local = Arc::new(DirStore::new(&profile.local_dir, keys.clone()));
    let cloud = Arc::new(DirStore::new(&profile.cloud_dir, keys.clone()));
    let storage = Arc::new(FileSnapshotStorage::new(home, profile.store_id()));

    let methods = BasicMethods::<Value> {
        local: local.clone(),
        cloud: cloud.clone(),
    };
    SyncStrategy::new(
        SyncOptions::new(local, cloud, storage)
            .with_basic_methods(methods)
            .with_abstract_key(keys)
            .with_lock_resolving(Duration::from_millis(profile.lock_resolving_ms)),
    )
}

/// Run the sync pipeline for a scope. `dry_run` classifies without
/// executing.
pub async fn run(
    home: &Path,
    scope: SyncScope,
    dry_run: bool,
) -> Result<Vec<ProfileSyncResult>, SyncError> {
    let profiles = match scope {
        SyncScope::All => profile::list_at(home)?,
        SyncScope::Profile(name) => vec![profile::load_at(home, &ProfileName::from(name))?],
    };

    let mut results = Vec::with_capacity(profiles.len());
    for profile in profiles {
        let strategy = strategy_for(home, &profile);
        let tasks = if dry_run {
            strategy.plan().await?
        } else {
            strategy.sync().await?
        };
        tracing::info!(profile = %profile.name, tasks = tasks.len(), dry_run, "profile processed");
        results.push(ProfileSyncResult {
            profile: profile.name,
            dry_run,
            tasks,
        });
    }
    Ok(results)
}

/// Classify one profile without executing anything.
pub async fn plan(home: &Path, name: &str) -> Result<SyncTaskMap, SyncError> {
    let profile = profile::load_at(home, &ProfileName::from(name))?;
    strategy_for(home, &profile).plan().await
}
