//! `reconcile init <name> --local <dir> --cloud <dir> [...]`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use reconcile_core::{profile, AbstractKey, ProfileName};

/// Register a sync profile.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Profile name; also partitions the cached snapshots.
    pub name: String,

    /// Directory holding the local records (`<id>.json`). Created if missing.
    #[arg(long)]
    pub local: PathBuf,

    /// Directory holding the cloud records (`<id>.json`). Created if missing.
    #[arg(long)]
    pub cloud: PathBuf,

    /// Lock window in milliseconds; busy retries fire after half of it.
    #[arg(long = "lock-ms", value_name = "MS")]
    pub lock_ms: Option<u64>,

    /// Record field holding the last update time (dot path).
    #[arg(long, value_name = "PATH")]
    pub time_key: Option<String>,

    /// Record field holding the unique id (dot path).
    #[arg(long, value_name = "PATH")]
    pub unique_key: Option<String>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let local = resolve_dir(&self.local)?;
        let cloud = resolve_dir(&self.cloud)?;

        let abstract_key = if self.time_key.is_some() || self.unique_key.is_some() {
            let defaults = AbstractKey::default();
            Some(AbstractKey {
                time_key: self.time_key.unwrap_or(defaults.time_key),
                unique_key: self.unique_key.unwrap_or(defaults.unique_key),
            })
        } else {
            None
        };

        let profile = profile::init(
            ProfileName::from(self.name.clone()),
            local,
            cloud,
            self.lock_ms,
            abstract_key,
        )
        .with_context(|| format!("failed to init profile '{}'", self.name))?;

        println!("✓ Registered profile '{}'", profile.name);
        println!("  local: {}", profile.local_dir.display());
        println!("  cloud: {}", profile.cloud_dir.display());
        println!("  Saved to: ~/.reconcile/profiles/{}.yaml", profile.name);
        Ok(())
    }
}

fn resolve_dir(path: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("cannot create directory '{}'", path.display()))?;
    path.canonicalize()
        .with_context(|| format!("cannot resolve path '{}'", path.display()))
}
