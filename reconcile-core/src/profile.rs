//! Per-profile YAML configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.reconcile/
//!   profiles/
//!     <profile_name>.yaml   (one file per profile — mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProfileError;
use crate::types::{AbstractKey, ProfileName};

/// Default lock window: retry backoff is half of it, forced unlock all of it.
pub const DEFAULT_LOCK_RESOLVING_MS: u64 = 10_000;

/// A named pairing of a local store and a cloud store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProfile {
    pub name: ProfileName,
    /// Directory holding the local copy of the records.
    pub local_dir: PathBuf,
    /// Directory standing in for the cloud copy of the records.
    pub cloud_dir: PathBuf,
    #[serde(default = "default_lock_resolving_ms")]
    pub lock_resolving_ms: u64,
    #[serde(default)]
    pub abstract_key: AbstractKey,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncProfile {
    /// The identifier that partitions cached snapshots.
    pub fn store_id(&self) -> &str {
        &self.name.0
    }
}

fn default_lock_resolving_ms() -> u64 {
    DEFAULT_LOCK_RESOLVING_MS
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.reconcile/profiles/`
///
/// Creates the directory (mode `0700`) if it does not yet exist.
pub fn profiles_dir_at(home: &Path) -> Result<PathBuf, ProfileError> {
    let dir = home.join(".reconcile").join("profiles");
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// `<home>/.reconcile/profiles/<name>.yaml` — pure, no I/O.
pub fn profile_path_at(home: &Path, name: &ProfileName) -> PathBuf {
    home.join(".reconcile")
        .join("profiles")
        .join(format!("{}.yaml", name.0))
}

/// Reject names that cannot be used as a file stem and storage key.
pub fn validate_name(name: &ProfileName) -> Result<(), ProfileError> {
    let valid = !name.0.is_empty()
        && !name.0.starts_with('.')
        && name
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ProfileError::InvalidName {
            name: name.0.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load a profile from `<home>/.reconcile/profiles/<name>.yaml`.
///
/// Returns `ProfileError::InvalidName` for names that are not plain file
/// stems, `ProfileError::ProfileNotFound` if absent,
/// `ProfileError::Parse` (with path) if malformed YAML.
pub fn load_at(home: &Path, name: &ProfileName) -> Result<SyncProfile, ProfileError> {
    validate_name(name)?;
    let path = profile_path_at(home, name);
    if !path.exists() {
        return Err(ProfileError::ProfileNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| ProfileError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load(name: &ProfileName) -> Result<SyncProfile, ProfileError> {
    load_at(&home()?, name)
}

/// Every profile under `<home>/.reconcile/profiles/`, sorted by name.
pub fn list_at(home: &Path) -> Result<Vec<SyncProfile>, ProfileError> {
    let dir = home.join(".reconcile").join("profiles");
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut entries: Vec<_> = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut profiles = Vec::new();
    for entry in entries {
        let fname = entry.file_name();
        if !fname.to_string_lossy().ends_with(".yaml") {
            continue;
        }
        let contents = std::fs::read_to_string(entry.path())?;
        let profile: SyncProfile = serde_yaml::from_str(&contents).map_err(|e| {
            ProfileError::Parse {
                path: entry.path(),
                source: e,
            }
        })?;
        profiles.push(profile);
    }
    Ok(profiles)
}

/// `list_at` convenience wrapper.
pub fn list() -> Result<Vec<SyncProfile>, ProfileError> {
    list_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save a profile.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, profile: &SyncProfile) -> Result<(), ProfileError> {
    validate_name(&profile.name)?;
    profiles_dir_at(home)?;
    let path = profile_path_at(home, &profile.name);
    let tmp_path = path.with_file_name(format!("{}.yaml.tmp", profile.name.0));

    let yaml = serde_yaml::to_string(profile)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(profile: &SyncProfile) -> Result<(), ProfileError> {
    save_at(&home()?, profile)
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Register a profile pairing `local_dir` with `cloud_dir`.
///
/// Idempotent: if the profile already exists, loads and returns it unchanged.
pub fn init_at(
    home: &Path,
    name: ProfileName,
    local_dir: PathBuf,
    cloud_dir: PathBuf,
    lock_resolving_ms: Option<u64>,
    abstract_key: Option<AbstractKey>,
) -> Result<SyncProfile, ProfileError> {
    validate_name(&name)?;
    if profile_path_at(home, &name).exists() {
        return load_at(home, &name);
    }

    let now = Utc::now();
    let profile = SyncProfile {
        name,
        local_dir,
        cloud_dir,
        lock_resolving_ms: lock_resolving_ms.unwrap_or(DEFAULT_LOCK_RESOLVING_MS),
        abstract_key: abstract_key.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };
    save_at(home, &profile)?;
    Ok(profile)
}

/// `init_at` convenience wrapper.
pub fn init(
    name: ProfileName,
    local_dir: PathBuf,
    cloud_dir: PathBuf,
    lock_resolving_ms: Option<u64>,
    abstract_key: Option<AbstractKey>,
) -> Result<SyncProfile, ProfileError> {
    init_at(
        &home()?,
        name,
        local_dir,
        cloud_dir,
        lock_resolving_ms,
        abstract_key,
    )
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ProfileError> {
    dirs::home_dir().ok_or(ProfileError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ProfileError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ProfileError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ProfileError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ProfileError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
