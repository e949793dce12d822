//! Error types for reconcile-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from sync profile operations.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse profile at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.reconcile/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The profile YAML file did not exist at the expected path.
    #[error("profile not found at {path}")]
    ProfileNotFound { path: PathBuf },

    /// Profile names become file names and storage keys.
    #[error("invalid profile name '{name}': use letters, digits, '-', '_' or '.'")]
    InvalidName { name: String },
}
