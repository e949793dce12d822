//! Error types for reconcile-sync.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use reconcile_core::{ProfileError, Side, SyncAction};

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A cycle is already running. Not a failure: a retry has been scheduled.
    #[error("sync already in progress; retrying in {retry_in:?}")]
    Busy { retry_in: Duration },

    /// No override and no basic record stores for an action that needs one.
    #[error("no resolver for '{action}': configure basic record stores or a resolve override")]
    MissingResolver { action: SyncAction },

    /// A record vanished between snapshot and resolution (e.g. a racing delete).
    #[error("can't find '{id}' in {side} store")]
    NotFound { id: String, side: Side },

    /// Record ids become file names in directory-backed stores.
    #[error("record id '{id}' cannot be stored as a file name")]
    InvalidRecordId { id: String },

    /// A collaborator call failed.
    #[error("back end error: {0}")]
    Backend(String),

    /// An error from the profile configuration.
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (records, cached snapshots).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A blocking task panicked or was cancelled.
    #[error("task join error: {0}")]
    Join(String),
}

impl SyncError {
    /// True for the transient "retry later" signal.
    pub fn is_busy(&self) -> bool {
        matches!(self, SyncError::Busy { .. })
    }

    /// Wrap any displayable collaborator failure.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        SyncError::Backend(err.to_string())
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Run blocking filesystem work off the async executor.
pub(crate) async fn blocking<R, F>(work: F) -> Result<R, SyncError>
where
    F: FnOnce() -> Result<R, SyncError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| SyncError::Join(err.to_string()))?
}
