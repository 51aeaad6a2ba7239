//! Error types for globsync-sync.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from discovery, cleaning and file sync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A glob that `globset` refused to compile.
    #[error("invalid glob '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory walk failure (unreadable source root, permission denied).
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The transform mapped `path` somewhere that is not a file inside the
    /// destination root.
    #[error("transform of '{path}' produced '{target}', which is not a path inside the destination")]
    InvalidTarget { path: String, target: String },

    /// Manifest serialization error.
    #[error("manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A blocking filesystem task panicked or was cancelled.
    #[error("{task} task join error: {source}")]
    Join {
        task: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
