use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the watch subscription and its binding to the engine.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// The watcher ended with an error; the message is the original failure.
    #[error("watcher failed: {0}")]
    Failed(String),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("{task} task join failure: {source}")]
    Join {
        task: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> WatchError {
    WatchError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn handle_join(
    task: &'static str,
    result: Result<Result<(), WatchError>, tokio::task::JoinError>,
) -> Result<(), WatchError> {
    match result {
        Ok(inner) => inner,
        Err(source) => Err(WatchError::Join { task, source }),
    }
}
