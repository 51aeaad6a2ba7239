use thiserror::Error;

use globsync_core::ConfigError;
use globsync_sync::SyncError;
use globsync_watch::WatchError;

/// Everything a hook can fail with.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("watch error: {0}")]
    Watch(#[from] WatchError),

    #[error("build_start has not completed for this plugin instance")]
    NotStarted,

    #[error("{0} ended before reporting completion")]
    Interrupted(&'static str),
}
