//! Filesystem watching for a sync session: a debounced event stream over the
//! source tree and the adapter that binds it to a [`globsync_sync::SyncEngine`].

mod adapter;
mod debounce;
mod error;
mod events;
mod subscription;

pub use adapter::WatchAdapter;
pub use debounce::DEBOUNCE_WINDOW;
pub use error::WatchError;
pub use subscription::{WatchControl, WatchSubscription};
