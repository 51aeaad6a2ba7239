//! Build-pipeline binding for globsync.
//!
//! [`GlobsyncPlugin`] implements [`BuildPlugin`]: `build_start` cleans the
//! destination, starts the initial copy and (in watch mode) the watcher;
//! `resolve_id`/`load` serve the manifest module; `build_end` emits the
//! manifest file; `generate_bundle` waits until the destination is complete.

mod error;
mod hooks;
mod session;

pub use error::PluginError;
pub use hooks::{BuildPlugin, EmittedAsset};
pub use session::{GlobsyncPlugin, PLUGIN_NAME};
