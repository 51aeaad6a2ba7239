//! Globsync core library: options, domain types, errors.
//!
//! Public API surface:
//! - [`config`]: [`Options`] and their resolution into [`ResolvedOptions`]
//! - [`types`]: [`FileMapping`], [`SyncEvent`], [`LogLevel`], [`PathTransform`]
//! - [`logging`]: per-session [`SessionLogger`]
//! - [`env`]: [`EnvReader`] used to detect watch mode
//! - [`paths`]: pure path helpers
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod env;
pub mod error;
pub mod logging;
pub mod paths;
pub mod types;

pub use config::{
    CleanOption, CleanPolicy, ManifestOption, ManifestTargets, Options, PatternInput,
    ResolvedOptions,
};
pub use env::{EnvReader, MapEnv, ProcessEnv};
pub use error::ConfigError;
pub use logging::SessionLogger;
pub use types::{FileMapping, LogLevel, PathTransform, SyncEvent};
