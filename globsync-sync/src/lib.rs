//! # globsync-sync
//!
//! Glob resolution, destination cleaning and the incremental sync engine.
//!
//! Call [`pipeline::prepare`] to resolve patterns, clean the destination and
//! discover the initial file set, then feed the result to
//! [`SyncEngine::initial_copy`]. Later filesystem events go through
//! [`SyncEngine::dispatch`].

pub mod clean;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod patterns;
pub mod pipeline;
pub mod transform;

pub use clean::CleanReport;
pub use engine::{CopySummary, SyncEngine, SyncOutcome};
pub use error::SyncError;
pub use manifest::Manifest;
pub use patterns::{discover, PatternSet};
pub use pipeline::{prepare, stage, Prepared, Staged};
pub use transform::PathTransformer;
