//! The build-pipeline surface a host drives.

use async_trait::async_trait;

use crate::error::PluginError;

/// A file the plugin asks the host to write into its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
    pub file_name: String,
    pub source: String,
}

/// Lifecycle hooks, called by the host in this order for one build:
///
/// ```text
/// build_start → (resolve_id / load)* → build_end → generate_bundle
/// ```
///
/// `build_start` may be called more than once (watch rebuilds); only the
/// first call sets anything up.
#[async_trait]
pub trait BuildPlugin: Send + Sync {
    fn name(&self) -> &str;

    async fn build_start(&self) -> Result<(), PluginError>;

    /// `Some(id)` when this plugin owns the module `id`.
    async fn resolve_id(&self, id: &str) -> Option<String>;

    /// Source text for a module this plugin owns, `None` otherwise.
    async fn load(&self, id: &str) -> Result<Option<String>, PluginError>;

    /// Called once the host's build finished, with its error if it failed.
    async fn build_end(
        &self,
        error: Option<&(dyn std::error::Error + Send + Sync)>,
    ) -> Result<Option<EmittedAsset>, PluginError>;

    /// Returns only when the plugin's output is complete on disk.
    async fn generate_bundle(&self) -> Result<(), PluginError>;
}
