use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{watch, OnceCell};
use tracing::instrument::{WithSubscriber, WithDispatch};

use globsync_core::{
    config::flatten_patterns, EnvReader, Options, ProcessEnv, ResolvedOptions, SessionLogger,
};
use globsync_sync::{stage, CopySummary, Manifest, SyncEngine};
use globsync_watch::WatchAdapter;

use crate::error::PluginError;
use crate::hooks::{BuildPlugin, EmittedAsset};

pub const PLUGIN_NAME: &str = "globsync";

/// Live state created by the first `build_start`.
struct Session {
    engine: Arc<SyncEngine>,
    copied: watch::Receiver<Option<CopySummary>>,
    watcher: Option<WatchAdapter>,
}

impl Session {
    async fn initial_copy(&self) -> Result<CopySummary, PluginError> {
        let mut copied = self.copied.clone();
        let summary = *copied
            .wait_for(Option::is_some)
            .await
            .map_err(|_| PluginError::Interrupted("initial copy"))?;
        Ok(summary.unwrap_or_default())
    }
}

/// One plugin instance: copies files matching the configured globs into the
/// destination and, in watch mode, keeps it in step with the source.
///
/// ## Manifest ordering
///
/// [`BuildPlugin::load`] snapshots the mapping at call time. Hosts that need
/// the complete mapping must let the initial copy finish first, by awaiting
/// [`BuildPlugin::build_end`], [`BuildPlugin::generate_bundle`] or
/// [`GlobsyncPlugin::initial_copy`].
pub struct GlobsyncPlugin {
    options: ResolvedOptions,
    logger: SessionLogger,
    session: OnceCell<Session>,
}

impl GlobsyncPlugin {
    /// Resolve `options` against the process environment and working directory.
    pub fn new(options: Options) -> Result<Self, PluginError> {
        let options = options.resolve_in_cwd(&ProcessEnv)?;
        Ok(Self::from_resolved(options))
    }

    /// Resolve `options` against an explicit environment and working directory.
    pub fn with_env(options: Options, env: &dyn EnvReader, cwd: &Path) -> Result<Self, PluginError> {
        let options = options.resolve(env, cwd)?;
        Ok(Self::from_resolved(options))
    }

    pub fn from_resolved(options: ResolvedOptions) -> Self {
        let logger = SessionLogger::new(options.level);
        Self::with_logger(options, logger)
    }

    /// Use a caller-built logger instead of the default stderr one.
    pub fn with_logger(options: ResolvedOptions, logger: SessionLogger) -> Self {
        logger.scope(|| {
            tracing::trace!(
                patterns = ?flatten_patterns(&options.patterns),
                dir = %options.dir.display(),
                dest = %options.dest.display(),
                clean = ?options.clean,
                manifest = ?options.manifest,
                watching = options.watching,
                "resolved options",
            );
        });
        Self {
            options,
            logger,
            session: OnceCell::new(),
        }
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    pub fn logger(&self) -> &SessionLogger {
        &self.logger
    }

    pub fn is_watching(&self) -> bool {
        self.session
            .get()
            .is_some_and(|session| session.watcher.is_some())
    }

    pub fn engine(&self) -> Option<&Arc<SyncEngine>> {
        self.session.get().map(|session| &session.engine)
    }

    /// Current mapping, empty before `build_start`.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.engine().map(|engine| engine.snapshot()).unwrap_or_default()
    }

    /// Wait for the initial copy batch.
    pub async fn initial_copy(&self) -> Result<CopySummary, PluginError> {
        self.session()?.initial_copy().await
    }

    /// Close the watch subscription and wait for it to wind down. Safe to
    /// call repeatedly, or when nothing was ever started.
    pub async fn stop(&self) -> Result<(), PluginError> {
        let Some(watcher) = self.session.get().and_then(|s| s.watcher.as_ref()) else {
            return Ok(());
        };
        self.scoped(async {
            watcher.stop();
            watcher.closed().await?;
            tracing::debug!("watcher stopped");
            Ok(())
        })
        .await
    }

    /// Resolves when the watcher ends: `Ok` after [`GlobsyncPlugin::stop`],
    /// `Err` when it failed. Immediate when not watching.
    pub async fn wait_watch(&self) -> Result<(), PluginError> {
        match self.session()?.watcher.as_ref() {
            Some(watcher) => Ok(watcher.closed().await?),
            None => Ok(()),
        }
    }

    fn session(&self) -> Result<&Session, PluginError> {
        self.session.get().ok_or(PluginError::NotStarted)
    }

    /// Run a hook body under this session's logger.
    fn scoped<T, F>(&self, fut: F) -> WithDispatch<F>
    where
        F: std::future::Future<Output = Result<T, PluginError>>,
    {
        fut.with_subscriber(self.logger.dispatch().clone())
    }

    fn owns(&self, id: &str) -> bool {
        self.options.manifest.module.as_deref() == Some(id)
    }

    async fn start_session(&self) -> Result<Session, PluginError> {
        let options = &self.options;
        let staged = stage(options, false).await?;

        let engine = Arc::new(SyncEngine::new(
            &options.dir,
            &options.dest,
            staged.patterns.clone(),
            options.transform.clone(),
        ));

        // Registered before discovery: a file created in between is either
        // discovered or reported by the watcher.
        let watcher = if options.watching {
            let started = Instant::now();
            let adapter = WatchAdapter::start(Arc::clone(&engine))?;
            adapter.ready().await?;
            tracing::debug!(
                dir = %options.dir.display(),
                duration_ms = started.elapsed().as_millis() as u64,
                "watching source tree",
            );
            Some(adapter)
        } else {
            None
        };

        let prepared = match staged.discover(options.dir.clone()).await {
            Ok(prepared) => prepared,
            Err(err) => {
                if let Some(watcher) = &watcher {
                    watcher.stop();
                }
                return Err(err.into());
            }
        };
        tracing::debug!(
            files = prepared.files.len(),
            cleaned = prepared.cleaned.removed,
            "discovered files",
        );

        let (copied_tx, copied) = watch::channel(None);
        let batch = Arc::clone(&engine);
        let files = prepared.files;
        tokio::spawn(
            async move {
                let summary = batch.initial_copy(files).await;
                tracing::info!(
                    copied = summary.copied,
                    failed = summary.failed,
                    duration_ms = summary.duration_ms as u64,
                    "initial copy complete",
                );
                let _ = copied_tx.send(Some(summary));
            }
            .with_current_subscriber(),
        );

        Ok(Session {
            engine,
            copied,
            watcher,
        })
    }
}

impl std::fmt::Debug for GlobsyncPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobsyncPlugin")
            .field("dir", &self.options.dir)
            .field("dest", &self.options.dest)
            .field("started", &self.session.initialized())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BuildPlugin for GlobsyncPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    async fn build_start(&self) -> Result<(), PluginError> {
        self.scoped(async {
            let mut fresh = false;
            self.session
                .get_or_try_init(|| {
                    fresh = true;
                    self.start_session()
                })
                .await?;
            if !fresh {
                tracing::debug!("session already running; skipping setup");
                if let Some(watcher) = &self.session()?.watcher {
                    watcher.check()?;
                }
            }
            Ok(())
        })
        .await
    }

    async fn resolve_id(&self, id: &str) -> Option<String> {
        self.owns(id).then(|| id.to_string())
    }

    async fn load(&self, id: &str) -> Result<Option<String>, PluginError> {
        if !self.owns(id) {
            return Ok(None);
        }
        let manifest = Manifest::snapshot(&self.session()?.engine);
        self.logger.scope(|| {
            tracing::debug!(module = id, entries = manifest.entries().len(), "serving manifest module");
        });
        Ok(Some(manifest.to_module()?))
    }

    async fn build_end(
        &self,
        error: Option<&(dyn std::error::Error + Send + Sync)>,
    ) -> Result<Option<EmittedAsset>, PluginError> {
        let Some(file_name) = self.options.manifest.file.clone() else {
            return Ok(None);
        };
        if let Some(error) = error {
            self.logger.scope(|| {
                tracing::debug!(error = %error, "build failed; not emitting manifest");
            });
            return Ok(None);
        }

        self.scoped(async {
            let session = self.session()?;
            session.initial_copy().await?;
            let source = Manifest::snapshot(&session.engine).to_file()?;
            tracing::debug!(file = %file_name, "emitting manifest file");
            Ok(Some(EmittedAsset { file_name, source }))
        })
        .await
    }

    async fn generate_bundle(&self) -> Result<(), PluginError> {
        self.scoped(async {
            let session = self.session()?;
            session.initial_copy().await?;
            if let Some(watcher) = &session.watcher {
                watcher.ready().await?;
                watcher.check()?;
            }
            Ok(())
        })
        .await
    }
}
