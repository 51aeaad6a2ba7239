//! `globsync sync`: copy matching files into the destination, and keep
//! copying with `--watch`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tracing::instrument::WithSubscriber;

use globsync_core::{
    config::CONFIG_FILE, CleanOption, LogLevel, ManifestOption, ManifestTargets, Options,
    PatternInput, ProcessEnv, ResolvedOptions, SessionLogger,
};
use globsync_plugin::{BuildPlugin, GlobsyncPlugin};
use globsync_sync::{pipeline::discover_files, CopySummary, PatternSet, PathTransformer};

/// Arguments for `globsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Glob patterns to copy, relative to --dir. Replace the config file's patterns.
    pub patterns: Vec<String>,

    /// Options file (default: ./globsync.yaml when present).
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Source root.
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Destination root.
    #[arg(long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Leave existing destination files alone.
    #[arg(long, conflicts_with = "clean_glob")]
    pub no_clean: bool,

    /// Only remove destination entries matching GLOB before copying (repeatable).
    #[arg(long = "clean-glob", value_name = "GLOB")]
    pub clean_glob: Vec<String>,

    /// Keep running and mirror source changes until Ctrl-C.
    #[arg(long, short = 'w')]
    pub watch: bool,

    /// Also write a JSON manifest of source → destination paths into the destination.
    #[arg(long, value_name = "NAME")]
    pub manifest_file: Option<String>,

    /// Most detailed logging; overrides --loglevel.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// silly | verbose | info | warn | error | silent
    #[arg(long, value_name = "LEVEL")]
    pub loglevel: Option<LogLevel>,

    /// Log as newline-delimited JSON.
    #[arg(long)]
    pub json_logs: bool,

    /// Print the result as JSON instead of a summary.
    #[arg(long)]
    pub json: bool,

    /// Show what would be copied without touching the filesystem.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Serialize)]
struct SyncReport<'a> {
    dry_run: bool,
    dest: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<CopySummary>,
    files: Vec<FileEntry>,
}

#[derive(Serialize)]
struct FileEntry {
    source: String,
    dest: String,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let options = self
            .options()?
            .resolve_in_cwd(&ProcessEnv)
            .context("invalid options")?;
        let logger = if self.json_logs {
            SessionLogger::json(options.level)
        } else {
            SessionLogger::from_env_or(options.level)
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start tokio runtime")?;

        if self.dry_run {
            let dispatch = logger.dispatch().clone();
            return runtime.block_on(self.plan(options).with_subscriber(dispatch));
        }
        runtime.block_on(self.sync(options, logger))
    }

    /// Config file (explicit, or the conventional one when present) overlaid
    /// with command-line flags.
    fn options(&self) -> Result<Options> {
        let config = match &self.config {
            Some(path) => Some(path.clone()),
            None => Some(PathBuf::from(CONFIG_FILE)).filter(|path| path.exists()),
        };
        let mut options = match config {
            Some(path) => Options::load(&path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => Options::default(),
        };

        if !self.patterns.is_empty() {
            options.patterns = self
                .patterns
                .iter()
                .map(|p| PatternInput::from(p.as_str()))
                .collect();
        }
        if let Some(dir) = &self.dir {
            options = options.dir(dir);
        }
        if let Some(dest) = &self.dest {
            options = options.dest(dest);
        }
        if self.no_clean {
            options = options.clean(CleanOption::Enabled(false));
        } else if !self.clean_glob.is_empty() {
            let globs = self.clean_glob.iter().map(|g| g.as_str().into()).collect();
            options = options.clean(CleanOption::Globs(globs));
        }
        if self.watch {
            options = options.watching(true);
        } else if options.watching.is_none() {
            options = options.watching(false);
        }
        if let Some(file) = &self.manifest_file {
            options = options.manifest(ManifestOption::Targets(ManifestTargets {
                module: None,
                file: Some(file.clone()),
            }));
        }
        if self.verbose {
            options = options.verbose(true);
        }
        if let Some(level) = self.loglevel {
            options = options.loglevel(level);
        }
        Ok(options)
    }

    async fn plan(&self, options: ResolvedOptions) -> Result<()> {
        let patterns = Arc::new(
            PatternSet::resolve(&options.patterns, &options.dir, &options.dest)
                .context("invalid glob")?,
        );
        let files = discover_files(patterns, options.dir.clone())
            .await
            .with_context(|| format!("failed to read {}", options.dir.display()))?;

        let transformer = PathTransformer::new(options.transform.clone());
        let files = files
            .into_iter()
            .map(|source| FileEntry {
                dest: transformer.transform(&source),
                source,
            })
            .collect();

        self.report(&options.dest, None, files)
    }

    async fn sync(&self, options: ResolvedOptions, logger: SessionLogger) -> Result<()> {
        let dest = options.dest.clone();
        let plugin = GlobsyncPlugin::with_logger(options, logger);

        plugin.build_start().await.context("failed to start sync")?;

        if let Some(asset) = plugin.build_end(None).await.context("failed to build manifest")? {
            let path = dest.join(&asset.file_name);
            tokio::fs::create_dir_all(&dest)
                .await
                .with_context(|| format!("failed to create {}", dest.display()))?;
            tokio::fs::write(&path, asset.source)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
        }

        plugin
            .generate_bundle()
            .await
            .context("failed to finish initial copy")?;
        let summary = plugin.initial_copy().await?;

        let files = plugin
            .snapshot()
            .into_iter()
            .map(|(source, dest)| FileEntry { source, dest })
            .collect();
        self.report(&dest, Some(summary), files)?;

        if plugin.is_watching() {
            if !self.json {
                println!(
                    "{} {} (Ctrl-C to stop)",
                    "watching".cyan(),
                    plugin.options().dir.display()
                );
            }
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.context("failed to listen for Ctrl-C")?;
                    plugin.stop().await.context("watcher failed while stopping")?;
                }
                result = plugin.wait_watch() => {
                    result.context("watcher failed")?;
                }
            }
        }

        if summary.failed > 0 {
            bail!("{} file(s) failed to copy", summary.failed);
        }
        Ok(())
    }

    fn report(&self, dest: &Path, summary: Option<CopySummary>, files: Vec<FileEntry>) -> Result<()> {
        if self.json {
            let report = SyncReport {
                dry_run: self.dry_run,
                dest,
                summary,
                files,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report")?
            );
            return Ok(());
        }

        print_summary(dest, summary, &files, self.dry_run);
        Ok(())
    }
}

fn print_summary(dest: &Path, summary: Option<CopySummary>, files: &[FileEntry], dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };

    match summary {
        Some(summary) if summary.failed > 0 => println!(
            "{prefix}{} copied {} file(s) to {}, {} failed ({} ms)",
            "✗".red(),
            summary.copied,
            dest.display(),
            summary.failed,
            summary.duration_ms,
        ),
        Some(summary) => println!(
            "{prefix}{} copied {} file(s) to {} ({} ms)",
            "✓".green(),
            summary.copied,
            dest.display(),
            summary.duration_ms,
        ),
        None if files.is_empty() => {
            println!("{prefix}✓ nothing to copy");
            return;
        }
        None => println!(
            "{prefix}✓ would copy {} file(s) to {}",
            files.len(),
            dest.display()
        ),
    }

    let marker = if dry_run { "~" } else { "✎" };
    for file in files {
        println!("  {}  {} → {}", marker.dimmed(), file.source, file.dest);
    }
}
