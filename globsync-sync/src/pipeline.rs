//! Shared session-start pipeline used by the plugin and the CLI.
//!
//! Order is fixed: resolve patterns → clean destination → discover files.
//! [`stage`] covers the first two steps, [`Staged::discover`] the last.
//! Cleaning finishes before discovery (and therefore before any copy) so a
//! copy can never race a delete of the same destination path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use globsync_core::ResolvedOptions;

use crate::clean::{self, CleanReport};
use crate::error::SyncError;
use crate::patterns::{discover, PatternSet};

/// Patterns resolved and destination cleaned; discovery still to run.
///
/// Hosts that watch the source open their watch between [`stage`] and
/// [`Staged::discover`], so a file created in between is seen by one or the
/// other.
#[derive(Debug, Clone)]
pub struct Staged {
    pub patterns: Arc<PatternSet>,
    pub cleaned: CleanReport,
}

/// Everything the initial copy needs.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub patterns: Arc<PatternSet>,
    pub files: Vec<String>,
    pub cleaned: CleanReport,
}

/// Run the pre-copy steps. With `dry_run` the destination is left untouched.
///
/// Glob, clean and discovery failures are all fatal to session start.
pub async fn prepare(options: &ResolvedOptions, dry_run: bool) -> Result<Prepared, SyncError> {
    stage(options, dry_run)
        .await?
        .discover(options.dir.clone())
        .await
}

/// Resolve patterns and clean the destination.
pub async fn stage(options: &ResolvedOptions, dry_run: bool) -> Result<Staged, SyncError> {
    let patterns = Arc::new(PatternSet::resolve(
        &options.patterns,
        &options.dir,
        &options.dest,
    )?);
    tracing::trace!(patterns = ?patterns.patterns(), "resolved globs");

    let cleaned = if dry_run {
        CleanReport::default()
    } else {
        let started = Instant::now();
        let report = clean::clean(options.dest.clone(), options.clean.clone()).await?;
        tracing::debug!(
            removed = report.removed,
            duration_ms = started.elapsed().as_millis() as u64,
            "cleaned destination",
        );
        report
    };

    Ok(Staged { patterns, cleaned })
}

impl Staged {
    pub async fn discover(self, source: PathBuf) -> Result<Prepared, SyncError> {
        let files = discover_files(self.patterns.clone(), source).await?;
        Ok(Prepared {
            patterns: self.patterns,
            files,
            cleaned: self.cleaned,
        })
    }
}

/// [`discover`] on the blocking thread pool, under the caller's subscriber.
pub async fn discover_files(
    patterns: Arc<PatternSet>,
    source: PathBuf,
) -> Result<Vec<String>, SyncError> {
    let dispatch = tracing::dispatcher::get_default(|d| d.clone());
    tokio::task::spawn_blocking(move || {
        tracing::dispatcher::with_default(&dispatch, || discover(&patterns, &source))
    })
    .await
    .map_err(|source| SyncError::Join {
        task: "discover",
        source,
    })?
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use globsync_core::{CleanOption, MapEnv, Options};
    use tempfile::TempDir;

    use super::*;

    fn options(root: &Path, clean: CleanOption) -> ResolvedOptions {
        Options::new(["*.txt"])
            .dir(root.join("src"))
            .dest(root.join("dest"))
            .clean(clean)
            .resolve(&MapEnv::new(), root)
            .expect("resolve")
    }

    #[tokio::test]
    async fn prepare_cleans_then_discovers() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src")).unwrap();
        fs::create_dir_all(tmp.path().join("dest")).unwrap();
        fs::write(tmp.path().join("src/file.txt"), "x").unwrap();
        fs::write(tmp.path().join("dest/stale.txt"), "old").unwrap();

        let prepared = prepare(&options(tmp.path(), CleanOption::Enabled(true)), false)
            .await
            .expect("prepare");

        assert_eq!(prepared.files, ["file.txt"]);
        assert_eq!(prepared.cleaned.removed, 1);
        assert!(!tmp.path().join("dest/stale.txt").exists());
    }

    #[tokio::test]
    async fn files_created_after_staging_are_discovered() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src")).unwrap();
        let options = options(tmp.path(), CleanOption::Enabled(true));

        let staged = stage(&options, false).await.expect("stage");
        fs::write(tmp.path().join("src/late.txt"), "x").unwrap();
        let prepared = staged.discover(options.dir.clone()).await.expect("discover");

        assert_eq!(prepared.files, ["late.txt"]);
    }

    #[tokio::test]
    async fn dry_run_leaves_destination_alone() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src")).unwrap();
        fs::create_dir_all(tmp.path().join("dest")).unwrap();
        fs::write(tmp.path().join("dest/stale.txt"), "old").unwrap();

        let prepared = prepare(&options(tmp.path(), CleanOption::Enabled(true)), true)
            .await
            .expect("prepare");

        assert!(prepared.files.is_empty());
        assert!(tmp.path().join("dest/stale.txt").exists());
    }

    #[tokio::test]
    async fn unreadable_source_aborts() {
        let tmp = TempDir::new().unwrap();
        let err = prepare(&options(tmp.path(), CleanOption::Enabled(false)), false)
            .await
            .expect_err("missing source must fail");
        assert!(matches!(err, SyncError::Walk { .. }));
    }
}
