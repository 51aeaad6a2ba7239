//! Destination cleaning before the initial copy.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use globsync_core::{paths::to_posix, CleanPolicy};
use walkdir::WalkDir;

use crate::error::{io_err, SyncError};
use crate::patterns::PatternSet;

/// How many top-level entries a clean removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub removed: usize,
}

/// Apply `policy` to `dest`, blocking until every deletion has finished.
///
/// A missing `dest` is already clean. Any other deletion failure is returned
/// immediately; entries removed before it stay removed.
pub fn clean_blocking(dest: &Path, policy: &CleanPolicy) -> Result<CleanReport, SyncError> {
    match policy {
        CleanPolicy::Skip => Ok(CleanReport::default()),
        CleanPolicy::All => clean_all(dest),
        CleanPolicy::Globs(globs) => clean_matching(dest, globs),
    }
}

/// [`clean_blocking`] on the blocking thread pool, under the caller's subscriber.
pub async fn clean(dest: PathBuf, policy: CleanPolicy) -> Result<CleanReport, SyncError> {
    let dispatch = tracing::dispatcher::get_default(|d| d.clone());
    tokio::task::spawn_blocking(move || {
        tracing::dispatcher::with_default(&dispatch, || clean_blocking(&dest, &policy))
    })
    .await
    .map_err(|source| SyncError::Join {
        task: "clean",
        source,
    })?
}

fn clean_all(dest: &Path) -> Result<CleanReport, SyncError> {
    let entries = match std::fs::read_dir(dest) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(CleanReport::default()),
        Err(err) => return Err(io_err(dest, err)),
    };

    let mut report = CleanReport::default();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dest, e))?;
        if remove_entry(&entry.path())? {
            report.removed += 1;
        }
    }
    Ok(report)
}

fn clean_matching(dest: &Path, globs: &[String]) -> Result<CleanReport, SyncError> {
    if !dest.exists() {
        return Ok(CleanReport::default());
    }

    let matcher = PatternSet::compile(globs.to_vec())?;
    let mut report = CleanReport::default();
    let mut walker = WalkDir::new(dest).min_depth(1).into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|source| SyncError::Walk {
            path: dest.to_path_buf(),
            source,
        })?;
        let rel = entry
            .path()
            .strip_prefix(dest)
            .map(to_posix)
            .unwrap_or_default();
        if !matcher.is_match(&rel) {
            continue;
        }
        if entry.file_type().is_dir() {
            walker.skip_current_dir();
        }
        if remove_entry(entry.path())? {
            tracing::trace!(path = %rel, "cleaned");
            report.removed += 1;
        }
    }
    Ok(report)
}

/// Remove a file, symlink or directory tree. `Ok(false)` when already gone.
pub(crate) fn remove_entry(path: &Path) -> Result<bool, SyncError> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(io_err(path, err)),
    };
    let result = if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_err(path, err)),
    }
}
