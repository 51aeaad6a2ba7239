//! Translation of raw notify events into [`SyncEvent`]s.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use walkdir::WalkDir;

use globsync_core::{paths::to_posix, SyncEvent};
use globsync_sync::PatternSet;

use crate::error::{io_err, WatchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Change {
    Created,
    Modified,
    Removed,
    /// Both rename endpoints in one event: `paths[0]` became `paths[1]`.
    Renamed,
    /// The backend could not say; decided by whether the path still exists.
    Ambiguous,
}

pub(crate) fn classify(kind: &EventKind) -> Option<Change> {
    match kind {
        EventKind::Create(_) => Some(Change::Created),
        EventKind::Remove(_) => Some(Change::Removed),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(Change::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(Change::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Some(Change::Renamed),
        EventKind::Modify(ModifyKind::Name(_)) => Some(Change::Ambiguous),
        EventKind::Modify(_) => Some(Change::Modified),
        EventKind::Any => Some(Change::Ambiguous),
        EventKind::Access(_) | EventKind::Other => None,
    }
}

/// The set of source directories registered with the watcher.
///
/// notify is driven non-recursively, one registration per directory, so
/// pruned subtrees (vendor directories, a destination nested in the source)
/// never produce events at all.
pub(crate) struct WatchedTree {
    root: PathBuf,
    patterns: Arc<PatternSet>,
    dirs: HashSet<PathBuf>,
}

impl WatchedTree {
    /// `root` must be canonical so backend paths strip cleanly.
    pub(crate) fn new(root: PathBuf, patterns: Arc<PatternSet>) -> Self {
        Self {
            root,
            patterns,
            dirs: HashSet::new(),
        }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn watched(&self) -> usize {
        self.dirs.len()
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = to_posix(path.strip_prefix(&self.root).ok()?);
        (!rel.is_empty()).then_some(rel)
    }

    /// Watch `dir` and every non-pruned directory below it.
    ///
    /// Returns the selected files found along the way, relative to the root.
    pub(crate) fn register<W: Watcher>(
        &mut self,
        watcher: &mut W,
        dir: &Path,
    ) -> Result<Vec<String>, WatchError> {
        let root = self.root.clone();
        let patterns = Arc::clone(&self.patterns);
        let relative = |path: &Path| path.strip_prefix(&root).map(to_posix).unwrap_or_default();

        let walker = WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !entry.file_type().is_dir() || !patterns.is_pruned(&relative(entry.path()))
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    if err.io_error().map(|e| e.kind()) == Some(ErrorKind::NotFound) {
                        // Deleted again before we got to it.
                        return Ok(files);
                    }
                    if dir == root {
                        return Err(WatchError::Walk {
                            path: dir.to_path_buf(),
                            source: err,
                        });
                    }
                    tracing::warn!(path = %dir.display(), error = %err, "cannot watch new directory");
                    return Ok(files);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry while registering watches");
                    continue;
                }
            };

            let path = entry.path();
            if entry.file_type().is_dir() {
                if !self.dirs.insert(path.to_path_buf()) {
                    continue;
                }
                match watcher.watch(path, RecursiveMode::NonRecursive) {
                    Ok(()) => tracing::trace!(path = %path.display(), "watching directory"),
                    Err(err) if is_not_found(&err) => {
                        self.dirs.remove(path);
                    }
                    Err(err) => return Err(err.into()),
                }
            } else if entry.file_type().is_file() {
                let rel = relative(path);
                if patterns.is_match(&rel) {
                    files.push(rel);
                }
            }
        }
        Ok(files)
    }

    /// Sync events implied by one raw event. New directories are registered
    /// on the way and their selected files reported as added.
    pub(crate) fn translate<W: Watcher>(
        &mut self,
        watcher: &mut W,
        event: &Event,
    ) -> Result<Vec<SyncEvent>, WatchError> {
        let Some(change) = classify(&event.kind) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        match (change, event.paths.as_slice()) {
            (Change::Renamed, [from, to]) => {
                self.apply(watcher, from, Change::Removed, &mut out)?;
                self.apply(watcher, to, Change::Created, &mut out)?;
            }
            (change, paths) => {
                for path in paths {
                    self.apply(watcher, path, change, &mut out)?;
                }
            }
        }
        Ok(out)
    }

    fn apply<W: Watcher>(
        &mut self,
        watcher: &mut W,
        path: &Path,
        change: Change,
        out: &mut Vec<SyncEvent>,
    ) -> Result<(), WatchError> {
        let Some(rel) = self.relative(path) else {
            return Ok(());
        };

        let change = match change {
            Change::Ambiguous | Change::Renamed if path.exists() => Change::Created,
            Change::Ambiguous | Change::Renamed => Change::Removed,
            other => other,
        };

        if change == Change::Removed {
            if self.patterns.is_pruned(&rel) {
                return Ok(());
            }
            self.dirs.retain(|dir| !dir.starts_with(path));
            out.push(SyncEvent::Removed(rel));
            return Ok(());
        }

        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            // Gone already; its removal event follows.
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                tracing::warn!(error = %io_err(path, err), "cannot inspect changed path");
                return Ok(());
            }
        };

        if meta.is_dir() {
            if change == Change::Created && !self.patterns.is_pruned(&rel) {
                let found = self.register(watcher, path)?;
                out.extend(found.into_iter().map(SyncEvent::Added));
            }
        } else if meta.is_file() && self.patterns.is_match(&rel) {
            out.push(match change {
                Change::Created => SyncEvent::Added(rel),
                _ => SyncEvent::Changed(rel),
            });
        }
        Ok(())
    }
}

fn is_not_found(err: &notify::Error) -> bool {
    match &err.kind {
        notify::ErrorKind::PathNotFound => true,
        notify::ErrorKind::Io(io) => io.kind() == ErrorKind::NotFound,
        _ => false,
    }
}
