//! The file synchronization engine.
//!
//! ## Per-path state machine
//!
//! ```text
//! absent ──add/change──▶ copying ──ok──▶ present ──remove──▶ removing ──▶ absent
//!            ▲              │ err                                 │ err
//!            └──────────────┘                                     └──▶ present
//! ```
//!
//! - `add`/`change` delete whatever sits at the destination path, then copy.
//!   A failed copy leaves the path absent from the [`FileMapping`] so a later
//!   event retries it. A transformed target that does not name a path inside
//!   `dest` fails the same way, before any filesystem access.
//! - `remove` deletes the mapped destination (every mapped file below it for
//!   a directory) and drops the entries. A failed delete keeps the entry.
//!
//! ## Ordering
//!
//! [`SyncEngine::dispatch`] runs each event on its own task. Events for the
//! same source path are chained: a new event waits for the previous in-flight
//! operation on that path, so same-path operations apply in arrival order.
//! Different paths run concurrently, bounded by [`MAX_CONCURRENT_OPS`].

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;

use globsync_core::{FileMapping, PathTransform, SyncEvent};

use crate::error::{io_err, SyncError};
use crate::patterns::PatternSet;
use crate::transform::PathTransformer;

/// Upper bound on simultaneous copy/delete operations.
pub const MAX_CONCURRENT_OPS: usize = 64;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of one applied event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// `path` was copied to `target` (destination-relative).
    Copied { path: String, target: String },
    /// Destination entries for `path` were deleted (or were already gone).
    Removed { path: String, targets: Vec<String> },
    /// A removal for a path that is neither mapped nor selected by the patterns.
    Ignored { path: String },
}

/// Totals for the initial batch copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CopySummary {
    pub copied: usize,
    pub failed: usize,
    pub duration_ms: u128,
}

// ---------------------------------------------------------------------------
// SyncEngine
// ---------------------------------------------------------------------------

struct Pending {
    id: u64,
    done: watch::Receiver<bool>,
}

/// Owns the live source → destination mapping for one session and applies
/// filesystem events to the destination tree.
pub struct SyncEngine {
    source: PathBuf,
    dest: PathBuf,
    patterns: Arc<PatternSet>,
    transformer: PathTransformer,
    mapping: Mutex<FileMapping>,
    pending: Mutex<HashMap<String, Pending>>,
    next_id: AtomicU64,
    permits: Arc<Semaphore>,
}

impl SyncEngine {
    /// `source` and `dest` must be absolute.
    pub fn new(
        source: impl Into<PathBuf>,
        dest: impl Into<PathBuf>,
        patterns: Arc<PatternSet>,
        transform: Option<PathTransform>,
    ) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            patterns,
            transformer: PathTransformer::new(transform),
            mapping: Mutex::new(FileMapping::new()),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            permits: Arc::new(Semaphore::new(MAX_CONCURRENT_OPS)),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn patterns(&self) -> &Arc<PatternSet> {
        &self.patterns
    }

    /// Destination-relative path for `path`, memoized for the session.
    pub fn target_for(&self, path: &str) -> String {
        self.transformer.transform(path)
    }

    /// Point-in-time copy of the mapping in insertion order.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.mapping().snapshot()
    }

    pub fn mapped(&self, path: &str) -> Option<String> {
        self.mapping().get(path).map(str::to_string)
    }

    pub fn len(&self) -> usize {
        self.mapping().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping().is_empty()
    }

    /// Transformed target for `path`, refusing anything that would resolve
    /// to `dest` itself or escape it.
    fn checked_target(&self, path: &str) -> Result<String, SyncError> {
        let target = self.transformer.transform(path);
        if is_inside_dest(&target) {
            Ok(target)
        } else {
            Err(SyncError::InvalidTarget {
                path: path.to_string(),
                target,
            })
        }
    }

    fn mapping(&self) -> MutexGuard<'_, FileMapping> {
        self.mapping.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Apply one event directly, without per-path sequencing.
    pub async fn apply(&self, event: &SyncEvent) -> Result<SyncOutcome, SyncError> {
        match event {
            SyncEvent::Added(path) => self.add(path).await,
            SyncEvent::Changed(path) => self.change(path).await,
            SyncEvent::Removed(path) => self.remove(path).await,
        }
    }

    /// Copy `path` into the destination, replacing whatever is there.
    pub async fn add(&self, path: &str) -> Result<SyncOutcome, SyncError> {
        let started = Instant::now();
        let target = match self.checked_target(path) {
            Ok(target) => target,
            Err(err) => {
                self.mapping().remove(path);
                return Err(err);
            }
        };
        let from = self.source.join(path);
        let to = self.dest.join(&target);

        tracing::trace!(path, "copying");

        match copy_replacing(&from, &to).await {
            Ok(()) => {
                self.mapping().insert(path, target.clone());
                tracing::debug!(
                    path,
                    dest = %to.display(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "copied",
                );
                Ok(SyncOutcome::Copied {
                    path: path.to_string(),
                    target,
                })
            }
            Err(err) => {
                self.mapping().remove(path);
                Err(err)
            }
        }
    }

    /// Same transition as [`SyncEngine::add`]: a changed file is fully recopied.
    pub async fn change(&self, path: &str) -> Result<SyncOutcome, SyncError> {
        self.add(path).await
    }

    /// Delete the destination for `path` (a file, or a directory's mapped files).
    pub async fn remove(&self, path: &str) -> Result<SyncOutcome, SyncError> {
        let started = Instant::now();
        let entries = self.mapping().entries_under(path);

        tracing::trace!(path, "removing");

        if entries.is_empty() {
            // Never synced (or a delete that raced its add): best effort, and
            // only for paths the patterns select.
            if !self.patterns.is_match(path) {
                return Ok(SyncOutcome::Ignored {
                    path: path.to_string(),
                });
            }
            let target = self.checked_target(path)?;
            remove_target(&self.dest.join(&target)).await?;
            return Ok(SyncOutcome::Removed {
                path: path.to_string(),
                targets: vec![target],
            });
        }

        let mut targets = Vec::with_capacity(entries.len());
        for (source, target) in entries {
            remove_target(&self.dest.join(&target)).await?;
            self.mapping().remove(&source);
            targets.push(target);
        }

        tracing::debug!(
            path,
            removed = targets.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "removed",
        );
        Ok(SyncOutcome::Removed {
            path: path.to_string(),
            targets,
        })
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Queue `event` behind any in-flight operation on the same path and run
    /// it on a new task. Failures are logged, never propagated; the handle
    /// resolves to `true` when the operation succeeded.
    pub fn dispatch(self: &Arc<Self>, event: SyncEvent) -> JoinHandle<bool> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (done_tx, done_rx) = watch::channel(false);
        let previous = self
            .pending()
            .insert(event.path().to_string(), Pending { id, done: done_rx });

        let engine = Arc::clone(self);
        let task = async move {
            if let Some(mut previous) = previous {
                let _ = previous.done.wait_for(|done| *done).await;
            }

            let ok = match engine.permits.clone().acquire_owned().await {
                Ok(_permit) => match engine.apply(&event).await {
                    Ok(_) => true,
                    Err(err) => {
                        tracing::error!(event = %event, error = %err, "sync operation failed");
                        false
                    }
                },
                Err(_) => false,
            };

            let _ = done_tx.send(true);
            {
                let mut pending = engine.pending();
                if pending.get(event.path()).map(|p| p.id) == Some(id) {
                    pending.remove(event.path());
                }
            }
            ok
        };

        tokio::spawn(task.with_current_subscriber())
    }

    /// Wait until no dispatched operation is in flight.
    pub async fn settled(&self) {
        loop {
            let waiting: Vec<_> = self
                .pending()
                .values()
                .map(|p| p.done.clone())
                .filter(|done| !*done.borrow())
                .collect();
            if waiting.is_empty() {
                return;
            }
            for mut done in waiting {
                let _ = done.wait_for(|done| *done).await;
            }
        }
    }

    /// Copy every discovered path in parallel and wait for the whole batch.
    pub async fn initial_copy(self: &Arc<Self>, paths: Vec<String>) -> CopySummary {
        let started = Instant::now();
        let handles: Vec<_> = paths
            .into_iter()
            .map(|path| self.dispatch(SyncEvent::Added(path)))
            .collect();

        let mut summary = CopySummary::default();
        for handle in handles {
            match handle.await {
                Ok(true) => summary.copied += 1,
                Ok(false) => summary.failed += 1,
                Err(err) => {
                    tracing::error!(error = %err, "copy task join failure");
                    summary.failed += 1;
                }
            }
        }
        summary.duration_ms = started.elapsed().as_millis();
        summary
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("source", &self.source)
            .field("dest", &self.dest)
            .field("mapped", &self.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Filesystem primitives
// ---------------------------------------------------------------------------

/// At least one normal component, and nothing but normal or `.` components.
fn is_inside_dest(target: &str) -> bool {
    let mut named = false;
    for component in Path::new(target).components() {
        match component {
            Component::Normal(_) => named = true,
            Component::CurDir => {}
            _ => return false,
        }
    }
    named
}

async fn copy_replacing(from: &Path, to: &Path) -> Result<(), SyncError> {
    remove_target(to).await?;
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err(parent, e))?;
    }
    tokio::fs::copy(from, to).await.map_err(|e| io_err(from, e))?;
    Ok(())
}

/// Delete a file or directory tree; a missing target is already satisfied.
async fn remove_target(path: &Path) -> Result<(), SyncError> {
    let meta = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(io_err(path, err)),
    };
    let result = if meta.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    match result {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(io_err(path, err)),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
