use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant as StdInstant;

use notify::{recommended_watcher, Event, RecommendedWatcher};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::instrument::WithSubscriber;

use globsync_core::SyncEvent;
use globsync_sync::PatternSet;

use crate::debounce::{Debouncer, DEBOUNCE_WINDOW};
use crate::error::{handle_join, io_err, WatchError};
use crate::events::WatchedTree;

type RawEvent = notify::Result<Event>;

/// Lifecycle of the watcher task as seen by [`WatchControl`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum WatchState {
    Starting,
    Ready,
    /// Ended without error; `ready` tells whether registration had finished.
    Stopped { ready: bool },
    Failed(String),
}

/// Readiness, health and shutdown for a running watch. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WatchControl {
    state: watch::Receiver<WatchState>,
    shutdown: broadcast::Sender<()>,
}

impl WatchControl {
    /// Resolves once every source directory has been registered.
    ///
    /// Fails with the watcher's own error once it has died, even when it
    /// had become ready before.
    pub async fn ready(&self) -> Result<(), WatchError> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(|state| *state != WatchState::Starting)
            .await
            .map(|state| (*state).clone())
            .map_err(|_| WatchError::ChannelClosed("watcher exited before it was ready"))?;
        match state {
            WatchState::Ready | WatchState::Stopped { ready: true } => Ok(()),
            WatchState::Failed(message) => Err(WatchError::Failed(message)),
            WatchState::Starting | WatchState::Stopped { ready: false } => Err(
                WatchError::ChannelClosed("watcher stopped before it was ready"),
            ),
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.state.borrow() == WatchState::Ready
    }

    /// `Err` once the watcher has failed; `Ok` while starting, running or
    /// after a clean stop.
    pub fn check(&self) -> Result<(), WatchError> {
        match &*self.state.borrow() {
            WatchState::Failed(message) => Err(WatchError::Failed(message.clone())),
            _ => Ok(()),
        }
    }

    /// Ask the watcher to close. Idempotent.
    pub fn stop(&self) {
        let _ = self.shutdown.send(());
    }
}

/// A cancellable stream of debounced [`SyncEvent`]s for one source tree.
pub struct WatchSubscription {
    events: mpsc::UnboundedReceiver<SyncEvent>,
    control: WatchControl,
    task: JoinHandle<Result<(), WatchError>>,
}

impl WatchSubscription {
    /// Start watching `source`. Must be called from within a tokio runtime.
    ///
    /// Backend failures are reported by [`WatchSubscription::closed`] and by
    /// [`WatchControl::check`]; the stream ends when the watcher stops for
    /// any reason.
    pub fn open(patterns: Arc<PatternSet>, source: &Path) -> Result<Self, WatchError> {
        Self::with_raw_channel(patterns, source, mpsc::unbounded_channel())
    }

    /// [`WatchSubscription::open`] fed by a caller-supplied backend channel.
    /// The watcher's callback sends into `raw.0` as well.
    pub(crate) fn with_raw_channel(
        patterns: Arc<PatternSet>,
        source: &Path,
        raw: (mpsc::UnboundedSender<RawEvent>, mpsc::UnboundedReceiver<RawEvent>),
    ) -> Result<Self, WatchError> {
        // Backends such as FSEvents report real paths (/private/var/... on
        // macOS), so match against the canonical root.
        let root = std::fs::canonicalize(source).map_err(|e| io_err(source, e))?;

        let (events_tx, events) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(WatchState::Starting);
        let (shutdown, shutdown_rx) = broadcast::channel(4);

        let task = tokio::spawn(
            async move {
                let result =
                    watcher_task(root, patterns, raw, events_tx, &state_tx, shutdown_rx).await;
                match &result {
                    Ok(()) => state_tx.send_modify(|state| {
                        let ready = *state == WatchState::Ready;
                        *state = WatchState::Stopped { ready };
                    }),
                    Err(err) => {
                        state_tx.send_replace(WatchState::Failed(err.to_string()));
                    }
                }
                result
            }
            .with_current_subscriber(),
        );

        Ok(Self {
            events,
            control: WatchControl { state, shutdown },
            task,
        })
    }

    /// Next event, or `None` once the watcher has stopped.
    pub async fn next(&mut self) -> Option<SyncEvent> {
        self.events.recv().await
    }

    pub fn control(&self) -> WatchControl {
        self.control.clone()
    }

    /// Wait for the watcher task to end and return how it ended.
    pub async fn closed(self) -> Result<(), WatchError> {
        handle_join("watcher", self.task.await)
    }
}

impl std::fmt::Debug for WatchSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSubscription")
            .field("ready", &self.control.is_ready())
            .finish_non_exhaustive()
    }
}

async fn watcher_task(
    root: PathBuf,
    patterns: Arc<PatternSet>,
    (raw_tx, mut raw_rx): (mpsc::UnboundedSender<RawEvent>, mpsc::UnboundedReceiver<RawEvent>),
    events_tx: mpsc::UnboundedSender<SyncEvent>,
    state_tx: &watch::Sender<WatchState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), WatchError> {
    let started = StdInstant::now();

    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = raw_tx.send(event);
    })?;

    let mut tree = WatchedTree::new(root.clone(), patterns);
    tree.register(&mut watcher, &root)?;
    state_tx.send_replace(WatchState::Ready);
    tracing::debug!(
        root = %tree.root().display(),
        dirs = tree.watched(),
        duration_ms = started.elapsed().as_millis() as u64,
        "watcher ready",
    );

    let mut debounce = Debouncer::new(DEBOUNCE_WINDOW);

    loop {
        let deadline = debounce.next_deadline();
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = events_tx.closed() => break,
            _ = sleep_until(deadline) => {
                for event in debounce.drain_due(Instant::now()) {
                    tracing::trace!(event = %event, "watch event");
                    if events_tx.send(event).is_err() {
                        return Ok(());
                    }
                }
            }
            raw = raw_rx.recv() => {
                let Some(raw) = raw else { break };
                let event = match raw {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::error!(error = %err, "watcher failed; destination may drift from source");
                        return Err(err.into());
                    }
                };
                let now = Instant::now();
                for change in tree.translate(&mut watcher, &event)? {
                    debounce.push(change, now);
                }
            }
        }
    }

    tracing::debug!(dropped = debounce.len(), "watcher stopped");
    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
