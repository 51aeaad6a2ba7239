use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;

use globsync_sync::SyncEngine;

use crate::error::{handle_join, WatchError};
use crate::subscription::{WatchControl, WatchSubscription};

/// Feeds a [`WatchSubscription`] over the engine's source tree into
/// [`SyncEngine::dispatch`].
///
/// Stopping closes the subscription only; operations already dispatched run
/// to completion on their own.
#[derive(Debug)]
pub struct WatchAdapter {
    control: WatchControl,
    task: Mutex<Option<JoinHandle<Result<(), WatchError>>>>,
}

impl WatchAdapter {
    pub fn start(engine: Arc<SyncEngine>) -> Result<Self, WatchError> {
        let subscription = WatchSubscription::open(engine.patterns().clone(), engine.source())?;
        Ok(Self::bind(engine, subscription))
    }

    fn bind(engine: Arc<SyncEngine>, mut subscription: WatchSubscription) -> Self {
        let control = subscription.control();

        let task = tokio::spawn(
            async move {
                while let Some(event) = subscription.next().await {
                    engine.dispatch(event);
                }
                subscription.closed().await
            }
            .with_current_subscriber(),
        );

        Self {
            control,
            task: Mutex::new(Some(task)),
        }
    }

    /// Resolves once the source tree is registered; `Err` once the watcher
    /// has failed, before or after that point.
    pub async fn ready(&self) -> Result<(), WatchError> {
        self.control.ready().await
    }

    /// `Err` with the watcher's failure once it has died.
    pub fn check(&self) -> Result<(), WatchError> {
        self.control.check()
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    /// Wait for the watch to end. A backend failure comes back as `Err`;
    /// later calls after the first completed one return `Ok(())`.
    pub async fn closed(&self) -> Result<(), WatchError> {
        let mut task = self.task.lock().await;
        let Some(handle) = task.as_mut() else {
            return Ok(());
        };
        let result = handle.await;
        *task = None;
        handle_join("watch", result)
    }
}
