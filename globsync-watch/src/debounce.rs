use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use globsync_core::SyncEvent;

/// Quiet period a path must see before its last event is released.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

struct Pending {
    event: SyncEvent,
    due: Instant,
    seq: u64,
}

/// Trailing-edge, per-path coalescing of watch events.
///
/// Every new event for a path replaces the pending one and restarts that
/// path's window, so a burst collapses to its final kind. The one exception:
/// a change to a path still pending as added stays an add.
pub(crate) struct Debouncer {
    window: Duration,
    pending: HashMap<String, Pending>,
    seq: u64,
}

impl Debouncer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
            seq: 0,
        }
    }

    pub(crate) fn push(&mut self, event: SyncEvent, now: Instant) {
        self.seq += 1;
        let key = event.path().to_string();
        let event = match (self.pending.get(&key).map(|p| &p.event), event) {
            (Some(SyncEvent::Added(_)), SyncEvent::Changed(path)) => SyncEvent::Added(path),
            (_, event) => event,
        };
        self.pending.insert(
            key,
            Pending {
                event,
                due: now + self.window,
                seq: self.seq,
            },
        );
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.due).min()
    }

    /// Release every event whose window has elapsed, oldest push first.
    pub(crate) fn drain_due(&mut self, now: Instant) -> Vec<SyncEvent> {
        let due: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due <= now)
            .map(|(path, _)| path.clone())
            .collect();

        let mut released: Vec<Pending> = due
            .iter()
            .filter_map(|path| self.pending.remove(path))
            .collect();
        released.sort_by_key(|p| p.seq);
        released.into_iter().map(|p| p.event).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn added(p: &str) -> SyncEvent {
        SyncEvent::Added(p.into())
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn burst_collapses_to_last_kind() {
        let mut debounce = Debouncer::new(Duration::from_millis(100));

        debounce.push(added("file.txt"), Instant::now());
        advance(Duration::from_millis(10)).await;
        debounce.push(SyncEvent::Changed("file.txt".into()), Instant::now());
        advance(Duration::from_millis(10)).await;
        debounce.push(SyncEvent::Removed("file.txt".into()), Instant::now());

        assert!(debounce.drain_due(Instant::now()).is_empty());
        advance(Duration::from_millis(150)).await;

        assert_eq!(
            debounce.drain_due(Instant::now()),
            vec![SyncEvent::Removed("file.txt".into())]
        );
        assert_eq!(debounce.len(), 0);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn change_after_add_stays_an_add() {
        let mut debounce = Debouncer::new(Duration::from_millis(50));

        debounce.push(added("new.txt"), Instant::now());
        debounce.push(SyncEvent::Changed("new.txt".into()), Instant::now());
        advance(Duration::from_millis(50)).await;

        assert_eq!(debounce.drain_due(Instant::now()), vec![added("new.txt")]);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn each_event_restarts_the_window() {
        let mut debounce = Debouncer::new(Duration::from_millis(100));

        for _ in 0..5 {
            debounce.push(SyncEvent::Changed("a.txt".into()), Instant::now());
            advance(Duration::from_millis(60)).await;
            assert!(debounce.drain_due(Instant::now()).is_empty());
        }

        advance(Duration::from_millis(60)).await;
        assert_eq!(debounce.drain_due(Instant::now()).len(), 1);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn distinct_paths_release_in_push_order() {
        let mut debounce = Debouncer::new(Duration::from_millis(50));

        debounce.push(added("b.txt"), Instant::now());
        debounce.push(added("a.txt"), Instant::now());
        debounce.push(added("c.txt"), Instant::now());
        assert!(debounce.next_deadline().is_some());

        advance(Duration::from_millis(50)).await;

        assert_eq!(
            debounce.drain_due(Instant::now()),
            vec![added("b.txt"), added("a.txt"), added("c.txt")]
        );
        assert!(debounce.next_deadline().is_none());
    }
}
