//! Per-consumer change stream over the snapshot store

use crate::store::SnapshotStore;
use aqua_core::Snapshot;
use futures::stream::{self, Stream};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

/// Polls a [`SnapshotStore`] at a fixed interval and yields a snapshot only
/// when its version advanced past the last one this consumer received.
///
/// Each connected consumer owns its own `ChangeStream`, so versions are
/// delivered in increasing order with no duplicates per consumer. Intermediate
/// versions published between two ticks are skipped; consumers always get the
/// latest state.
pub struct ChangeStream {
    store: Arc<SnapshotStore>,
    poll: Duration,
    interval: Option<Interval>,
    last_sent: Option<u64>,
}

impl ChangeStream {
    pub fn new(store: Arc<SnapshotStore>, poll: Duration) -> Self {
        Self {
            store,
            poll,
            interval: None,
            last_sent: None,
        }
    }

    /// Check the store once without waiting. The first call always yields the
    /// current snapshot.
    pub fn poll_once(&mut self) -> Option<Arc<Snapshot>> {
        let snapshot = self.store.read();
        match self.last_sent {
            Some(sent) if snapshot.version <= sent => None,
            _ => {
                self.last_sent = Some(snapshot.version);
                Some(snapshot)
            }
        }
    }

    /// Wait for the next advanced version
    pub async fn next(&mut self) -> Arc<Snapshot> {
        loop {
            if let Some(snapshot) = self.poll_once() {
                return snapshot;
            }
            self.tick().await;
        }
    }

    async fn tick(&mut self) {
        let poll = self.poll;
        // Created lazily so a stream can be built outside a runtime
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = tokio::time::interval(poll);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        interval.tick().await;
    }

    pub fn last_sent(&self) -> Option<u64> {
        self.last_sent
    }

    /// Endless stream of advanced snapshots; ends only when dropped
    pub fn into_stream(self) -> impl Stream<Item = Arc<Snapshot>> + Send {
        stream::unfold(self, |mut changes| async move {
            let snapshot = changes.next().await;
            Some((snapshot, changes))
        })
    }
}
