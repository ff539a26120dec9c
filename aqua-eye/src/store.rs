//! Single source of truth for published snapshots

use aqua_core::{Snapshot, SystemStatus};
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Holds the latest [`Snapshot`] behind a pointer swap.
///
/// Publishing builds the complete snapshot first and replaces the stored
/// `Arc` under the write lock, so a reader sees either the previous snapshot
/// or the new one, never a mix. Readers hold the lock only long enough to
/// clone the `Arc`.
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::with_initial(Snapshot::initial())
    }

    pub fn with_initial(snapshot: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Replace the stored snapshot. The version and timestamp are assigned
    /// here; the returned version is strictly greater than any before it.
    pub fn publish(&self, mut snapshot: Snapshot) -> u64 {
        let mut current = self.current.write();
        let version = current.version + 1;
        snapshot.version = version;
        snapshot.last_updated = Utc::now().max(current.last_updated);
        *current = Arc::new(snapshot);
        debug!("Published snapshot version {}", version);
        version
    }

    /// Re-publish the current aggregate with a new status
    pub fn set_status(&self, status: SystemStatus) -> u64 {
        self.update(|snapshot| snapshot.status = status)
    }

    /// Copy the current snapshot, modify the copy, publish it. Runs under the
    /// write lock so concurrent updates cannot lose each other's changes.
    pub fn update<F>(&self, modify: F) -> u64
    where
        F: FnOnce(&mut Snapshot),
    {
        let mut current = self.current.write();
        let mut next = Snapshot::clone(&current);
        modify(&mut next);
        next.version = current.version + 1;
        next.last_updated = Utc::now().max(current.last_updated);
        let version = next.version;
        *current = Arc::new(next);
        version
    }

    /// Immutable handle on the current snapshot
    pub fn read(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    pub fn status(&self) -> SystemStatus {
        self.current.read().status
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
