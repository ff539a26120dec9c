//! Sliding-window registry of tracked identities

use aqua_core::{FrameIndex, TrackId};
use std::collections::HashMap;
use tracing::debug;

/// Maps each persistent identifier to the last frame it was observed in.
///
/// A track stays active while `current - last_seen <= lifetime`. Eviction
/// runs once per processed frame, after every observation for that frame.
#[derive(Debug, Default)]
pub struct TrackRegistry {
    last_seen: HashMap<TrackId, FrameIndex>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or refresh a track
    pub fn observe(&mut self, id: TrackId, frame_index: FrameIndex) {
        let entry = self.last_seen.entry(id).or_insert(frame_index);
        // Re-observation never moves a track backwards in time
        if frame_index > *entry {
            *entry = frame_index;
        }
    }

    /// Drop tracks older than `lifetime` frames and return the identifiers
    /// still active, in ascending order
    pub fn evict(&mut self, current_frame: FrameIndex, lifetime: u64) -> Vec<TrackId> {
        let before = self.last_seen.len();
        self.last_seen
            .retain(|_, last_seen| current_frame.saturating_sub(*last_seen) <= lifetime);

        let evicted = before - self.last_seen.len();
        if evicted > 0 {
            debug!("Evicted {} stale tracks at frame {}", evicted, current_frame);
        }

        let mut active: Vec<TrackId> = self.last_seen.keys().copied().collect();
        active.sort_unstable();
        active
    }

    pub fn count(&self) -> usize {
        self.last_seen.len()
    }

    pub fn last_seen(&self, id: TrackId) -> Option<FrameIndex> {
        self.last_seen.get(&id).copied()
    }

    /// Forget every track; used when the input restarts
    pub fn clear(&mut self) {
        self.last_seen.clear();
    }
}
