//! Published aggregate view of the analysis

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle of the analysis loop as seen by readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Initializing,
    Running,
    /// The input could not be opened or read
    Error,
    /// Terminal state after a stop request or end of input without looping
    Stopped,
}

impl SystemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemStatus::Initializing => "initializing",
            SystemStatus::Running => "running",
            SystemStatus::Error => "error",
            SystemStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable, versioned aggregate.
///
/// Field names on the wire follow the dashboard's vocabulary (`total_fish`,
/// `species`, `geofence_crossed`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tracks alive after eviction for the latest processed frame
    #[serde(rename = "total_fish")]
    pub total_active: usize,
    /// Per-label detection counts for the latest processed frame only
    #[serde(rename = "species")]
    pub class_counts: BTreeMap<String, usize>,
    #[serde(rename = "geofence_crossed")]
    pub boundary_crossed: bool,
    pub frame_count: u64,
    pub last_updated: DateTime<Utc>,
    /// Assigned by the store on publish, strictly increasing
    pub version: u64,
    pub status: SystemStatus,
}

impl Snapshot {
    /// Snapshot held by a store before anything has been published
    pub fn initial() -> Self {
        Self {
            total_active: 0,
            class_counts: BTreeMap::new(),
            boundary_crossed: false,
            frame_count: 0,
            last_updated: Utc::now(),
            version: 0,
            status: SystemStatus::Initializing,
        }
    }

    /// Empty aggregate with the given status, used at discontinuities
    pub fn empty(status: SystemStatus) -> Self {
        Self {
            status,
            ..Self::initial()
        }
    }

    /// Total detections in the latest frame, across all labels
    pub fn total_detections(&self) -> usize {
        self.class_counts.values().sum()
    }
}
