use aqua_core::UNKNOWN_LABEL;
use std::collections::BTreeMap;

/// Class-label histogram for the frame currently being processed.
///
/// Reset at the start of every processed frame; it never accumulates
/// across frames.
#[derive(Debug, Default, Clone)]
pub struct FrameTally {
    counts: BTreeMap<String, usize>,
}

impl FrameTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.counts.clear();
    }

    /// Count one detection. Empty labels land under [`UNKNOWN_LABEL`].
    pub fn record(&mut self, label: &str) {
        let label = if label.trim().is_empty() { UNKNOWN_LABEL } else { label };
        *self.counts.entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn counts(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }

    pub fn to_counts(&self) -> BTreeMap<String, usize> {
        self.counts.clone()
    }
}
