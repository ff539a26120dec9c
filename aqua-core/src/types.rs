use serde::{Deserialize, Serialize};
use std::fmt;

/// Label recorded for detections whose class cannot be resolved to a name
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Index of a frame within the current pass over the input
pub type FrameIndex = u64;

/// Persistent identifier assigned by the external tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Axis-aligned box in frame pixel coordinates.
///
/// Serialized as `[x1, y1, x2, y2]`, the layout tracker output uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Build a box from two corners, ordering the coordinates so that
    /// `x1 <= x2` and `y1 <= y2` hold.
    /// NaN coordinates pass through unchanged.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let (x1, x2) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (y1, y2) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        Self { x1, y1, x2, y2 }
    }

    /// Bottom edge of the box
    pub fn bottom(&self) -> f32 {
        self.y2
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(c: [f32; 4]) -> Self {
        BoundingBox::new(c[0], c[1], c[2], c[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One detection returned by the tracker for a single frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    /// Absent for untracked detections
    pub track_id: Option<TrackId>,
    pub label: Option<String>,
    pub bbox: BoundingBox,
}

impl DetectedObject {
    pub fn new(track_id: Option<u64>, label: Option<&str>, bbox: BoundingBox) -> Self {
        Self {
            track_id: track_id.map(TrackId),
            label: label.map(str::to_string),
            bbox,
        }
    }

    /// Class label, or [`UNKNOWN_LABEL`] when the detector could not name it
    pub fn label_or_unknown(&self) -> &str {
        match self.label.as_deref() {
            Some(label) if !label.trim().is_empty() => label,
            _ => UNKNOWN_LABEL,
        }
    }
}
