//! Per-frame aggregation stages driven by the analysis loop

pub mod registry;
pub mod tally;
pub mod boundary;

pub use registry::TrackRegistry;
pub use tally::FrameTally;
pub use boundary::{crossed, frame_crossed};
