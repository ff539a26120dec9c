//! Frame sources and detectors feeding the analysis loop
//!
//! Decoding video and running the tracker happen outside this crate. A
//! [`FrameSource`] yields opaque frames in order and can rewind; a
//! [`Detector`] turns one frame into the tracked objects it contains.

pub mod classes;
pub mod memory;
pub mod replay;

pub use classes::ClassNames;
pub use memory::{IdentityDetector, MemorySource};
pub use replay::{RecordedDetection, ReplayDetector, ReplaySource};

use crate::error::VisionError;
use aqua_core::DetectedObject;

/// Ordered frames with an end-of-input signal
pub trait FrameSource: Send {
    type Frame: Send;

    /// Open the input. Failure here is fatal for the analysis loop.
    fn open(&mut self) -> Result<(), VisionError>;

    /// Next frame, or `None` at end of input
    fn next_frame(&mut self) -> Result<Option<Self::Frame>, VisionError>;

    /// Restart from the first frame
    fn rewind(&mut self) -> Result<(), VisionError>;

    /// Native frame rate, when the input reports one
    fn frame_rate(&self) -> Option<f64> {
        None
    }
}

/// Runs detection and tracking for a single frame.
///
/// Confidence and overlap thresholds belong to the implementation and are
/// opaque to the loop. An error fails only the frame it was raised for.
pub trait Detector<F>: Send {
    fn detect(&mut self, frame: &F) -> Result<Vec<DetectedObject>, VisionError>;
}
