//! In-memory frames, for embedding and tests

use crate::error::VisionError;
use crate::source::{Detector, FrameSource};
use aqua_core::DetectedObject;

/// Serves pre-built detection lists as frames
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    frames: Vec<Vec<DetectedObject>>,
    position: usize,
    fps: Option<f64>,
    unavailable: bool,
    opened: bool,
    rewinds: usize,
}

impl MemorySource {
    pub fn new(frames: Vec<Vec<DetectedObject>>) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    /// Source whose `open` always fails
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    pub fn rewinds(&self) -> usize {
        self.rewinds
    }
}

impl FrameSource for MemorySource {
    type Frame = Vec<DetectedObject>;

    fn open(&mut self) -> Result<(), VisionError> {
        if self.unavailable {
            return Err(VisionError::Source("Memory source is unavailable".to_string()));
        }
        self.opened = true;
        self.position = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Vec<DetectedObject>>, VisionError> {
        if !self.opened {
            return Err(VisionError::Source("Memory source is not open".to_string()));
        }
        let frame = self.frames.get(self.position).cloned();
        if frame.is_some() {
            self.position += 1;
        }
        Ok(frame)
    }

    fn rewind(&mut self) -> Result<(), VisionError> {
        self.position = 0;
        self.rewinds += 1;
        Ok(())
    }

    fn frame_rate(&self) -> Option<f64> {
        self.fps
    }
}

/// Frames that already are detections pass through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityDetector;

impl Detector<Vec<DetectedObject>> for IdentityDetector {
    fn detect(&mut self, frame: &Vec<DetectedObject>) -> Result<Vec<DetectedObject>, VisionError> {
        Ok(frame.clone())
    }
}
