//! Replay of recorded tracker output
//!
//! The file holds one line per video frame, each a JSON array of detections:
//!
//! ```text
//! #fps=25
//! [{"id": 7, "class_id": 0, "bbox": [10, 20, 40, 60]}]
//! []
//! [{"id": 7, "class_name": "salmon", "bbox": [12, 22, 42, 62]}]
//! ```
//!
//! Lines starting with `#` are comments; a `#fps=<rate>` comment sets the
//! frame rate. Blank lines are ignored.

use crate::error::VisionError;
use crate::source::{ClassNames, Detector, FrameSource};
use aqua_core::{BoundingBox, DetectedObject, TrackId};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One detection as recorded by the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedDetection {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub class_id: Option<u32>,
    #[serde(default)]
    pub class_name: Option<String>,
    pub bbox: BoundingBox,
}

/// Reads frames (raw lines) from a recorded JSON Lines file
pub struct ReplaySource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    /// First frame, read ahead while scanning the header
    pending: Option<Result<String, VisionError>>,
    fps: Option<f64>,
    line_number: u64,
}

impl ReplaySource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            reader: None,
            pending: None,
            fps: None,
            line_number: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_line(&mut self) -> Result<Option<String>, VisionError> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| VisionError::Source("Replay source is not open".to_string()))?;

        loop {
            let mut bytes = Vec::new();
            let read = reader.read_until(b'\n', &mut bytes).map_err(|e| {
                VisionError::Source(format!(
                    "Failed to read {} after line {}: {}",
                    self.path.display(),
                    self.line_number,
                    e
                ))
            })?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            // The bytes are consumed either way, so a corrupt line fails only its own frame
            let line = String::from_utf8(bytes).map_err(|e| {
                VisionError::Processing(format!(
                    "Line {} of {} is not valid UTF-8: {}",
                    self.line_number,
                    self.path.display(),
                    e
                ))
            })?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix('#') {
                if let Some(fps) = parse_fps(comment) {
                    self.fps = Some(fps);
                }
                continue;
            }
            return Ok(Some(line.to_string()));
        }
    }

    /// Number of lines consumed since the last open
    pub fn line_number(&self) -> u64 {
        self.line_number
    }
}

fn parse_fps(comment: &str) -> Option<f64> {
    let value = comment.trim().strip_prefix("fps=")?;
    value.trim().parse::<f64>().ok().filter(|fps| fps.is_finite() && *fps > 0.0)
}

impl FrameSource for ReplaySource {
    type Frame = String;

    fn open(&mut self) -> Result<(), VisionError> {
        let file = File::open(&self.path).map_err(|e| {
            VisionError::Source(format!("Failed to open {}: {}", self.path.display(), e))
        })?;
        self.reader = Some(BufReader::new(file));
        self.line_number = 0;
        self.fps = None;
        // Header comments precede the first frame, so the frame rate is known
        // before the loop starts pacing
        self.pending = match self.read_line() {
            Ok(line) => line.map(Ok),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => Some(Err(e)),
        };

        info!(
            "Opened replay source {} ({} fps)",
            self.path.display(),
            self.fps.map(|fps| fps.to_string()).unwrap_or_else(|| "unknown".to_string())
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<String>, VisionError> {
        if let Some(frame) = self.pending.take() {
            return frame.map(Some);
        }
        self.read_line()
    }

    fn rewind(&mut self) -> Result<(), VisionError> {
        debug!("Rewinding replay source {}", self.path.display());
        self.open()
    }

    fn frame_rate(&self) -> Option<f64> {
        self.fps
    }
}

/// Turns recorded lines back into detections
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    classes: ClassNames,
}

impl ReplayDetector {
    pub fn new(classes: ClassNames) -> Self {
        Self { classes }
    }

    fn label(&self, detection: &RecordedDetection) -> Option<String> {
        match (&detection.class_name, detection.class_id) {
            (Some(name), _) => Some(name.clone()),
            (None, Some(id)) => Some(self.classes.resolve(id).to_string()),
            (None, None) => None,
        }
    }
}

impl Detector<String> for ReplayDetector {
    fn detect(&mut self, frame: &String) -> Result<Vec<DetectedObject>, VisionError> {
        let recorded: Vec<RecordedDetection> = serde_json::from_str(frame)
            .map_err(|e| VisionError::Processing(format!("Malformed frame record: {}", e)))?;

        recorded
            .into_iter()
            .map(|detection| {
                if !detection.bbox.is_finite() {
                    return Err(VisionError::Processing(format!(
                        "Non-finite bounding box {:?}",
                        detection.bbox
                    )));
                }
                Ok(DetectedObject {
                    track_id: detection.id.map(TrackId),
                    label: self.label(&detection),
                    bbox: detection.bbox,
                })
            })
            .collect()
    }
}
