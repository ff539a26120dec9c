//! Error types for aqua-eye

use thiserror::Error;
use aqua_core::Error as CoreError;

#[derive(Error, Debug)]
pub enum VisionError {
    /// The input cannot be opened or read; fatal for the analysis loop
    #[error("Source error: {0}")]
    Source(String),

    /// Detection or aggregation failed for one frame; the loop recovers
    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl VisionError {
    /// Whether the analysis loop must stop on this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, VisionError::Source(_) | VisionError::Io(_))
    }
}

impl From<VisionError> for CoreError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::Source(msg) => CoreError::Source(msg),
            VisionError::Processing(msg) => CoreError::Detection(msg),
            VisionError::Notification(msg) => CoreError::Notification(msg),
            VisionError::Config(msg) => CoreError::Configuration(msg),
            VisionError::Core(core) => core,
            other => CoreError::Detection(other.to_string()),
        }
    }
}
