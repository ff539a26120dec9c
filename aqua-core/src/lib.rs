//! aqua-core: shared types for the AquaAnalyzer workspace
//!
//! Detection inputs, the published snapshot, configuration and the
//! workspace-wide error type live here so the engine and the HTTP surface
//! agree on one vocabulary.

pub mod types;
pub mod snapshot;
pub mod error;
pub mod config;

pub use error::{Error, Result};
pub use types::{BoundingBox, DetectedObject, FrameIndex, TrackId, UNKNOWN_LABEL};
pub use snapshot::{Snapshot, SystemStatus};
pub use config::{AquaConfig, ConfigError, EndOfInput};
