//! aqua-eye: track-lifecycle aggregation engine
//!
//! Consumes per-frame tracker output and keeps a versioned aggregate of
//! active tracks, per-class counts and geofence crossings. A single
//! background [`AnalysisLoop`] publishes into a [`SnapshotStore`] that any
//! number of readers can poll or stream from through a [`ChangeStream`].

pub mod processing;
pub mod alert;
pub mod analysis;
pub mod notify;
pub mod settings;
pub mod source;
pub mod store;
pub mod stream;
pub mod error;

pub use alert::AlertThrottle;
pub use analysis::{AnalysisControl, AnalysisLoop, FrameError, LoopOutcome, LoopStats, LoopStatsView, RecentErrors};
pub use error::VisionError;
pub use notify::{dispatch, DispatchOutcome, LogNotifier, NotificationReceipt, Notifier, SmsNotifier};
pub use settings::{RuntimeSettings, SettingsUpdate, SettingsView};
pub use source::{ClassNames, Detector, FrameSource, IdentityDetector, MemorySource, ReplayDetector, ReplaySource};
pub use store::SnapshotStore;
pub use stream::ChangeStream;
