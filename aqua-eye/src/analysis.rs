//! The background analysis loop
//!
//! Pulls frames from a [`FrameSource`], runs the [`Detector`] on every Nth
//! frame, folds the detections into the track registry and frame tally,
//! publishes one [`Snapshot`] per processed frame and hands the crossing flag
//! to the [`AlertThrottle`].
//!
//! State machine: `initializing -> running -> (error | stopped)`. A source
//! that cannot be opened or read is fatal. A failure inside one frame is
//! logged, kept in a bounded [`RecentErrors`] log, and skipped.

use crate::alert::AlertThrottle;
use crate::error::VisionError;
use crate::processing::{boundary, FrameTally, TrackRegistry};
use crate::source::{Detector, FrameSource};
use crate::store::SnapshotStore;
use aqua_core::config::{AnalysisConfig, EndOfInput};
use aqua_core::{FrameIndex, Snapshot, SystemStatus};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How a run of the loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// End of input with `end_of_input = stop`
    Completed,
    /// A stop was requested
    Stopped,
    /// The source could not be opened or read
    Failed(String),
}

/// Counters maintained by the loop
#[derive(Debug, Default)]
pub struct LoopStats {
    frames_read: AtomicU64,
    frames_processed: AtomicU64,
    frames_failed: AtomicU64,
    loops_completed: AtomicU64,
    alerts_fired: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoopStatsView {
    pub frames_read: u64,
    pub frames_processed: u64,
    pub frames_failed: u64,
    pub loops_completed: u64,
    pub alerts_fired: u64,
}

impl LoopStats {
    pub fn view(&self) -> LoopStatsView {
        LoopStatsView {
            frames_read: self.frames_read.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_failed: self.frames_failed.load(Ordering::Relaxed),
            loops_completed: self.loops_completed.load(Ordering::Relaxed),
            alerts_fired: self.alerts_fired.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// One recovered failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameError {
    pub frame_index: FrameIndex,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Bounded log of the most recent failures; the oldest entry is dropped
/// when full
#[derive(Debug)]
pub struct RecentErrors {
    capacity: usize,
    entries: Mutex<VecDeque<FrameError>>,
}

impl RecentErrors {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, frame_index: FrameIndex, message: impl Into<String>) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(FrameError {
            frame_index,
            message: message.into(),
            at: Utc::now(),
        });
    }

    /// Entries oldest first
    pub fn entries(&self) -> Vec<FrameError> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Handle for observing and stopping a loop from other tasks
#[derive(Debug, Clone)]
pub struct AnalysisControl {
    stop_requested: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    stats: Arc<LoopStats>,
    errors: Arc<RecentErrors>,
}

impl AnalysisControl {
    /// Ask the loop to finish its current frame and exit
    pub fn stop(&self) {
        if !self.stop_requested.swap(true, Ordering::AcqRel) {
            info!("Analysis stop requested");
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> LoopStatsView {
        self.stats.view()
    }

    pub fn recent_errors(&self) -> Vec<FrameError> {
        self.errors.entries()
    }
}

pub struct AnalysisLoop<S, D>
where
    S: FrameSource,
    D: Detector<S::Frame>,
{
    source: S,
    detector: D,
    store: Arc<SnapshotStore>,
    throttle: AlertThrottle,
    registry: TrackRegistry,
    tally: FrameTally,
    config: AnalysisConfig,
    default_fps: f64,
    stats: Arc<LoopStats>,
    errors: Arc<RecentErrors>,
    stop_requested: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
}

impl<S, D> AnalysisLoop<S, D>
where
    S: FrameSource,
    D: Detector<S::Frame>,
{
    pub fn new(
        source: S,
        detector: D,
        store: Arc<SnapshotStore>,
        throttle: AlertThrottle,
        config: AnalysisConfig,
    ) -> Self {
        let errors = Arc::new(RecentErrors::new(config.max_recent_errors));
        Self {
            source,
            detector,
            store,
            throttle,
            registry: TrackRegistry::new(),
            tally: FrameTally::new(),
            config,
            default_fps: 30.0,
            stats: Arc::new(LoopStats::default()),
            errors,
            stop_requested: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Frame rate used for pacing when the source reports none
    pub fn with_default_fps(mut self, fps: f64) -> Self {
        self.default_fps = fps;
        self
    }

    pub fn control(&self) -> AnalysisControl {
        AnalysisControl {
            stop_requested: self.stop_requested.clone(),
            active: self.active.clone(),
            stats: self.stats.clone(),
            errors: self.errors.clone(),
        }
    }

    /// Run on the tokio runtime until the loop ends
    pub fn spawn(self) -> JoinHandle<LoopOutcome>
    where
        S: 'static,
        D: 'static,
    {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) -> LoopOutcome {
        self.active.store(true, Ordering::Release);
        let outcome = self.run_inner().await;
        self.active.store(false, Ordering::Release);
        info!("Analysis loop finished: {:?}", outcome);
        outcome
    }

    async fn run_inner(&mut self) -> LoopOutcome {
        if let Err(e) = self.source.open() {
            return self.fail(0, e);
        }
        self.store.set_status(SystemStatus::Running);

        let frame_interval = self.frame_interval();
        info!(
            "Analysis running: stride {}, lifetime {} frames, boundary y={}, {:?} per frame",
            self.config.frame_stride, self.config.lifetime_frames, self.config.boundary_y, frame_interval
        );

        let mut frame_index: FrameIndex = 0;
        let mut frames_this_pass: u64 = 0;

        loop {
            if self.stop_requested.load(Ordering::Acquire) {
                self.store.set_status(SystemStatus::Stopped);
                return LoopOutcome::Stopped;
            }

            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    if frames_this_pass == 0 {
                        warn!("Input contains no frames, stopping analysis");
                        self.store.set_status(SystemStatus::Stopped);
                        return LoopOutcome::Completed;
                    }
                    match self.config.end_of_input {
                        EndOfInput::Loop => {
                            if let Err(e) = self.restart() {
                                return self.fail(frame_index, e);
                            }
                            frame_index = 0;
                            frames_this_pass = 0;
                            continue;
                        }
                        EndOfInput::Stop => {
                            info!("End of input after {} frames", frames_this_pass);
                            self.store.set_status(SystemStatus::Stopped);
                            return LoopOutcome::Completed;
                        }
                    }
                }
                Err(e) if e.is_fatal() => return self.fail(frame_index, e),
                Err(e) => {
                    self.record_failure(frame_index, &e);
                    frame_index += 1;
                    frames_this_pass += 1;
                    continue;
                }
            };
            LoopStats::bump(&self.stats.frames_read);
            frames_this_pass += 1;

            if frame_index % self.config.frame_stride.max(1) == 0 {
                match self.process_frame(&frame, frame_index) {
                    Ok(crossed) => {
                        LoopStats::bump(&self.stats.frames_processed);
                        if self.throttle.maybe_fire(crossed, Instant::now()).await {
                            LoopStats::bump(&self.stats.alerts_fired);
                        }
                    }
                    Err(e) => self.record_failure(frame_index, &e),
                }
            }
            frame_index += 1;

            if self.config.realtime {
                tokio::time::sleep(frame_interval).await;
            } else {
                tokio::task::yield_now().await;
            }
        }
    }

    /// Aggregate one frame and publish it. Returns the frame-level crossing
    /// flag. Nothing is published when detection fails.
    fn process_frame(&mut self, frame: &S::Frame, frame_index: FrameIndex) -> Result<bool, VisionError> {
        let objects = self.detector.detect(frame)?;

        self.tally.reset();
        for object in &objects {
            if let Some(id) = object.track_id {
                self.registry.observe(id, frame_index);
            }
            self.tally.record(object.label_or_unknown());
        }
        let crossed = boundary::frame_crossed(&objects, self.config.boundary_y);
        self.registry.evict(frame_index, self.config.lifetime_frames);

        let version = self.store.publish(Snapshot {
            total_active: self.registry.count(),
            class_counts: self.tally.to_counts(),
            boundary_crossed: crossed,
            frame_count: frame_index,
            last_updated: Utc::now(),
            version: 0,
            status: SystemStatus::Running,
        });
        debug!(
            "Frame {}: {} detections, {} active tracks, crossed={} (v{})",
            frame_index,
            objects.len(),
            self.registry.count(),
            crossed,
            version
        );
        Ok(crossed)
    }

    /// Start the input over. A discontinuity, not an error: state is cleared
    /// and an empty snapshot marks the restart.
    fn restart(&mut self) -> Result<(), VisionError> {
        self.source.rewind()?;
        self.registry.clear();
        self.tally.reset();
        LoopStats::bump(&self.stats.loops_completed);
        self.store.publish(Snapshot::empty(SystemStatus::Running));
        info!("End of input, restarting from the first frame");
        Ok(())
    }

    fn record_failure(&self, frame_index: FrameIndex, err: &VisionError) {
        warn!("Frame {} processing error: {}", frame_index, err);
        LoopStats::bump(&self.stats.frames_failed);
        self.errors.push(frame_index, err.to_string());
    }

    fn fail(&self, frame_index: FrameIndex, err: VisionError) -> LoopOutcome {
        error!("Input unavailable: {}", err);
        self.errors.push(frame_index, err.to_string());
        self.store.set_status(SystemStatus::Error);
        LoopOutcome::Failed(err.to_string())
    }

    fn frame_interval(&self) -> Duration {
        let fps = self
            .source
            .frame_rate()
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .unwrap_or(self.default_fps);
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };
        Duration::from_secs_f64(1.0 / fps)
    }
}
