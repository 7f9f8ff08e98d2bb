//! Progress reporting and cancellation support.
//!
//! [`ProgressCallback`] observes a scoring run, [`CancellationToken`] stops
//! one, and [`ProgressInfo`] is the snapshot handed to callbacks.
//!
//! Cancellation is coarse-grained: decoding checks the token before pulling
//! each frame and inference checks it before each batch. A call already in
//! flight (one frame decode, one classifier forward pass) is never
//! interrupted.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use forgery_score::{OperationType, ProgressCallback, ProgressInfo, ScoreOptions};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if info.operation == OperationType::Inference {
//!             println!("batch {}/{:?}", info.current, info.total);
//!         }
//!     }
//! }
//!
//! let options = ScoreOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// The pipeline stage currently reporting progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Decoding frames from the video file. Items are frames.
    Decoding,
    /// Preprocessing and classifying batches. Items are batches.
    Inference,
}

/// A snapshot of run progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Which stage is reporting.
    pub operation: OperationType,
    /// How many items have been processed so far.
    pub current: u64,
    /// Total items expected, if known. Decoding totals are container
    /// estimates and may be off for variable-frame-rate files.
    pub total: Option<u64>,
    /// Completion percentage (0.0 - 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time since the stage started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Index of the frame or batch just completed.
    pub current_item: Option<u64>,
}

/// Receives progress updates during a run.
///
/// Implementations must be [`Send`] and [`Sync`]. Callbacks observe but
/// cannot halt the run; use [`CancellationToken`] for that.
pub trait ProgressCallback: Send + Sync {
    /// Called as items complete.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all notifications. The default callback.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clones share state; cancelling any clone cancels them all.
///
/// ```
/// use forgery_score::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks timing for one stage and emits callbacks every `interval` items.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    current: u64,
    interval: u64,
    start_time: Instant,
    items_since_last_report: u64,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        interval: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            current: 0,
            interval: interval.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
        }
    }

    /// Record one completed item and report if the interval is reached.
    pub(crate) fn advance(&mut self, item: Option<u64>) {
        self.current += 1;
        self.items_since_last_report += 1;

        if self.items_since_last_report >= self.interval {
            self.report(item);
            self.items_since_last_report = 0;
        }
    }

    /// Emit a final report with the true total.
    pub(crate) fn finish(&mut self) {
        self.total = Some(self.current);
        self.report(None);
    }

    fn report(&self, item: Option<u64>) {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total
            .filter(|&total| total > 0)
            .map(|total| (self.current as f32 / total as f32 * 100.0).min(100.0));

        let estimated_remaining = if self.current > 0 {
            self.total.map(|total| {
                let remaining = total.saturating_sub(self.current);
                elapsed.mul_f64(remaining as f64 / self.current as f64)
            })
        } else {
            None
        };

        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_item: item,
        });
    }
}
