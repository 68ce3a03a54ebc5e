//! Progress reporting and cancellation support.
//!
//! [`ProgressCallback`] observes a running analysis, and [`CancellationToken`]
//! stops one cooperatively. Hashing reports progress in bytes, frame
//! scanning in frames.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vidguard::{AnalysisConfig, Analyzer, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.1}% complete", info.operation);
//!         }
//!     }
//! }
//!
//! let config = AnalysisConfig::new().with_progress(Arc::new(PrintProgress));
//! let report = Analyzer::new(config).analyze("input.mp4")?;
//! # Ok::<(), vidguard::VidGuardError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// The kind of work a progress update refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Hashing the raw file bytes. Units are bytes.
    Hashing,
    /// Decoding and comparing frames. Units are frames.
    FrameScan,
}

/// A snapshot of progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// Units processed so far.
    pub current: u64,
    /// Total units expected, if known ahead of time.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the operation started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// The frame currently being processed (frame scan only).
    pub current_frame: Option<u64>,
}

/// Trait for receiving progress updates.
///
/// Must be [`Send`] and [`Sync`]: hashing reports from its own thread.
/// Callbacks only observe; use [`CancellationToken`] to stop a run.
pub trait ProgressCallback: Send + Sync {
    /// Called at regular intervals during an operation.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. The default.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clones share state. The analysis checks the token before each frame and
/// after each hashed chunk; a cancelled run returns
/// [`VidGuardError::Cancelled`](crate::VidGuardError::Cancelled) and releases
/// its file and decoder handles.
///
/// ```
/// use vidguard::CancellationToken;
///
/// let token = CancellationToken::new();
/// let shared = token.clone();
/// shared.cancel();
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

    /// Request cancellation. All clones observe it.
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

/// Tracks progress timing and emits callbacks every `batch_size` units.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    current: u64,
    batch_size: u64,
    start_time: Instant,
    units_since_last_report: u64,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total: total.filter(|&total| total > 0),
            current: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            units_since_last_report: 0,
        }
    }

    /// Record `units` more completed units.
    pub(crate) fn advance_by(&mut self, units: u64, frame: Option<u64>) {
        self.current += units;
        self.units_since_last_report += units;

        if self.units_since_last_report >= self.batch_size {
            self.report(frame);
            self.units_since_last_report = 0;
        }
    }

    /// Unconditionally emit a final report.
    pub(crate) fn finish(&mut self) {
        self.report(None);
    }

    fn report(&self, frame: Option<u64>) {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total
            .map(|total| ((self.current as f64 / total as f64) * 100.0).min(100.0) as f32);

        let estimated_remaining = match self.total {
            Some(total) if self.current > 0 => {
                let remaining = total.saturating_sub(self.current);
                Some(elapsed.mul_f64(remaining as f64 / self.current as f64))
            }
            _ => None,
        };

        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_frame: frame,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(u64, Option<f32>)>>);

    impl ProgressCallback for Recorder {
        fn on_progress(&self, info: &ProgressInfo) {
            self.0.lock().unwrap().push((info.current, info.percentage));
        }
    }

    #[test]
    fn tracker_reports_in_batches() {
        let recorder = Arc::new(Recorder::default());
        let mut tracker =
            ProgressTracker::new(recorder.clone(), OperationType::FrameScan, Some(10), 4);
        for frame in 0..10 {
            tracker.advance_by(1, Some(frame));
        }
        tracker.finish();

        let reports = recorder.0.lock().unwrap();
        let counts: Vec<u64> = reports.iter().map(|(current, _)| *current).collect();
        assert_eq!(counts, [4, 8, 10]);
        assert_eq!(reports.last().unwrap().1, Some(100.0));
    }

    #[test]
    fn unknown_total_has_no_percentage() {
        let recorder = Arc::new(Recorder::default());
        let mut tracker = ProgressTracker::new(recorder.clone(), OperationType::Hashing, Some(0), 1);
        tracker.advance_by(4096, None);
        assert_eq!(recorder.0.lock().unwrap()[0], (4096, None));
    }
}
