//! Analysis orchestration.
//!
//! [`Analyzer`] runs the whole pipeline for one file: open the source, hash
//! the raw bytes, score consecutive frames, feed the detector, and assemble
//! an [`IntegrityReport`]. Hashing reads the file through its own handle on
//! a scoped thread while frames are decoded on the calling thread, and the
//! report is only built once both have finished. Any failure aborts the run;
//! there is no partial report.
//!
//! # Example
//!
//! ```no_run
//! use vidguard::{AnalysisConfig, Analyzer, DetectorConfig};
//!
//! let config = AnalysisConfig::new()
//!     .with_detector(DetectorConfig::new().sensitivity_multiplier(5.0));
//! let mut analyzer = Analyzer::new(config);
//! let report = analyzer.analyze("input.mp4")?;
//!
//! println!("{} frames, hash {}", report.metadata.frame_count, report.hash);
//! for index in report.altered_frames.iter() {
//!     println!("frame {index} looks altered");
//! }
//! # Ok::<(), vidguard::VidGuardError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    panic,
    path::Path,
    sync::Arc,
    thread,
};

use crate::{
    compare::ScoreStream,
    configuration::AnalysisConfig,
    decoder::FfmpegSource,
    detect::{AlterationDetector, AlteredFrameSet},
    error::VidGuardError,
    hash::hash_file_until,
    metadata::{FrameCountSource, VideoMetadata},
    progress::{CancellationToken, OperationType},
    report::IntegrityReport,
    source::{FrameIter, FrameSource, OpenedSource},
};

/// Lifecycle of an [`Analyzer`] run.
///
/// `Idle → Opened → Scanning → Assembled → Done`, with `Failed` reachable
/// from every state before `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    /// No run started, or about to start.
    Idle,
    /// Source opened and metadata read.
    Opened,
    /// Hashing and frame scanning in progress.
    Scanning,
    /// Hash and detector results joined into a report.
    Assembled,
    /// Report handed to the caller.
    Done,
    /// The last run returned an error.
    Failed,
}

/// Runs integrity analyses with one configuration and one frame source.
///
/// An analyzer can be reused for any number of files; each call to
/// [`analyze`](Self::analyze) is an independent run.
#[derive(Clone)]
pub struct Analyzer {
    source: Arc<dyn FrameSource>,
    config: AnalysisConfig,
    state: AnalysisState,
}

impl Debug for Analyzer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl Analyzer {
    /// Create an analyzer that decodes with FFmpeg.
    pub fn new(config: AnalysisConfig) -> Self {
        Self::with_source(FfmpegSource, config)
    }

    /// Create an analyzer that decodes through `source`.
    pub fn with_source<S: FrameSource + 'static>(source: S, config: AnalysisConfig) -> Self {
        Self {
            source: Arc::new(source),
            config,
            state: AnalysisState::Idle,
        }
    }

    /// State reached by the current or most recent run.
    pub fn state(&self) -> AnalysisState {
        self.state
    }

    /// Configuration used for every run.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Open `path` and return its metadata without hashing or scanning.
    pub fn probe<P: AsRef<Path>>(&self, path: P) -> Result<VideoMetadata, VidGuardError> {
        let OpenedSource { metadata, .. } = self.source.open(path.as_ref())?;
        Ok(metadata)
    }

    /// Analyse one file.
    ///
    /// # Errors
    ///
    /// - [`VidGuardError::InvalidConfiguration`] before anything is opened.
    /// - [`VidGuardError::SourceUnavailable`] or
    ///   [`VidGuardError::UnsupportedFormat`] from opening the source.
    /// - [`VidGuardError::IoFailure`] or [`VidGuardError::DecodeFailure`]
    ///   from hashing or decoding.
    /// - [`VidGuardError::Cancelled`] if the configured token fires.
    pub fn analyze<P: AsRef<Path>>(&mut self, path: P) -> Result<IntegrityReport, VidGuardError> {
        let path = path.as_ref();
        self.transition(AnalysisState::Idle);

        match self.run(path) {
            Ok(report) => {
                self.transition(AnalysisState::Done);
                Ok(report)
            }
            Err(error) => {
                log::debug!("Analysis of {} failed: {error}", path.display());
                self.transition(AnalysisState::Failed);
                Err(error)
            }
        }
    }

    /// Analyse several files, one independent run each.
    ///
    /// Results are returned in input order; a failure on one file does not
    /// affect the others. With the `rayon` feature the runs execute in
    /// parallel.
    pub fn analyze_many<P>(&self, paths: &[P]) -> Vec<Result<IntegrityReport, VidGuardError>>
    where
        P: AsRef<Path> + Sync,
    {
        #[cfg(feature = "rayon")]
        {
            crate::rayon::analyze_parallel(self, paths)
        }

        #[cfg(not(feature = "rayon"))]
        {
            paths
                .iter()
                .map(|path| self.fresh().analyze(path))
                .collect()
        }
    }

    /// Analyse `path` on a blocking worker thread.
    ///
    /// Must be called from within a Tokio runtime.
    #[cfg(feature = "async")]
    pub fn analyze_async<P: Into<std::path::PathBuf>>(&self, path: P) -> crate::task::AnalysisFuture {
        crate::task::spawn_analysis(self.fresh(), path.into())
    }

    /// A copy of this analyzer with no run history.
    pub(crate) fn fresh(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            config: self.config.clone(),
            state: AnalysisState::Idle,
        }
    }

    fn transition(&mut self, next: AnalysisState) {
        if self.state != next {
            log::debug!("Analysis state {:?} -> {next:?}", self.state);
        }
        self.state = next;
    }

    fn run(&mut self, path: &Path) -> Result<IntegrityReport, VidGuardError> {
        self.config.validate()?;

        let OpenedSource { metadata, frames } = self.source.open(path)?;
        log::debug!(
            "Opened {}: {} at {:.3} fps, {} frames ({:?}), codec {}",
            path.display(),
            metadata.resolution(),
            metadata.fps,
            metadata.frame_count,
            metadata.frame_count_source,
            metadata.codec,
        );
        log::debug!("Analysis parameters: {:?}", self.config);
        self.transition(AnalysisState::Opened);

        self.transition(AnalysisState::Scanning);
        let config = &self.config;
        let (hash, scan) = if config.concurrent_hashing {
            scan_with_concurrent_hash(path, frames, &metadata, config)?
        } else {
            let hash = hash_file_until(path, config, None)?;
            (hash, scan_frames(frames, &metadata, config, None)?)
        };

        let report = assemble(path, metadata, hash, scan, config);
        self.transition(AnalysisState::Assembled);
        Ok(report)
    }
}

/// Analyse `path` with default settings and the FFmpeg decoder.
pub fn analyze<P: AsRef<Path>>(path: P) -> Result<IntegrityReport, VidGuardError> {
    Analyzer::default().analyze(path)
}

/// Outcome of the frame pass.
struct FrameScan {
    altered_frames: AlteredFrameSet,
    decoded: u64,
}

/// Hash on a scoped thread while scanning frames here.
///
/// Whichever side fails first stops the other. Its error is the one
/// returned.
fn scan_with_concurrent_hash(
    path: &Path,
    frames: FrameIter,
    metadata: &VideoMetadata,
    config: &AnalysisConfig,
) -> Result<(String, FrameScan), VidGuardError> {
    let stop_hash = CancellationToken::new();
    let stop_scan = CancellationToken::new();

    thread::scope(|scope| {
        let hasher = scope.spawn(|| {
            let hash = hash_file_until(path, config, Some(&stop_hash));
            if hash.is_err() {
                stop_scan.cancel();
            }
            hash
        });

        let scan = scan_frames(frames, metadata, config, Some(&stop_scan));
        if scan.is_err() {
            stop_hash.cancel();
        }

        let hash = hasher
            .join()
            .unwrap_or_else(|payload| panic::resume_unwind(payload));
        match (hash, scan) {
            (Ok(hash), Ok(scan)) => Ok((hash, scan)),
            (Err(error), Err(VidGuardError::Cancelled)) if !config.is_cancelled() => Err(error),
            (_, Err(error)) | (Err(error), _) => Err(error),
        }
    })
}

/// Drive the frame stream through the comparator and the detector.
fn scan_frames(
    frames: FrameIter,
    metadata: &VideoMetadata,
    config: &AnalysisConfig,
    stop: Option<&CancellationToken>,
) -> Result<FrameScan, VidGuardError> {
    let mut detector = AlterationDetector::new(config.detector.clone())?;
    let total = metadata.frame_count_is_declared().then_some(metadata.frame_count);
    let mut tracker = config.tracker(OperationType::FrameScan, total);
    let mut scores = ScoreStream::new(frames, config.metric);
    let mut reported = 0;

    loop {
        if config.is_cancelled() || stop.is_some_and(CancellationToken::is_cancelled) {
            return Err(VidGuardError::Cancelled);
        }
        let Some(next) = scores.next() else {
            break;
        };
        let (index, observation) = next?;
        if detector.observe(index, observation).is_some() && config.detector.suppress_return_edges {
            scores.mark_flagged();
        }

        let seen = scores.frames_seen();
        tracker.advance_by(seen - reported, Some(index));
        reported = seen;
    }

    let decoded = scores.frames_seen();
    if decoded == 0 {
        return Err(VidGuardError::UnsupportedFormat(
            "no frames could be decoded".to_string(),
        ));
    }
    tracker.advance_by(decoded - reported, None);
    tracker.finish();

    Ok(FrameScan {
        altered_frames: detector.finish(),
        decoded,
    })
}

fn assemble(
    path: &Path,
    mut metadata: VideoMetadata,
    hash: String,
    scan: FrameScan,
    config: &AnalysisConfig,
) -> IntegrityReport {
    if metadata.frame_count_is_declared() {
        if metadata.frame_count != scan.decoded {
            log::warn!(
                "{} declares {} frames but {} were decoded",
                path.display(),
                metadata.frame_count,
                scan.decoded,
            );
        }
    } else {
        metadata.frame_count = scan.decoded;
        metadata.frame_count_source = FrameCountSource::Decoded;
    }

    log::info!(
        "Analysed {}: {} frames, {} flagged, {} {}",
        path.display(),
        scan.decoded,
        scan.altered_frames.len(),
        config.digest_algorithm,
        hash,
    );

    IntegrityReport {
        metadata,
        hash,
        altered_frames: scan.altered_frames,
        algorithm: config.digest_algorithm,
        decoded_frame_count: scan.decoded,
    }
}
