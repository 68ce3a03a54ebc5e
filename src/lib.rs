//! # vidguard
//!
//! Video integrity analysis: fingerprint a video file, read its container
//! metadata, and flag frames that look inserted, replaced or removed.
//!
//! A run produces an [`IntegrityReport`] with the stream metadata, a
//! lowercase hex digest of the file's bytes, and the ascending indices of
//! suspect frames. Frames are decoded through FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate and compared
//! pairwise; a frame is flagged when its difference from its predecessor
//! spikes above an adaptive baseline of recent differences.
//!
//! ## Quick Start
//!
//! ### Analyse a File
//!
//! ```no_run
//! let report = vidguard::analyze("input.mp4")?;
//! report.write_to("output/report.json")?;
//!
//! println!("{} ({})", report.hash, report.metadata.resolution());
//! println!("altered frames: {:?}", report.altered_frames.as_slice());
//! # Ok::<(), vidguard::VidGuardError>(())
//! ```
//!
//! ### Tune the Detector
//!
//! ```no_run
//! use vidguard::{AnalysisConfig, Analyzer, DetectorConfig, DigestAlgorithm};
//!
//! let config = AnalysisConfig::new()
//!     .with_digest_algorithm(DigestAlgorithm::Sha256)
//!     .with_detector(
//!         DetectorConfig::new()
//!             .sensitivity_multiplier(6.0)
//!             .min_score(0.1),
//!     );
//! let report = Analyzer::new(config).analyze("input.mp4")?;
//! # Ok::<(), vidguard::VidGuardError>(())
//! ```
//!
//! ### Hash Only
//!
//! ```no_run
//! use vidguard::DigestAlgorithm;
//!
//! let md5 = vidguard::hash_file("input.mp4", DigestAlgorithm::Md5)?;
//! # Ok::<(), vidguard::VidGuardError>(())
//! ```
//!
//! ## Features
//!
//! - **Streaming hash**: MD5 (default), SHA-256 or BLAKE3 in fixed-size
//!   chunks, concurrently with decoding
//! - **Adaptive detection**: rolling mean plus a multiple of the standard
//!   deviation, with a configurable floor
//! - **Pluggable decoding**: any [`FrameSource`]; [`MemorySource`] for
//!   synthetic or pre-decoded frames
//! - **Progress & cancellation**: [`ProgressCallback`] and
//!   [`CancellationToken`]
//! - **Stable report format**: `metadata`, `hash` and `altered_frames` JSON
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | [`analyze_async`] runs a report on a Tokio blocking thread |
//! | `rayon` | [`Analyzer::analyze_many`] analyses files in parallel |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod analysis;
pub mod compare;
pub mod configuration;
mod conversion;
pub mod decoder;
pub mod detect;
pub mod error;
pub mod ffmpeg;
pub mod frame;
pub mod hash;
pub mod metadata;
pub mod progress;
#[cfg(feature = "rayon")]
mod rayon;
pub mod report;
pub mod source;
#[cfg(feature = "async")]
pub mod task;

pub use analysis::{AnalysisState, Analyzer, analyze};
pub use compare::{DEFAULT_PIXEL_THRESHOLD, DissimilarityMetric, ScoreStream, compare};
pub use configuration::AnalysisConfig;
pub use decoder::{FfmpegFrames, FfmpegSource};
pub use detect::{
    AlterationDetector, AlteredFrameSet, DetectorConfig, FlagReason, Observation, detect,
};
pub use error::{ErrorKind, VidGuardError};
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use frame::FrameSample;
pub use hash::{
    DEFAULT_CHUNK_SIZE, DigestAlgorithm, HashAccumulator, StreamingDigest, hash_file,
    hash_file_with_config,
};
pub use metadata::{FrameCountSource, VideoMetadata};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use report::IntegrityReport;
pub use source::{FrameIter, FrameSource, MemorySource, OpenedSource};
#[cfg(feature = "async")]
pub use task::{AnalysisFuture, analyze_async};
