//! Analysis configuration.
//!
//! [`AnalysisConfig`] is a builder that threads detector tuning, the
//! comparison metric, hashing options, progress callbacks and cancellation
//! through a run without widening every signature. A default-constructed
//! config hashes with MD5, compares with mean absolute difference, uses the
//! default [`DetectorConfig`], and hashes concurrently with the frame scan.
//!
//! # Example
//!
//! ```
//! use vidguard::{AnalysisConfig, CancellationToken, DetectorConfig, DigestAlgorithm};
//!
//! let token = CancellationToken::new();
//! let config = AnalysisConfig::new()
//!     .with_detector(DetectorConfig::new().sensitivity_multiplier(3.0))
//!     .with_digest_algorithm(DigestAlgorithm::Sha256)
//!     .with_cancellation(token.clone())
//!     .with_concurrent_hashing(false);
//! assert!(config.validate().is_ok());
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use crate::{
    compare::DissimilarityMetric,
    detect::DetectorConfig,
    error::VidGuardError,
    hash::{DEFAULT_CHUNK_SIZE, DigestAlgorithm},
    progress::{CancellationToken, NoOpProgress, OperationType, ProgressCallback, ProgressTracker},
};

/// Settings for one analysis run.
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Detector tuning.
    pub(crate) detector: DetectorConfig,
    /// Frame comparison metric.
    pub(crate) metric: DissimilarityMetric,
    /// Digest used for the file fingerprint.
    pub(crate) digest_algorithm: DigestAlgorithm,
    /// Bytes read per hashing step.
    pub(crate) chunk_size: usize,
    /// Hash on a second thread while frames are scanned.
    pub(crate) concurrent_hashing: bool,
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// Frames between frame-scan progress reports.
    pub(crate) batch_size: u64,
}

impl Debug for AnalysisConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AnalysisConfig")
            .field("detector", &self.detector)
            .field("metric", &self.metric)
            .field("digest_algorithm", &self.digest_algorithm)
            .field("chunk_size", &self.chunk_size)
            .field("concurrent_hashing", &self.concurrent_hashing)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            detector: DetectorConfig::default(),
            metric: DissimilarityMetric::default(),
            digest_algorithm: DigestAlgorithm::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrent_hashing: true,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Set the detector tuning.
    #[must_use]
    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    /// Set the frame comparison metric.
    #[must_use]
    pub fn with_metric(mut self, metric: DissimilarityMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the digest algorithm for the file fingerprint.
    #[must_use]
    pub fn with_digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = algorithm;
        self
    }

    /// Set the number of bytes read per hashing step.
    ///
    /// Does not affect the digest, only memory use and syscall count.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Hash on a second thread (`true`, the default) or before the frame
    /// scan on the calling thread (`false`).
    #[must_use]
    pub fn with_concurrent_hashing(mut self, concurrent: bool) -> Self {
        self.concurrent_hashing = concurrent;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Report frame-scan progress every `size` frames. Clamped to at least 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Detector tuning in use.
    pub fn detector(&self) -> &DetectorConfig {
        &self.detector
    }

    /// Digest algorithm in use.
    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest_algorithm
    }

    /// Check every setting is usable.
    pub fn validate(&self) -> Result<(), VidGuardError> {
        if self.chunk_size == 0 {
            return Err(VidGuardError::InvalidConfiguration(
                "hash chunk size must be greater than zero".to_string(),
            ));
        }
        self.detector.validate()
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    pub(crate) fn tracker(&self, operation: OperationType, total: Option<u64>) -> ProgressTracker {
        let batch_size = match operation {
            OperationType::Hashing => self.chunk_size as u64,
            OperationType::FrameScan => self.batch_size,
        };
        ProgressTracker::new(Arc::clone(&self.progress), operation, total, batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.digest_algorithm(), DigestAlgorithm::Md5);
        assert_eq!(config.metric, DissimilarityMetric::MeanAbsoluteDifference);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(config.concurrent_hashing);
        assert!(!config.is_cancelled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_chunk_size_is_invalid() {
        let config = AnalysisConfig::new().with_chunk_size(0);
        assert!(matches!(
            config.validate(),
            Err(VidGuardError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn cancellation_is_observed() {
        let token = CancellationToken::new();
        let config = AnalysisConfig::new().with_cancellation(token.clone());
        token.cancel();
        assert!(config.is_cancelled());
    }
}
