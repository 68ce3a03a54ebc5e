//! Alteration detection over a stream of dissimilarity scores.
//!
//! [`AlterationDetector`] keeps a rolling baseline (mean and standard
//! deviation of the last [`DetectorConfig::baseline_window`] accepted
//! scores) and flags a frame when its score rises more than
//! [`DetectorConfig::sensitivity_multiplier`] standard deviations above the
//! mean, and above the absolute floor [`DetectorConfig::min_score`]. Gradual
//! motion moves the baseline with it; splices, inserted or dropped frames
//! and recompression glitches show up as isolated spikes.
//!
//! A resolution change between two frames is always flagged and restarts
//! the baseline.
//!
//! An inserted frame produces two spikes: one entering it and one leaving
//! it. The frame after a flagged run can carry a second score, its
//! difference from the last frame before the run
//! ([`Observation::Bridged`]). When return-edge suppression is on and that
//! bridge score is within the threshold, the footage has returned to where
//! it was and the spike is not flagged again. Plain scores carry no such
//! evidence and are never suppressed.
//!
//! # Example
//!
//! ```
//! use vidguard::{DetectorConfig, Observation, detect};
//!
//! let observations = [
//!     (1, Observation::Score(0.01)),
//!     (2, Observation::Score(0.01)),
//!     (3, Observation::Score(0.6)),
//!     // Frame 4 looks like frame 2 again.
//!     (4, Observation::Bridged { score: 0.6, bridge: 0.01 }),
//!     (5, Observation::Score(0.01)),
//! ];
//!
//! let flagged = detect(&DetectorConfig::default(), observations)?;
//! assert_eq!(flagged.as_slice(), &[3]);
//! # Ok::<(), vidguard::VidGuardError>(())
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::VidGuardError;

/// Detector tuning parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// How many baseline standard deviations above the baseline mean a score
    /// must reach to be flagged. Lower is more sensitive. Default: 4.0.
    pub sensitivity_multiplier: f64,
    /// Absolute floor: scores at or below this are never flagged, whatever
    /// the baseline says. Keeps compression noise on static footage (where
    /// the standard deviation is zero) from being flagged. Default: 0.08.
    pub min_score: f64,
    /// Number of recent accepted scores the baseline is computed over.
    /// Default: 30.
    pub baseline_window: usize,
    /// Skip the spike leaving an inserted run when the footage is back to
    /// the frame before the run. Default: on.
    pub suppress_return_edges: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sensitivity_multiplier: 4.0,
            min_score: 0.08,
            baseline_window: 30,
            suppress_return_edges: true,
        }
    }
}

impl DetectorConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sensitivity multiplier.
    #[must_use]
    pub fn sensitivity_multiplier(mut self, multiplier: f64) -> Self {
        self.sensitivity_multiplier = multiplier;
        self
    }

    /// Set the absolute score floor.
    #[must_use]
    pub fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    /// Set the rolling baseline length.
    #[must_use]
    pub fn baseline_window(mut self, window: usize) -> Self {
        self.baseline_window = window;
        self
    }

    /// Enable or disable return-edge suppression.
    #[must_use]
    pub fn suppress_return_edges(mut self, suppress: bool) -> Self {
        self.suppress_return_edges = suppress;
        self
    }

    /// Check every parameter is finite and in range.
    pub fn validate(&self) -> Result<(), VidGuardError> {
        let invalid = |message: String| Err(VidGuardError::InvalidConfiguration(message));

        if !self.sensitivity_multiplier.is_finite() || self.sensitivity_multiplier < 0.0 {
            return invalid(format!(
                "sensitivity multiplier must be a non-negative number, got {}",
                self.sensitivity_multiplier
            ));
        }
        if !self.min_score.is_finite() || self.min_score < 0.0 {
            return invalid(format!(
                "minimum score must be a non-negative number, got {}",
                self.min_score
            ));
        }
        if self.baseline_window == 0 {
            return invalid("baseline window must be at least 1".to_string());
        }
        Ok(())
    }
}

/// One detector input, attached to the later frame of a compared pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    /// Dissimilarity score from the comparator.
    Score(f64),
    /// Score of the frame right after a flagged one, together with its
    /// score against the last frame before the flagged run.
    Bridged {
        /// Score against the immediate predecessor.
        score: f64,
        /// Score against the last unflagged frame.
        bridge: f64,
    },
    /// The frame's dimensions differ from its predecessor's.
    DimensionChange,
}

/// Why a frame was flagged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlagReason {
    /// The score exceeded the threshold in force at that point.
    ScoreSpike {
        /// The frame's score.
        score: f64,
        /// The threshold it exceeded.
        threshold: f64,
    },
    /// The frame's resolution differs from its predecessor's.
    DimensionChange,
}

/// Flagged frame indices, ascending and unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u64>", into = "Vec<u64>")]
pub struct AlteredFrameSet(Vec<u64>);

impl AlteredFrameSet {
    /// Build a set from indices in any order, dropping duplicates.
    pub fn from_indices<I: IntoIterator<Item = u64>>(indices: I) -> Self {
        let mut indices: Vec<u64> = indices.into_iter().collect();
        indices.sort_unstable();
        indices.dedup();
        Self(indices)
    }

    /// Number of flagged frames.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when nothing was flagged.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `index` was flagged.
    pub fn contains(&self, index: u64) -> bool {
        self.0.binary_search(&index).is_ok()
    }

    /// Flagged indices in ascending order.
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    /// Iterate flagged indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.iter().copied()
    }
}

impl TryFrom<Vec<u64>> for AlteredFrameSet {
    type Error = String;

    fn try_from(indices: Vec<u64>) -> Result<Self, Self::Error> {
        if indices.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err("altered frame indices must be ascending and unique".to_string());
        }
        Ok(Self(indices))
    }
}

impl From<AlteredFrameSet> for Vec<u64> {
    fn from(set: AlteredFrameSet) -> Self {
        set.0
    }
}

/// Stateful detector; feed observations in ascending frame order.
#[derive(Debug, Clone)]
pub struct AlterationDetector {
    config: DetectorConfig,
    baseline: VecDeque<f64>,
    flagged: Vec<u64>,
    last_index: Option<u64>,
}

impl AlterationDetector {
    /// Create a detector.
    ///
    /// # Errors
    ///
    /// [`VidGuardError::InvalidConfiguration`] if `config` fails
    /// [`DetectorConfig::validate`].
    pub fn new(config: DetectorConfig) -> Result<Self, VidGuardError> {
        config.validate()?;
        Ok(Self {
            baseline: VecDeque::with_capacity(config.baseline_window),
            config,
            flagged: Vec::new(),
            last_index: None,
        })
    }

    /// Threshold a score must exceed to be flagged right now.
    pub fn current_threshold(&self) -> f64 {
        if self.baseline.is_empty() {
            return self.config.min_score;
        }

        let count = self.baseline.len() as f64;
        let mean = self.baseline.iter().sum::<f64>() / count;
        let variance = self
            .baseline
            .iter()
            .map(|score| (score - mean).powi(2))
            .sum::<f64>()
            / count;

        (mean + self.config.sensitivity_multiplier * variance.sqrt()).max(self.config.min_score)
    }

    /// Process the observation for frame `index`.
    ///
    /// Returns the reason when the frame is flagged. Frame 0, negative or
    /// non-finite scores, and indices not above the previous one are never
    /// flagged.
    pub fn observe(&mut self, index: u64, observation: Observation) -> Option<FlagReason> {
        if index == 0 {
            return None;
        }
        if self.last_index.is_some_and(|last| index <= last) {
            log::warn!("Ignoring out-of-order observation for frame {index}");
            return None;
        }
        self.last_index = Some(index);

        let reason = match observation {
            Observation::Score(score) | Observation::Bridged { score, .. }
                if !score.is_finite() || score < 0.0 =>
            {
                log::warn!("Ignoring invalid score {score} for frame {index}");
                return None;
            }
            Observation::Score(score) | Observation::Bridged { score, .. } => {
                let threshold = self.current_threshold();
                if score <= threshold {
                    self.accept(score);
                    return None;
                }
                if self.is_return_edge(index, observation, threshold) {
                    log::debug!("Frame {index} returns to the footage before frame {}", index - 1);
                    return None;
                }
                FlagReason::ScoreSpike { score, threshold }
            }
            Observation::DimensionChange => FlagReason::DimensionChange,
        };

        match reason {
            FlagReason::ScoreSpike { score, threshold } => {
                log::trace!("Frame {index} flagged: score {score:.4} > threshold {threshold:.4}");
            }
            FlagReason::DimensionChange => {
                log::debug!("Frame {index} flagged: resolution change, baseline restarted");
                self.baseline.clear();
            }
        }

        self.flagged.push(index);
        Some(reason)
    }

    /// Flagged frames so far.
    pub fn flagged(&self) -> &[u64] {
        &self.flagged
    }

    /// Finish the stream and return the flagged set.
    pub fn finish(self) -> AlteredFrameSet {
        AlteredFrameSet(self.flagged)
    }

    fn accept(&mut self, score: f64) {
        if self.baseline.len() == self.config.baseline_window {
            self.baseline.pop_front();
        }
        self.baseline.push_back(score);
    }

    fn is_return_edge(&self, index: u64, observation: Observation, threshold: f64) -> bool {
        if !self.config.suppress_return_edges {
            return false;
        }
        let Observation::Bridged { bridge, .. } = observation else {
            return false;
        };
        self.flagged.last() == Some(&(index - 1)) && bridge.is_finite() && bridge <= threshold
    }
}

/// Run a detector over a whole observation stream.
///
/// Only [`Observation::Bridged`] inputs can close a flagged run; a stream of
/// plain scores flags every spike.
pub fn detect<I>(config: &DetectorConfig, observations: I) -> Result<AlteredFrameSet, VidGuardError>
where
    I: IntoIterator<Item = (u64, Observation)>,
{
    let mut detector = AlterationDetector::new(config.clone())?;
    for (index, observation) in observations {
        detector.observe(index, observation);
    }
    Ok(detector.finish())
}
