//! Frame-to-frame dissimilarity.
//!
//! Scores are normalised to `[0, 1]` by pixel count, so the same detector
//! threshold means the same thing at any resolution. `0.0` means the two
//! frames are identical.

use std::{mem, str::FromStr};

use crate::{detect::Observation, error::VidGuardError, frame::FrameSample};

/// Default luma threshold for [`DissimilarityMetric::ChangedPixelRatio`].
pub const DEFAULT_PIXEL_THRESHOLD: u8 = 25;

/// How two consecutive frames are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DissimilarityMetric {
    /// Mean absolute difference over every RGB channel, divided by 255.
    ///
    /// Grows smoothly with the amount and strength of change, so small
    /// motion gives small scores and a cut or inserted frame gives a spike.
    #[default]
    MeanAbsoluteDifference,
    /// Fraction of pixels whose luma changed by more than `pixel_threshold`.
    ///
    /// Ignores low-level noise entirely but saturates once most of the frame
    /// has changed.
    ChangedPixelRatio {
        /// Minimum absolute luma difference (0–255) for a pixel to count.
        pixel_threshold: u8,
    },
}

impl DissimilarityMetric {
    /// Score the change from `previous` to `current`.
    ///
    /// Neither sample is modified.
    ///
    /// # Errors
    ///
    /// [`VidGuardError::DimensionMismatch`] if the frames differ in size.
    pub fn compare(
        self,
        previous: &FrameSample,
        current: &FrameSample,
    ) -> Result<f64, VidGuardError> {
        if previous.dimensions() != current.dimensions() {
            return Err(VidGuardError::DimensionMismatch {
                expected: previous.dimensions(),
                found: current.dimensions(),
            });
        }

        let (a, b) = (previous.as_raw(), current.as_raw());
        if a.is_empty() || a == b {
            return Ok(0.0);
        }

        let score = match self {
            DissimilarityMetric::MeanAbsoluteDifference => mean_absolute_difference(a, b),
            DissimilarityMetric::ChangedPixelRatio { pixel_threshold } => {
                changed_pixel_ratio(a, b, pixel_threshold)
            }
        };
        Ok(score)
    }
}

impl FromStr for DissimilarityMetric {
    type Err = VidGuardError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "mad" | "mean-absolute-difference" => Ok(DissimilarityMetric::MeanAbsoluteDifference),
            "changed-pixels" | "changed-pixel-ratio" => Ok(DissimilarityMetric::ChangedPixelRatio {
                pixel_threshold: DEFAULT_PIXEL_THRESHOLD,
            }),
            other => Err(VidGuardError::InvalidConfiguration(format!(
                "unknown dissimilarity metric: {other}"
            ))),
        }
    }
}

/// Score with the default metric.
pub fn compare(previous: &FrameSample, current: &FrameSample) -> Result<f64, VidGuardError> {
    DissimilarityMetric::default().compare(previous, current)
}

/// Turns a frame stream into detector observations, lazily.
///
/// The first frame produces no observation; every later frame produces one,
/// tagged with its own index. A dimension mismatch becomes
/// [`Observation::DimensionChange`] and the new frame becomes the reference
/// for the next comparison. Frame errors are passed through.
///
/// Between calls the stream holds the last frame and its predecessor. If
/// the caller reports the last frame as flagged through
/// [`mark_flagged`](Self::mark_flagged), the frame before the flagged run is
/// kept as an anchor and the next frame is also scored against it
/// ([`Observation::Bridged`]). The anchor is dropped as soon as a frame goes
/// unflagged.
pub struct ScoreStream<I> {
    frames: I,
    metric: DissimilarityMetric,
    previous: Option<FrameSample>,
    before_previous: Option<FrameSample>,
    anchor: Option<FrameSample>,
    anchor_held: bool,
    frames_seen: u64,
}

impl<I> ScoreStream<I>
where
    I: Iterator<Item = Result<FrameSample, VidGuardError>>,
{
    /// Score `frames` with `metric`.
    pub fn new(frames: I, metric: DissimilarityMetric) -> Self {
        Self {
            frames,
            metric,
            previous: None,
            before_previous: None,
            anchor: None,
            anchor_held: false,
            frames_seen: 0,
        }
    }

    /// Number of frames pulled from the underlying stream so far.
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Record that the frame behind the last observation was flagged.
    pub fn mark_flagged(&mut self) {
        if self.anchor.is_none() {
            self.anchor = self.before_previous.take();
        }
        self.anchor_held = true;
    }

    fn bridge(&self, current: &FrameSample) -> Option<f64> {
        let anchor = self.anchor.as_ref()?;
        self.metric.compare(anchor, current).ok()
    }
}

impl<I> Iterator for ScoreStream<I>
where
    I: Iterator<Item = Result<FrameSample, VidGuardError>>,
{
    type Item = Result<(u64, Observation), VidGuardError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.before_previous = None;
        if !mem::take(&mut self.anchor_held) {
            self.anchor = None;
        }

        loop {
            let current = match self.frames.next()? {
                Ok(frame) => frame,
                Err(error) => return Some(Err(error)),
            };
            self.frames_seen += 1;

            let Some(previous) = self.previous.take() else {
                self.previous = Some(current);
                continue;
            };

            let index = current.index();
            let observation = match self.metric.compare(&previous, &current) {
                Ok(score) => match self.bridge(&current) {
                    Some(bridge) => Observation::Bridged { score, bridge },
                    None => Observation::Score(score),
                },
                Err(VidGuardError::DimensionMismatch { expected, found }) => {
                    log::warn!(
                        "Frame {index} changes resolution from {}x{} to {}x{}",
                        expected.0,
                        expected.1,
                        found.0,
                        found.1,
                    );
                    Observation::DimensionChange
                }
                Err(error) => return Some(Err(error)),
            };

            self.before_previous = Some(previous);
            self.previous = Some(current);
            return Some(Ok((index, observation)));
        }
    }
}

fn mean_absolute_difference(a: &[u8], b: &[u8]) -> f64 {
    let total: u64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum();
    total as f64 / (a.len() as f64 * 255.0)
}

fn changed_pixel_ratio(a: &[u8], b: &[u8], pixel_threshold: u8) -> f64 {
    let pixels = a.len() / 3;
    let changed = a
        .chunks_exact(3)
        .zip(b.chunks_exact(3))
        .filter(|(x, y)| luma(x).abs_diff(luma(y)) > pixel_threshold)
        .count();
    changed as f64 / pixels as f64
}

/// BT.601 luma of one RGB pixel.
fn luma(rgb: &[u8]) -> u8 {
    let weighted = 299 * u32::from(rgb[0]) + 587 * u32::from(rgb[1]) + 114 * u32::from(rgb[2]);
    ((weighted + 500) / 1000) as u8
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    fn solid(index: u64, width: u32, height: u32, value: u8) -> FrameSample {
        FrameSample::new(index, RgbImage::from_pixel(width, height, Rgb([value; 3])))
    }

    #[test]
    fn identical_frames_score_zero() {
        let frame = solid(0, 8, 8, 90);
        assert_eq!(compare(&frame, &frame.clone()).unwrap(), 0.0);
    }

    #[test]
    fn black_to_white_scores_one() {
        let black = solid(0, 4, 4, 0);
        let white = solid(1, 4, 4, 255);
        assert!((compare(&black, &white).unwrap() - 1.0).abs() < 1e-12);
        let ratio = DissimilarityMetric::ChangedPixelRatio { pixel_threshold: 25 };
        assert!((ratio.compare(&black, &white).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn score_is_independent_of_resolution() {
        let small = compare(&solid(0, 4, 4, 100), &solid(1, 4, 4, 151)).unwrap();
        let large = compare(&solid(0, 64, 36, 100), &solid(1, 64, 36, 151)).unwrap();
        assert!((small - large).abs() < 1e-12);
        assert!((small - 0.2).abs() < 1e-12);
    }

    #[test]
    fn score_grows_with_visible_difference() {
        let base = solid(0, 8, 8, 100);
        let slight = compare(&base, &solid(1, 8, 8, 110)).unwrap();
        let strong = compare(&base, &solid(1, 8, 8, 200)).unwrap();
        assert!(slight < strong);
    }

    #[test]
    fn changed_pixel_ratio_ignores_small_changes() {
        let mut image = RgbImage::from_pixel(4, 1, Rgb([100; 3]));
        image.put_pixel(0, 0, Rgb([110; 3]));
        image.put_pixel(1, 0, Rgb([200; 3]));
        let metric = DissimilarityMetric::ChangedPixelRatio { pixel_threshold: 25 };
        let score = metric
            .compare(&solid(0, 4, 1, 100), &FrameSample::new(1, image))
            .unwrap();
        assert!((score - 0.25).abs() < 1e-12);
    }

    #[test]
    fn mismatched_dimensions_are_reported() {
        let error = compare(&solid(0, 4, 4, 0), &solid(1, 2, 2, 0)).unwrap_err();
        match error {
            VidGuardError::DimensionMismatch { expected, found } => {
                assert_eq!(expected, (4, 4));
                assert_eq!(found, (2, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn score_stream_skips_first_frame_and_reports_resolution_changes() {
        let frames: Vec<Result<FrameSample, VidGuardError>> = vec![
            Ok(solid(0, 4, 4, 0)),
            Ok(solid(1, 4, 4, 0)),
            Ok(solid(2, 2, 2, 0)),
            Ok(solid(3, 2, 2, 255)),
        ];
        let mut stream = ScoreStream::new(frames.into_iter(), DissimilarityMetric::default());
        let observations: Vec<(u64, Observation)> =
            stream.by_ref().map(Result::unwrap).collect();

        assert_eq!(
            observations,
            [
                (1, Observation::Score(0.0)),
                (2, Observation::DimensionChange),
                (3, Observation::Score(1.0)),
            ]
        );
        assert_eq!(stream.frames_seen(), 4);
    }

    #[test]
    fn flagged_run_is_bridged_to_the_frame_before_it() {
        let values = [128, 128, 64, 0, 128, 128];
        let frames: Vec<Result<FrameSample, VidGuardError>> = values
            .iter()
            .enumerate()
            .map(|(index, &value)| Ok(solid(index as u64, 4, 4, value)))
            .collect();
        let mut stream = ScoreStream::new(frames.into_iter(), DissimilarityMetric::default());

        let mut next = || stream.next().unwrap().unwrap();
        assert_eq!(next(), (1, Observation::Score(0.0)));
        assert!(matches!(next(), (2, Observation::Score(_))));
        stream.mark_flagged();

        // Frame 3 (0) against frame 1 (128).
        let (index, observation) = stream.next().unwrap().unwrap();
        assert_eq!(index, 3);
        let Observation::Bridged { bridge, .. } = observation else {
            panic!("expected a bridged observation, got {observation:?}");
        };
        assert!((bridge - 128.0 / 255.0).abs() < 1e-12);
        stream.mark_flagged();

        // The anchor is still frame 1, not frame 2.
        assert!(matches!(
            stream.next().unwrap().unwrap(),
            (4, Observation::Bridged { bridge, .. }) if bridge == 0.0
        ));
        assert_eq!(stream.next().unwrap().unwrap(), (5, Observation::Score(0.0)));
    }

    #[test]
    fn unflagged_frames_are_never_bridged() {
        let frames: Vec<Result<FrameSample, VidGuardError>> =
            (0..4).map(|index| Ok(solid(index, 2, 2, (index * 60) as u8))).collect();
        let stream = ScoreStream::new(frames.into_iter(), DissimilarityMetric::default());
        for observation in stream {
            assert!(matches!(observation.unwrap().1, Observation::Score(_)));
        }
    }

    #[test]
    fn score_stream_passes_frame_errors_through() {
        let frames: Vec<Result<FrameSample, VidGuardError>> = vec![
            Ok(solid(0, 4, 4, 0)),
            Err(VidGuardError::DecodeFailure("truncated".to_string())),
        ];
        let mut stream = ScoreStream::new(frames.into_iter(), DissimilarityMetric::default());
        assert!(matches!(stream.next(), Some(Err(VidGuardError::DecodeFailure(_)))));
        assert!(stream.next().is_none());
    }

    #[test]
    fn metric_names_parse() {
        assert_eq!(
            "mad".parse::<DissimilarityMetric>().unwrap(),
            DissimilarityMetric::MeanAbsoluteDifference
        );
        assert!(matches!(
            "changed-pixels".parse::<DissimilarityMetric>().unwrap(),
            DissimilarityMetric::ChangedPixelRatio { pixel_threshold: 25 }
        ));
        assert!("ssim".parse::<DissimilarityMetric>().is_err());
    }
}
