//! Video metadata types.
//!
//! [`VideoMetadata`] is produced once by a [`FrameSource`](crate::FrameSource)
//! when the file is opened and is immutable afterwards. Its serialized form
//! is part of the report format and contains exactly `frame_count`,
//! `frame_width`, `frame_height` and `fps`; the remaining fields are kept in
//! memory only.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where [`VideoMetadata::frame_count`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameCountSource {
    /// Declared by the container (e.g. the stream's `nb_frames`).
    Declared,
    /// Computed from duration and frame rate. Not reliable enough to check
    /// against the decoded count.
    Estimated,
    /// Counted by decoding every frame.
    #[default]
    Decoded,
}

/// Metadata for the analysed video stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct VideoMetadata {
    /// Number of frames in the stream.
    pub frame_count: u64,
    /// Frame width in pixels.
    #[serde(rename = "frame_width")]
    pub width: u32,
    /// Frame height in pixels.
    #[serde(rename = "frame_height")]
    pub height: u32,
    /// Frames per second (average for variable-frame-rate content).
    pub fps: f64,
    /// Codec name (e.g. `"h264"`), or `"raw"` for in-memory sources.
    #[serde(skip)]
    pub codec: String,
    /// Container duration, `Duration::ZERO` when unknown.
    #[serde(skip)]
    pub duration: Duration,
    /// Provenance of `frame_count`.
    #[serde(skip)]
    pub frame_count_source: FrameCountSource,
}

impl VideoMetadata {
    /// Resolution formatted as `"WIDTHxHEIGHT"`.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Duration implied by the frame count and frame rate, in seconds.
    ///
    /// Returns `0.0` when the frame rate is not positive.
    pub fn duration_seconds(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }

    /// Whether `frame_count` was declared by the container, and so should
    /// match the number of frames actually decoded.
    pub fn frame_count_is_declared(&self) -> bool {
        self.frame_count_source == FrameCountSource::Declared
    }
}
