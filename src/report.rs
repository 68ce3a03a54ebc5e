//! The integrity report.
//!
//! [`IntegrityReport`] is the one artifact a run produces. Its JSON form has
//! exactly three top-level fields, which downstream audit tools rely on:
//!
//! ```json
//! {
//!     "metadata": {
//!         "frame_count": 500,
//!         "frame_width": 1920,
//!         "frame_height": 1080,
//!         "fps": 30.0
//!     },
//!     "hash": "9e107d9d372bb6826bd81d3542a419d6",
//!     "altered_frames": [15, 20, 25]
//! }
//! ```

use std::{fs, io::Write, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    detect::AlteredFrameSet, error::VidGuardError, hash::DigestAlgorithm,
    metadata::VideoMetadata,
};

/// Result of one complete analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct IntegrityReport {
    /// Container metadata.
    pub metadata: VideoMetadata,
    /// Lowercase hex digest of the file's bytes.
    pub hash: String,
    /// Flagged frame indices, ascending and unique.
    pub altered_frames: AlteredFrameSet,
    /// Algorithm that produced `hash`.
    #[serde(skip)]
    pub algorithm: DigestAlgorithm,
    /// Number of frames actually decoded.
    #[serde(skip)]
    pub decoded_frame_count: u64,
}

impl IntegrityReport {
    /// Percentage of frames not flagged, from 0 to 100.
    ///
    /// `100.0` when nothing was flagged.
    pub fn integrity_score(&self) -> f64 {
        if self.altered_frames.is_empty() {
            return 100.0;
        }
        let total = self.metadata.frame_count.max(self.decoded_frame_count);
        if total == 0 {
            return 0.0;
        }
        (100.0 - self.altered_frames.len() as f64 / total as f64 * 100.0).max(0.0)
    }

    /// `true` when at least one frame was flagged.
    pub fn is_suspect(&self) -> bool {
        !self.altered_frames.is_empty()
    }

    /// `true` when the container's declared frame count disagrees with the
    /// number of frames decoded.
    pub fn frame_count_mismatch(&self) -> bool {
        self.metadata.frame_count_is_declared()
            && self.metadata.frame_count != self.decoded_frame_count
    }

    /// Pretty JSON with four-space indentation.
    pub fn to_json_pretty(&self) -> Result<String, VidGuardError> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Parse a report previously written by [`write_to`](Self::write_to).
    ///
    /// Fields not part of the JSON form take their defaults.
    pub fn from_json(json: &str) -> Result<Self, VidGuardError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the report as pretty JSON to `path`, creating parent
    /// directories as needed.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), VidGuardError> {
        let path = path.as_ref();
        let json = self.to_json_pretty()?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|error| {
                VidGuardError::io(format!("creating {}", parent.display()), error)
            })?;
        }

        let mut file = fs::File::create(path)
            .map_err(|error| VidGuardError::io(format!("creating {}", path.display()), error))?;
        file.write_all(json.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .map_err(|error| VidGuardError::io(format!("writing {}", path.display()), error))?;

        log::debug!("Report written to {}", path.display());
        Ok(())
    }
}
