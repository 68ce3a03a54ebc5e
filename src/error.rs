//! Error types for the `vidguard` crate.
//!
//! This module defines [`VidGuardError`], the unified error type returned by
//! every fallible operation, and [`ErrorKind`], the coarse classification
//! callers use to tell failure reasons apart (for example to pick a process
//! exit code). A run either yields a complete report or one of these errors;
//! partial results are never returned.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `vidguard` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VidGuardError {
    /// The input path does not exist, cannot be read, or its container
    /// could not be parsed.
    #[error("Source unavailable at {path}: {reason}")]
    SourceUnavailable {
        /// Path that was passed to the frame source.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The container has no video stream, or its codec cannot be decoded.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A read failed while hashing or decoding.
    #[error("I/O failure while {context}: {source}")]
    IoFailure {
        /// What the pipeline was doing when the read failed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: IoError,
    },

    /// The decoder failed part-way through the stream.
    #[error("Failed to decode video frame: {0}")]
    DecodeFailure(String),

    /// Two consecutive frames have different dimensions.
    ///
    /// Only the comparator returns this; the detector recovers from it by
    /// flagging the frame, so it never aborts an analysis run.
    #[error(
        "Frame dimensions changed from {}x{} to {}x{}",
        .expected.0, .expected.1, .found.0, .found.1
    )]
    DimensionMismatch {
        /// `(width, height)` of the earlier frame.
        expected: (u32, u32),
        /// `(width, height)` of the later frame.
        found: (u32, u32),
    },

    /// A tuning parameter is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The run was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// The report could not be serialized or parsed.
    #[error("Report serialization error: {0}")]
    Report(#[from] serde_json::Error),
}

/// Coarse classification of a [`VidGuardError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Path missing, unreadable, or container unparseable.
    SourceUnavailable,
    /// Decoder cannot interpret the container or codec.
    UnsupportedFormat,
    /// Read or decode failure mid-stream.
    IoFailure,
    /// Frame dimensions changed between consecutive frames.
    DimensionMismatch,
    /// Invalid tuning parameters.
    Configuration,
    /// Cancelled by the caller.
    Cancelled,
    /// Report (de)serialization failed.
    Report,
}

impl VidGuardError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VidGuardError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            VidGuardError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            VidGuardError::IoFailure { .. } | VidGuardError::DecodeFailure(_) => {
                ErrorKind::IoFailure
            }
            VidGuardError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            VidGuardError::InvalidConfiguration(_) => ErrorKind::Configuration,
            VidGuardError::Cancelled => ErrorKind::Cancelled,
            VidGuardError::Report(_) => ErrorKind::Report,
        }
    }

    /// Whether this error aborts an analysis run.
    ///
    /// Everything except [`VidGuardError::DimensionMismatch`] is fatal.
    pub fn is_fatal(&self) -> bool {
        self.kind() != ErrorKind::DimensionMismatch
    }

    pub(crate) fn io(context: impl Into<String>, source: IoError) -> Self {
        VidGuardError::IoFailure {
            context: context.into(),
            source,
        }
    }
}

impl From<FfmpegError> for VidGuardError {
    fn from(error: FfmpegError) -> Self {
        VidGuardError::DecodeFailure(error.to_string())
    }
}
