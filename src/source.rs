//! Frame source capability.
//!
//! A [`FrameSource`] opens a video once and hands back its
//! [`VideoMetadata`] together with a lazy, forward-only frame iterator. The
//! analysis pipeline only talks to this trait, so the decoding backend can be
//! swapped without touching it. Two implementations ship with the crate:
//!
//! - [`FfmpegSource`](crate::FfmpegSource) decodes real containers through
//!   FFmpeg (the default).
//! - [`MemorySource`] serves frames that are already in memory or generated
//!   on demand, useful for tests and for callers that decode elsewhere.
//!
//! # Example
//!
//! ```
//! use image::RgbImage;
//! use vidguard::{FrameSource, MemorySource};
//!
//! let frames = vec![RgbImage::new(4, 4); 3];
//! let source = MemorySource::new(frames, 25.0);
//! # let file = tempfile::NamedTempFile::new().unwrap();
//! let opened = source.open(file.path())?;
//! assert_eq!(opened.metadata.frame_count, 3);
//! assert_eq!(opened.frames.count(), 3);
//! # Ok::<(), vidguard::VidGuardError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::Path,
    sync::Arc,
    time::Duration,
};

use image::RgbImage;

use crate::{
    error::VidGuardError,
    frame::FrameSample,
    metadata::{FrameCountSource, VideoMetadata},
};

/// Lazy, single-pass sequence of decoded frames in index order.
///
/// Dropping the iterator releases the decoder and file handles behind it.
pub type FrameIter = Box<dyn Iterator<Item = Result<FrameSample, VidGuardError>>>;

/// A freshly opened video: its metadata and its frame stream.
pub struct OpenedSource {
    /// Metadata read from the container at open time.
    pub metadata: VideoMetadata,
    /// Frames in decode order, each tagged with its zero-based index.
    pub frames: FrameIter,
}

impl Debug for OpenedSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("OpenedSource")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Capability interface over a video decoder.
pub trait FrameSource: Send + Sync {
    /// Open `path`, read its metadata, and return a lazy frame iterator.
    ///
    /// The iterator is not restartable; a second pass requires calling
    /// `open` again.
    ///
    /// # Errors
    ///
    /// - [`VidGuardError::SourceUnavailable`] if the path does not exist or
    ///   its container cannot be parsed.
    /// - [`VidGuardError::UnsupportedFormat`] if there is no decodable video
    ///   stream.
    fn open(&self, path: &Path) -> Result<OpenedSource, VidGuardError>;
}

/// Produces the frame at a given index.
type FrameGenerator = dyn Fn(u64) -> RgbImage + Send + Sync;

/// A [`FrameSource`] backed by in-memory or procedurally generated frames.
///
/// The path passed to [`open`](FrameSource::open) must still exist, since it
/// stands for the file the frames were decoded from, but its bytes are not
/// read.
#[derive(Clone)]
pub struct MemorySource {
    generator: Arc<FrameGenerator>,
    frame_count: u64,
    fps: f64,
    declared_frame_count: Option<u64>,
}

impl Debug for MemorySource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MemorySource")
            .field("frame_count", &self.frame_count)
            .field("fps", &self.fps)
            .field("declared_frame_count", &self.declared_frame_count)
            .finish_non_exhaustive()
    }
}

impl MemorySource {
    /// Serve the given frames in order.
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        let frame_count = frames.len() as u64;
        let frames: Arc<[RgbImage]> = frames.into();
        Self::from_fn(frame_count, fps, move |index| frames[index as usize].clone())
    }

    /// Generate `frame_count` frames on demand, one call per frame.
    ///
    /// Only the frames currently being compared are held in memory, so very
    /// long or high-resolution synthetic streams stay cheap.
    pub fn from_fn<F>(frame_count: u64, fps: f64, generator: F) -> Self
    where
        F: Fn(u64) -> RgbImage + Send + Sync + 'static,
    {
        Self {
            generator: Arc::new(generator),
            frame_count,
            fps,
            declared_frame_count: Some(frame_count),
        }
    }

    /// Override the frame count the "container" declares.
    ///
    /// `None` simulates a container without a frame count; a value different
    /// from the real count simulates a container that lies about it.
    #[must_use]
    pub fn with_declared_frame_count(mut self, declared: Option<u64>) -> Self {
        self.declared_frame_count = declared;
        self
    }
}

impl FrameSource for MemorySource {
    fn open(&self, path: &Path) -> Result<OpenedSource, VidGuardError> {
        std::fs::metadata(path).map_err(|error| VidGuardError::SourceUnavailable {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        if self.frame_count == 0 {
            return Err(VidGuardError::UnsupportedFormat(
                "stream contains no frames".to_string(),
            ));
        }

        let (width, height) = (self.generator)(0).dimensions();
        let (frame_count, frame_count_source) = match self.declared_frame_count {
            Some(count) => (count, FrameCountSource::Declared),
            None => (0, FrameCountSource::Decoded),
        };
        let duration = if self.fps > 0.0 {
            Duration::from_secs_f64(self.frame_count as f64 / self.fps)
        } else {
            Duration::ZERO
        };

        let metadata = VideoMetadata {
            frame_count,
            width,
            height,
            fps: self.fps,
            codec: "raw".to_string(),
            duration,
            frame_count_source,
        };

        let generator = Arc::clone(&self.generator);
        let frames = (0..self.frame_count)
            .map(move |index| Ok::<_, VidGuardError>(FrameSample::new(index, generator(index))));

        Ok(OpenedSource {
            metadata,
            frames: Box::new(frames),
        })
    }
}
