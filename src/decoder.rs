//! FFmpeg-backed frame source.
//!
//! [`FfmpegSource`] opens a container with FFmpeg, reads the best video
//! stream's metadata, and returns an [`FfmpegFrames`] iterator that decodes
//! one frame per call to [`next()`](Iterator::next). Frames are converted to
//! RGB24 at their native resolution; if the stream changes resolution the
//! scaler is rebuilt for the new size rather than stretching the frame.
//!
//! The demuxer, decoder and scaler are owned by the iterator and released
//! when it is dropped, whether iteration finished, failed, or was abandoned.

use std::{path::Path, time::Duration};

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::error::EAGAIN,
};
use image::RgbImage;

use crate::{
    conversion,
    error::VidGuardError,
    frame::FrameSample,
    metadata::{FrameCountSource, VideoMetadata},
    source::{FrameSource, OpenedSource},
};

/// The default [`FrameSource`]: decodes containers with FFmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegSource;

impl FrameSource for FfmpegSource {
    fn open(&self, path: &Path) -> Result<OpenedSource, VidGuardError> {
        let frames = FfmpegFrames::open(path)?;
        let metadata = frames.metadata.clone();
        Ok(OpenedSource {
            metadata,
            frames: Box::new(frames),
        })
    }
}

/// Lazy, sequential iterator over every frame of the best video stream.
pub struct FfmpegFrames {
    input_context: Input,
    decoder: VideoDecoder,
    video_stream_index: usize,
    metadata: VideoMetadata,
    /// Scaler plus the `(format, width, height)` it was built for.
    scaler: Option<(ScalingContext, (Pixel, u32, u32))>,
    decoded_frame: VideoFrame,
    scaled_frame: VideoFrame,
    next_index: u64,
    eof_sent: bool,
    done: bool,
}

impl FfmpegFrames {
    /// Open `path` and prepare to decode its best video stream.
    ///
    /// # Errors
    ///
    /// [`VidGuardError::SourceUnavailable`] if the file is missing or FFmpeg
    /// cannot parse the container, [`VidGuardError::UnsupportedFormat`] if
    /// there is no video stream or no decoder for its codec.
    pub fn open(path: &Path) -> Result<Self, VidGuardError> {
        let unavailable = |reason: String| VidGuardError::SourceUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        log::debug!("Opening video file: {}", path.display());

        std::fs::metadata(path).map_err(|error| unavailable(error.to_string()))?;

        ffmpeg_next::init()
            .map_err(|error| unavailable(format!("FFmpeg initialisation failed: {error}")))?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| unavailable(error.to_string()))?;

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let (video_stream_index, decoder, fps, declared_frames) = {
            let stream = input_context
                .streams()
                .best(Type::Video)
                .ok_or_else(|| VidGuardError::UnsupportedFormat("no video stream found".to_string()))?;

            let decoder_context = CodecContext::from_parameters(stream.parameters())
                .map_err(|error| {
                    VidGuardError::UnsupportedFormat(format!(
                        "cannot read codec parameters for stream {}: {error}",
                        stream.index()
                    ))
                })?;
            let decoder = decoder_context.decoder().video().map_err(|error| {
                VidGuardError::UnsupportedFormat(format!(
                    "no decoder for stream {}: {error}",
                    stream.index()
                ))
            })?;

            let average = stream.avg_frame_rate();
            let fps = if average.denominator() != 0 && average.numerator() != 0 {
                average.numerator() as f64 / average.denominator() as f64
            } else {
                let rate = stream.rate();
                if rate.denominator() != 0 {
                    rate.numerator() as f64 / rate.denominator() as f64
                } else {
                    0.0
                }
            };

            (stream.index(), decoder, fps, stream.frames())
        };

        let (width, height) = (decoder.width(), decoder.height());
        if width == 0 || height == 0 {
            return Err(VidGuardError::UnsupportedFormat(format!(
                "invalid video dimensions {width}x{height}"
            )));
        }

        let (frame_count, frame_count_source) = if declared_frames > 0 {
            (declared_frames as u64, FrameCountSource::Declared)
        } else if fps > 0.0 && duration > Duration::ZERO {
            (
                (duration.as_secs_f64() * fps).round() as u64,
                FrameCountSource::Estimated,
            )
        } else {
            (0, FrameCountSource::Decoded)
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            frame_count,
            width,
            height,
            fps,
            codec,
            duration,
            frame_count_source,
        };

        log::debug!(
            "Video stream {video_stream_index}: {}x{} @ {:.3} fps, {} frames ({:?}), codec {}",
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.frame_count,
            metadata.frame_count_source,
            metadata.codec,
        );

        Ok(Self {
            input_context,
            decoder,
            video_stream_index,
            metadata,
            scaler: None,
            decoded_frame: VideoFrame::empty(),
            scaled_frame: VideoFrame::empty(),
            next_index: 0,
            eof_sent: false,
            done: false,
        })
    }

    /// Metadata read at open time.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Convert the current `decoded_frame` to RGB at its native size.
    fn convert_current_frame(&mut self) -> Result<RgbImage, VidGuardError> {
        let key = (
            self.decoded_frame.format(),
            self.decoded_frame.width(),
            self.decoded_frame.height(),
        );
        let (format, width, height) = key;

        let stale = self.scaler.as_ref().is_none_or(|(_, built_for)| *built_for != key);
        if stale {
            if self.scaler.is_some() {
                log::warn!(
                    "Frame {} changes decoded size to {width}x{height}",
                    self.next_index
                );
            }
            let scaler = ScalingContext::get(
                format,
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?;
            self.scaler = Some((scaler, key));
        }

        if let Some((scaler, _)) = self.scaler.as_mut() {
            scaler.run(&self.decoded_frame, &mut self.scaled_frame)?;
        }

        let buffer = conversion::frame_to_buffer(&self.scaled_frame, width, height, 3);
        RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            VidGuardError::DecodeFailure(
                "decoded frame data does not fit an RGB image".to_string(),
            )
        })
    }

    fn fail(&mut self, error: VidGuardError) -> Option<Result<FrameSample, VidGuardError>> {
        self.done = true;
        Some(Err(error))
    }
}

impl Iterator for FfmpegFrames {
    type Item = Result<FrameSample, VidGuardError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                let index = self.next_index;
                return match self.convert_current_frame() {
                    Ok(image) => {
                        self.next_index += 1;
                        Some(Ok(FrameSample::new(index, image)))
                    }
                    Err(error) => self.fail(error),
                };
            }

            if self.eof_sent {
                self.done = true;
                return None;
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() == self.video_stream_index {
                        if let Err(error) = self.decoder.send_packet(&packet) {
                            return self.fail(error.into());
                        }
                    }
                }
                Err(FfmpegError::Eof) => {
                    if let Err(error) = self.decoder.send_eof() {
                        return self.fail(error.into());
                    }
                    self.eof_sent = true;
                }
                Err(FfmpegError::Other { errno }) if errno == EAGAIN => {}
                Err(error) => {
                    return self.fail(VidGuardError::DecodeFailure(format!(
                        "failed to read packet after frame {}: {error}",
                        self.next_index
                    )));
                }
            }
        }
    }
}
