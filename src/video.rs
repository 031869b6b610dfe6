//! FFmpeg-backed frame source.
//!
//! [`VideoSource`] opens a video file, probes its metadata, and decodes
//! frames sequentially from the first stream position. Frames are converted
//! to grayscale luma planes for similarity scoring; in materializing mode an
//! RGB decode of each frame is carried alongside for output encoding.
//!
//! Decoding is strictly forward, one frame per [`read_frame`](VideoSource::read_frame)
//! call — the selector and calibrator consume frames in index order and
//! never seek. Repeated passes open a fresh source, which guarantees
//! identical decode results without relying on container-level rewind.
//!
//! # Example
//!
//! ```no_run
//! use distill::{FrameSource, VideoSource};
//!
//! let mut source = VideoSource::open("input.mp4")?;
//! while let Some(frame) = source.read_frame()? {
//!     println!("frame {} at {:?}", frame.index, frame.timestamp);
//! }
//! # Ok::<(), distill::DistillError>(())
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as FfmpegFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, GrayImage, RgbImage};

use crate::conversion;
use crate::error::DistillError;
use crate::metadata::VideoMetadata;
use crate::source::{Frame, FrameSource};

/// Source construction settings.
#[derive(Debug, Clone, Copy, Default)]
#[must_use]
pub struct SourceOptions {
    /// When `true`, each frame carries a full-colour decode in addition to
    /// its luma plane. Count-only passes leave this off to skip the RGB
    /// conversion entirely.
    pub materialize: bool,
}

impl SourceOptions {
    /// Create source options with defaults: count-only (no RGB decode).
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable full-colour frame materialization.
    pub fn with_materialize(mut self, materialize: bool) -> Self {
        self.materialize = materialize;
        self
    }
}

/// A video file decoded as a stream of frames.
///
/// Created via [`open`](VideoSource::open) or
/// [`open_with`](VideoSource::open_with). The FFmpeg demuxer, decoder, and
/// scaler contexts are released when the source is dropped, on every exit
/// path.
pub struct VideoSource {
    input_context: Input,
    decoder: VideoDecoder,
    luma_scaler: ScalingContext,
    rgb_scaler: Option<ScalingContext>,
    video_stream_index: usize,
    metadata: VideoMetadata,
    next_index: u64,
    decoded_frame: FfmpegFrame,
    scaled_frame: FfmpegFrame,
    eof_sent: bool,
    file_path: PathBuf,
}

impl VideoSource {
    /// Open a video file as a count-only frame source.
    ///
    /// # Errors
    ///
    /// Returns [`DistillError::FileOpen`] if the file cannot be opened and
    /// [`DistillError::NoVideoStream`] if it has no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DistillError> {
        Self::open_with(path, &SourceOptions::default())
    }

    /// Open a video file with explicit source options.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        options: &SourceOptions,
    ) -> Result<Self, DistillError> {
        let path = path.as_ref();
        let file_path = path.to_path_buf();

        log::debug!(
            "opening video source: {} (materialize={})",
            file_path.display(),
            options.materialize,
        );

        // Initialise FFmpeg (safe to call multiple times).
        ffmpeg_next::init().map_err(|error| DistillError::FileOpen {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| DistillError::FileOpen {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(DistillError::NoVideoStream)?;
        let video_stream_index = stream.index();

        let decoder_context =
            CodecContext::from_parameters(stream.parameters()).map_err(|error| {
                DistillError::FileOpen {
                    path: file_path.clone(),
                    reason: format!("Failed to read video codec parameters: {error}"),
                }
            })?;
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|error| DistillError::FileOpen {
                path: file_path.clone(),
                reason: format!("Failed to create video decoder: {error}"),
            })?;

        let width = decoder.width();
        let height = decoder.height();

        // Compute frames per second from the stream's average frame rate,
        // falling back to the raw rate field.
        let frame_rate = stream.avg_frame_rate();
        let frames_per_second = if frame_rate.denominator() != 0 {
            frame_rate.numerator() as f64 / frame_rate.denominator() as f64
        } else {
            let rate = stream.rate();
            if rate.denominator() != 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                0.0
            }
        };

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        // Container-reported frame count when present, estimate otherwise.
        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else if frames_per_second > 0.0 {
            (duration.as_secs_f64() * frames_per_second) as u64
        } else {
            0
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width,
            height,
            frames_per_second,
            frame_count,
            duration,
            codec,
        };

        log::debug!(
            "video stream: index={}, {}x{}, {:.2} fps, codec={}, ~{} frames",
            video_stream_index,
            metadata.width,
            metadata.height,
            metadata.frames_per_second,
            metadata.codec,
            metadata.frame_count,
        );

        let luma_scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::GRAY8,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;

        let rgb_scaler = if options.materialize {
            Some(ScalingContext::get(
                decoder.format(),
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?)
        } else {
            None
        };

        Ok(Self {
            input_context,
            decoder,
            luma_scaler,
            rgb_scaler,
            video_stream_index,
            metadata,
            next_index: 0,
            decoded_frame: FfmpegFrame::empty(),
            scaled_frame: FfmpegFrame::empty(),
            eof_sent: false,
            file_path,
        })
    }

    /// The path this source was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Convert the current decoded frame into a [`Frame`].
    fn convert_current_frame(&mut self) -> Result<Frame, DistillError> {
        let width = self.metadata.width;
        let height = self.metadata.height;

        self.luma_scaler
            .run(&self.decoded_frame, &mut self.scaled_frame)?;
        let luma_buffer = conversion::frame_to_buffer(&self.scaled_frame, width, height, 1);
        let luma = GrayImage::from_raw(width, height, luma_buffer).ok_or_else(|| {
            DistillError::VideoDecodeError(
                "Failed to construct luma plane from decoded frame data".to_string(),
            )
        })?;

        let image = match self.rgb_scaler.as_mut() {
            Some(scaler) => {
                scaler.run(&self.decoded_frame, &mut self.scaled_frame)?;
                let rgb_buffer = conversion::frame_to_buffer(&self.scaled_frame, width, height, 3);
                let rgb = RgbImage::from_raw(width, height, rgb_buffer).ok_or_else(|| {
                    DistillError::VideoDecodeError(
                        "Failed to construct RGB image from decoded frame data".to_string(),
                    )
                })?;
                Some(DynamicImage::ImageRgb8(rgb))
            }
            None => None,
        };

        let index = self.next_index;
        self.next_index += 1;

        Ok(Frame {
            index,
            timestamp: conversion::frame_index_to_timestamp(
                index,
                self.metadata.frames_per_second,
            ),
            luma,
            image,
        })
    }
}

impl FrameSource for VideoSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, DistillError> {
        loop {
            // Drain frames the decoder has already produced.
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                return self.convert_current_frame().map(Some);
            }

            if self.eof_sent {
                return Ok(None);
            }

            // Feed the decoder more packets.
            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() == self.video_stream_index {
                        self.decoder
                            .send_packet(&packet)
                            .map_err(|error| DistillError::VideoDecodeError(error.to_string()))?;
                    }
                    // Non-video packets are silently skipped.
                }
                Err(FfmpegError::Eof) => {
                    self.decoder
                        .send_eof()
                        .map_err(|error| DistillError::VideoDecodeError(error.to_string()))?;
                    self.eof_sent = true;
                }
                Err(error) => {
                    return Err(DistillError::VideoDecodeError(error.to_string()));
                }
            }
        }
    }
}
