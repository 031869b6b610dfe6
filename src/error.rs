//! Error types for the `distill` crate.
//!
//! This module defines [`DistillError`], the unified error type returned by all
//! fallible operations in the crate. Errors carry rich context to aid debugging,
//! including file paths, frame counts, and upstream error messages.
//!
//! Not every failure mode in the pipeline surfaces here. Scoring degradations
//! (a structural-similarity computation that cannot run) are absorbed inside
//! the scorer with a histogram-only fallback, and a calibration run that
//! exhausts its iteration budget returns a best-effort
//! [`InferenceResult`](crate::InferenceResult) with `converged == false`
//! rather than an error. Only precondition violations and unrecoverable I/O
//! failures propagate.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `distill` operations.
///
/// Every public method that can fail returns `Result<T, DistillError>`.
/// Variants carry enough context to diagnose the problem without needing
/// additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DistillError {
    /// The video file could not be opened.
    #[error("Failed to open video file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::VideoSource::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded.
    ///
    /// Raised by the frame source mid-stream. The keyframe selector absorbs
    /// this by ending the pass early; it only propagates from operations
    /// that read frames directly.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The requested target frame count cannot be produced from this video.
    ///
    /// Raised by the threshold calibrator before any search pass runs.
    #[error("Target frame count {target} is out of range (video has {total_frames} decodable frames)")]
    TargetOutOfRange {
        /// The number of keyframes the caller asked for.
        target: u64,
        /// The total number of decodable frames in the video.
        total_frames: u64,
    },

    /// A similarity threshold outside `[0, 1]` was provided.
    #[error("Similarity threshold {0} is outside [0.0, 1.0]")]
    InvalidThreshold(f64),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while encoding an output frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<FfmpegError> for DistillError {
    fn from(error: FfmpegError) -> Self {
        DistillError::FfmpegError(error.to_string())
    }
}
