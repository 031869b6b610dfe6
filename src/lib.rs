//! # distill
//!
//! Distill videos into their distinct keyframes — similarity-based frame
//! selection with automatic threshold calibration.
//!
//! `distill` walks a video frame by frame, scores each frame against its
//! recent context with a combined histogram-correlation + SSIM metric, and
//! keeps only the frames that are dissimilar enough to matter. Because the
//! "dissimilar enough" cutoff is a single tunable threshold — and callers
//! usually want a *frame count*, not a threshold — the crate also ships a
//! binary-search calibrator that finds the threshold producing approximately
//! a target number of keyframes. Decoding is powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Extract Keyframes at a Known Threshold
//!
//! ```no_run
//! use distill::ExtractOptions;
//!
//! let files = distill::extract_keyframes(
//!     "input.mp4",
//!     "keyframes/",
//!     0.65,
//!     &ExtractOptions::new(),
//! ).unwrap();
//! println!("wrote {} keyframes", files.len());
//! ```
//!
//! ### Calibrate a Threshold for a Target Frame Count
//!
//! ```no_run
//! use distill::CalibrationOptions;
//!
//! let result = distill::infer_threshold("input.mp4", 120, &CalibrationOptions::new()).unwrap();
//! println!(
//!     "threshold {:.5} -> {} frames in {} iterations",
//!     result.optimal_threshold, result.frame_count, result.iterations,
//! );
//! ```
//!
//! ### Drive the Selector Directly
//!
//! ```no_run
//! use distill::{KeyframeSelector, SelectorOptions, VideoSource};
//!
//! let source = VideoSource::open("input.mp4").unwrap();
//! let selector = KeyframeSelector::new(source, 0.65, &SelectorOptions::default()).unwrap();
//! for keyframe in selector {
//!     println!("frame {} at {:?}", keyframe.index, keyframe.timestamp);
//! }
//! ```
//!
//! ## Features
//!
//! - **Keyframe selection** — lazy, restartable iterator over the frames
//!   judged sufficiently novel; count-only fast path for calibration
//! - **Two anchor policies** — compare against the last *retained* frame or
//!   the last two *observed* frames, selectable per pass
//! - **Threshold calibration** — binary search over `[0, 1]` until the
//!   keyframe count lands within a relative tolerance of the target, with
//!   the full search path in the result
//! - **Composite similarity metric** — 256-bin histogram correlation
//!   averaged with windowed SSIM, degrading gracefully to histogram-only
//!   when SSIM cannot be computed
//! - **Threshold sweeps** — count keyframes at many thresholds over a
//!   single decode via an in-memory replay cache
//! - **Pluggable frame sources** — the selector and calibrator consume a
//!   small [`FrameSource`] trait; bring your own decoded frames for tests
//!   or embedding
//! - **Progress & cancellation** — cooperative callbacks and
//!   `CancellationToken` for long-running passes
//! - **Rich metadata** — dimensions, frame rate, estimated frame count,
//!   duration, codec name, probed once per source
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | `count_keyframes_parallel()` scores frame batches across rayon threads |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system for the
//! [`VideoSource`] decode path; the selector and calibrator themselves run
//! against any [`FrameSource`].

pub mod calibration;
pub mod config;
mod conversion;
pub mod error;
mod extract;
pub mod ffmpeg;
pub mod metadata;
#[cfg(feature = "rayon")]
pub mod parallel;
pub mod progress;
pub mod selector;
pub mod similarity;
pub mod source;
pub mod video;

pub use calibration::{
    CalibrationOptions, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE, InferenceResult, SearchStep,
    ThresholdCalibrator,
};
pub use config::{ExtractOptions, OutputFormat};
pub use error::DistillError;
pub use extract::{extract_keyframes, infer_threshold, sweep_thresholds};
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use metadata::VideoMetadata;
#[cfg(feature = "rayon")]
pub use parallel::count_keyframes_parallel;
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use selector::{
    AnchorPolicy, Keyframe, KeyframeSelector, SelectorOptions, count_keyframes_for_thresholds,
};
pub use similarity::{frame_similarity, histogram_correlation, structural_similarity};
pub use source::{CachedSource, Frame, FrameSource};
pub use video::{SourceOptions, VideoSource};
