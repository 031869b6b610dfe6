//! Path-level entry points.
//!
//! These functions tie the FFmpeg source, the keyframe selector, and the
//! threshold calibrator together for the common workflows:
//!
//! - [`infer_threshold`] — find the similarity threshold that yields
//!   approximately a target number of keyframes.
//! - [`extract_keyframes`] — write the keyframes selected at a threshold to
//!   an output directory.
//! - [`sweep_thresholds`] — count keyframes at several thresholds, decoding
//!   the video once when caching is enabled.
//!
//! Calibrate and extract with the same [`AnchorPolicy`](crate::AnchorPolicy)
//! and the inferred threshold transfers exactly: extraction will produce the
//! frame count calibration reported.
//!
//! # Example
//!
//! ```no_run
//! use distill::{CalibrationOptions, ExtractOptions};
//!
//! let result = distill::infer_threshold("input.mp4", 120, &CalibrationOptions::new())?;
//! let files = distill::extract_keyframes(
//!     "input.mp4",
//!     "keyframes/",
//!     result.optimal_threshold,
//!     &ExtractOptions::new(),
//! )?;
//! println!("wrote {} keyframes", files.len());
//! # Ok::<(), distill::DistillError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::calibration::{CalibrationOptions, InferenceResult, ThresholdCalibrator};
use crate::config::ExtractOptions;
use crate::error::DistillError;
use crate::progress::{OperationType, ProgressTracker};
use crate::selector::KeyframeSelector;
use crate::source::{CachedSource, FrameSource};
use crate::video::{SourceOptions, VideoSource};

/// Find the similarity threshold that produces approximately
/// `target_frames` keyframes.
///
/// Runs the binary-search calibrator over the video at `path`, opening a
/// fresh source for every search pass. See
/// [`ThresholdCalibrator`] for the search semantics and
/// [`InferenceResult`] for what comes back.
///
/// # Errors
///
/// - [`DistillError::FileOpen`] if the video cannot be opened.
/// - [`DistillError::TargetOutOfRange`] if `target_frames` is zero or
///   exceeds the video's decodable frame count (checked before any pass).
/// - [`DistillError::Cancelled`] if a cancellation token fires between
///   iterations.
pub fn infer_threshold<P: AsRef<Path>>(
    path: P,
    target_frames: u64,
    options: &CalibrationOptions,
) -> Result<InferenceResult, DistillError> {
    let path = path.as_ref().to_path_buf();
    ThresholdCalibrator::new(move || VideoSource::open(&path), target_frames, options).run()
}

/// Extract the keyframes selected at `threshold` to image files.
///
/// Writes one file per keyframe into `output_dir` (created if missing),
/// named `frame_<index>.<ext>` with the index zero-padded to six digits,
/// and returns the paths in selection order. With
/// [`detect_keyframes`](ExtractOptions::with_detect_keyframes) disabled
/// every decoded frame is written instead.
///
/// Progress reports carry `current = frames processed` against the
/// estimated total, fired every
/// [`buffer_size`](ExtractOptions::with_buffer_size) frames.
///
/// # Errors
///
/// - [`DistillError::FileOpen`] if the video cannot be opened.
/// - [`DistillError::InvalidThreshold`] if `threshold` is outside `[0, 1]`.
/// - [`DistillError::Cancelled`] if a cancellation token fires mid-pass.
/// - [`DistillError::IoError`] / [`DistillError::ImageError`] if an output
///   file cannot be written.
pub fn extract_keyframes<P: AsRef<Path>, Q: AsRef<Path>>(
    path: P,
    output_dir: Q,
    threshold: f64,
    options: &ExtractOptions,
) -> Result<Vec<PathBuf>, DistillError> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;

    let source = VideoSource::open_with(&path, &SourceOptions::new().with_materialize(true))?;
    let total_frames = source.metadata().frame_count;

    log::debug!(
        "extracting keyframes from {} at threshold {:.5} into {}",
        path.as_ref().display(),
        threshold,
        output_dir.display(),
    );

    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::FrameExtraction,
        (total_frames > 0).then_some(total_frames),
        options.buffer_size,
    );

    let extension = options.output_format.extension();
    let mut selector = KeyframeSelector::new(source, threshold, &options.selector_options())?;
    let mut output_files = Vec::new();
    let mut frames_reported = 0_u64;

    while let Some(keyframe) = selector.next() {
        if options.is_cancelled() {
            return Err(DistillError::Cancelled);
        }

        let Some(image) = keyframe.image else {
            log::warn!("keyframe {} carried no pixel data, skipping", keyframe.index);
            continue;
        };

        let output_path = output_dir.join(format!("frame_{:06}.{extension}", keyframe.index));
        image.save(&output_path)?;
        output_files.push(output_path);

        let observed = selector.frames_observed();
        tracker.advance_by(observed - frames_reported, Some(keyframe.index));
        frames_reported = observed;
    }

    // Account for trailing frames that were scored but not selected.
    let observed = selector.frames_observed();
    if observed > frames_reported {
        tracker.advance_by(observed - frames_reported, None);
    }
    tracker.finish();

    log::debug!(
        "extraction finished: {} keyframes from {} decoded frames",
        output_files.len(),
        observed,
    );

    Ok(output_files)
}

/// Count keyframes at each of several thresholds.
///
/// With [`enable_cache`](ExtractOptions::with_enable_cache) on (the
/// default) the video is decoded once and replayed from memory for every
/// threshold; otherwise each threshold opens a fresh source. Either way,
/// every pass runs a fresh selector with empty context, and the returned
/// `(threshold, count)` pairs follow the input order.
///
/// # Errors
///
/// - [`DistillError::FileOpen`] if the video cannot be opened.
/// - [`DistillError::InvalidThreshold`] if any threshold is outside `[0, 1]`.
/// - [`DistillError::Cancelled`] if a cancellation token fires between
///   passes.
pub fn sweep_thresholds<P: AsRef<Path>>(
    path: P,
    thresholds: &[f64],
    options: &ExtractOptions,
) -> Result<Vec<(f64, u64)>, DistillError> {
    let path = path.as_ref();
    let selector_options = options.selector_options();
    let mut counts = Vec::with_capacity(thresholds.len());

    if options.enable_cache {
        let mut cached = CachedSource::new(VideoSource::open(path)?);
        for &threshold in thresholds {
            if options.is_cancelled() {
                return Err(DistillError::Cancelled);
            }
            let selector = KeyframeSelector::new(&mut cached, threshold, &selector_options)?;
            counts.push((threshold, selector.count_keyframes()));
            cached.rewind();
        }
    } else {
        for &threshold in thresholds {
            if options.is_cancelled() {
                return Err(DistillError::Cancelled);
            }
            let source = VideoSource::open(path)?;
            let selector = KeyframeSelector::new(source, threshold, &selector_options)?;
            counts.push((threshold, selector.count_keyframes()));
        }
    }

    Ok(counts)
}
