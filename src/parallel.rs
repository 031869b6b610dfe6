//! Parallel batch scoring for count-only passes.
//!
//! This module provides [`count_keyframes_parallel`], which offloads the
//! per-frame similarity computation of a count-only pass to a [`rayon`]
//! worker pool. Frames are read sequentially in batches; each batch's
//! scores are computed in parallel and reintegrated in read order before
//! the threshold test, so the result is identical to the sequential
//! [`count_keyframes`](crate::KeyframeSelector::count_keyframes).
//!
//! Only the scoring sub-step parallelises. Under
//! [`AnchorPolicy::DualObserved`] a frame's anchors are the previous two
//! *observed* frames — fixed stream positions, independent of any selection
//! outcome — so scores for a whole batch can be computed at once. Under
//! [`AnchorPolicy::SingleRetained`] the anchor is the previous *selected*
//! frame, which makes frame N's score depend on frame N−1's decision; that
//! policy falls back to the sequential selector.
//!
//! This module is available when the `rayon` feature is enabled.

use image::GrayImage;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::DistillError;
use crate::selector::{AnchorPolicy, KeyframeSelector, SelectorOptions};
use crate::similarity::frame_similarity;
use crate::source::FrameSource;

/// Count keyframes with batch-parallel similarity scoring.
///
/// Reads `batch_size` frames at a time (clamped to a minimum of 1) and
/// scores each batch across the rayon pool. Produces the same count as the
/// sequential selector for every policy; policies whose anchors depend on
/// selection outcomes simply run sequentially.
///
/// A mid-stream decode failure ends the pass early with a warning and the
/// count so far, matching the sequential selector's failure semantics.
///
/// # Errors
///
/// Returns [`DistillError::InvalidThreshold`] if `threshold` is outside
/// `[0.0, 1.0]`.
pub fn count_keyframes_parallel<S: FrameSource>(
    source: S,
    threshold: f64,
    options: &SelectorOptions,
    batch_size: usize,
) -> Result<u64, DistillError> {
    if options.policy != AnchorPolicy::DualObserved || !options.detect_keyframes {
        log::debug!("selection is anchor-sequential; counting without the worker pool");
        let selector = KeyframeSelector::new(source, threshold, options)?;
        return Ok(selector.count_keyframes());
    }

    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(DistillError::InvalidThreshold(threshold));
    }

    let mut source = source;
    let batch_size = batch_size.max(1);
    let mut count = 0_u64;
    let mut frames_observed = 0_u64;
    // The last two luma planes of the previous batch, oldest first.
    let mut tail: Vec<GrayImage> = Vec::with_capacity(2);
    let mut truncated = false;

    loop {
        let mut batch: Vec<GrayImage> = Vec::with_capacity(batch_size);
        while batch.len() < batch_size {
            match source.read_frame() {
                Ok(Some(frame)) => batch.push(frame.luma),
                Ok(None) => break,
                Err(error) => {
                    log::warn!(
                        "frame decode failed after {} frames, ending pass early: {error}",
                        frames_observed + batch.len() as u64,
                    );
                    truncated = true;
                    break;
                }
            }
        }

        if batch.is_empty() {
            break;
        }

        // Window = [tail | batch]; frame at window index i anchors on i-1
        // and i-2.
        let window: Vec<&GrayImage> = tail.iter().chain(batch.iter()).collect();
        let offset = tail.len();

        let decisions: Vec<bool> = (offset..window.len())
            .into_par_iter()
            .map(|position| {
                let current = window[position];
                if position == 0 {
                    // First observed frame of the stream.
                    return true;
                }
                let previous = window[position - 1];
                let two_back = if position >= 2 {
                    window[position - 2]
                } else {
                    previous
                };
                frame_similarity(current, previous) < threshold
                    || frame_similarity(current, two_back) < threshold
            })
            .collect();

        count += decisions.into_iter().filter(|&selected| selected).count() as u64;
        frames_observed += batch.len() as u64;

        // Carry the last two observed lumas into the next batch.
        let keep_from = batch.len().saturating_sub(2);
        let mut carried: Vec<GrayImage> = batch.split_off(keep_from);
        if carried.len() < 2 {
            if let Some(previous_tail) = tail.pop() {
                carried.insert(0, previous_tail);
            }
        }
        tail = carried;

        if truncated {
            break;
        }
    }

    Ok(count)
}
