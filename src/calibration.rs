//! Similarity-threshold calibration.
//!
//! Callers usually know how many keyframes they want, not which similarity
//! threshold produces that many. [`ThresholdCalibrator`] binary-searches the
//! threshold space, running a full count-only selection pass per candidate,
//! until the resulting keyframe count lands within a relative tolerance of
//! the target or the iteration budget runs out.
//!
//! The search leans on a monotonicity property of the selector: raising the
//! threshold makes the "score below threshold" test easier to satisfy, so
//! the keyframe count never decreases. Each iteration re-decodes the entire
//! video, which is the dominant cost; total work is bounded by
//! `max_iterations × video length`.
//!
//! Every iteration opens a **fresh** source through the caller-supplied
//! opener — exact rewind is never assumed, and decoded-frame caching is
//! deliberately unavailable here so a stale replay cannot skew the search.
//!
//! # Example
//!
//! ```no_run
//! use distill::{CalibrationOptions, ThresholdCalibrator, VideoSource};
//!
//! let calibrator = ThresholdCalibrator::new(
//!     || VideoSource::open("input.mp4"),
//!     120,
//!     &CalibrationOptions::new().with_tolerance(0.01),
//! );
//! let result = calibrator.run()?;
//! println!(
//!     "threshold {:.5} -> {} frames in {} iterations (converged: {})",
//!     result.optimal_threshold, result.frame_count, result.iterations, result.converged,
//! );
//! # Ok::<(), distill::DistillError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::error::DistillError;
use crate::progress::{
    CancellationToken, NoOpProgress, OperationType, ProgressCallback, ProgressTracker,
};
use crate::selector::{AnchorPolicy, KeyframeSelector, SelectorOptions};
use crate::source::FrameSource;

/// Default iteration budget for the binary search.
pub const DEFAULT_MAX_ITERATIONS: u32 = 50;

/// Default relative tolerance between achieved and target frame count.
pub const DEFAULT_TOLERANCE: f64 = 0.005;

/// One tried threshold and the keyframe count it produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchStep {
    /// The candidate threshold.
    pub threshold: f64,
    /// Keyframes selected over the full video at that threshold.
    pub frame_count: u64,
}

/// Outcome of a calibration run.
///
/// Produced exactly once, on success or on budget exhaustion. When the
/// search did not converge, `optimal_threshold` and `frame_count` are the
/// last candidate tried and `converged` is `false`.
#[derive(Debug, Clone)]
#[must_use]
pub struct InferenceResult {
    /// The threshold the search settled on.
    pub optimal_threshold: f64,
    /// The keyframe count that threshold produced.
    pub frame_count: u64,
    /// Search iterations consumed. Always equals `search_path.len()` and
    /// never exceeds the configured budget.
    pub iterations: u32,
    /// Every `(threshold, count)` pair tried, in order.
    pub search_path: Vec<SearchStep>,
    /// Whether the final count is within tolerance of the target.
    pub converged: bool,
}

/// Calibration settings.
///
/// Carries the iteration budget, the convergence tolerance, the anchor
/// policy the per-pass selectors use, and optional progress/cancellation
/// hooks.
#[derive(Clone)]
pub struct CalibrationOptions {
    /// Maximum number of binary-search iterations.
    pub max_iterations: u32,
    /// Allowed relative deviation `|count - target| / target`.
    pub tolerance: f64,
    /// Anchor policy for the per-pass selectors. Use the same policy for
    /// extraction so the calibrated threshold transfers exactly.
    pub policy: AnchorPolicy,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for CalibrationOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CalibrationOptions")
            .field("max_iterations", &self.max_iterations)
            .field("tolerance", &self.tolerance)
            .field("policy", &self.policy)
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationOptions {
    /// Create calibration options with defaults: 50 iterations, 0.5%
    /// tolerance, dual-observed anchors, no progress, no cancellation.
    pub fn new() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            policy: AnchorPolicy::default(),
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }

    /// Set the iteration budget.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the relative convergence tolerance (e.g. `0.005` for 0.5%).
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.max(0.0);
        self
    }

    /// Set the anchor policy used by the per-pass selectors.
    #[must_use]
    pub fn with_policy(mut self, policy: AnchorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attach a progress callback, invoked once per completed iteration
    /// with `current = iteration` and `total = max_iterations`.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token, checked between iterations.
    ///
    /// Cancelling aborts the run with [`DistillError::Cancelled`] without
    /// leaving a source open mid-pass.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}

/// Binary-search engine for the similarity threshold.
///
/// Generic over the frame source so the search logic is independent of the
/// FFmpeg decode path; `open_source` is called once up front for metadata
/// validation and once per search iteration.
pub struct ThresholdCalibrator<S, F>
where
    S: FrameSource,
    F: FnMut() -> Result<S, DistillError>,
{
    open_source: F,
    target: u64,
    options: CalibrationOptions,
}

impl<S, F> ThresholdCalibrator<S, F>
where
    S: FrameSource,
    F: FnMut() -> Result<S, DistillError>,
{
    /// Create a calibrator targeting `target` keyframes.
    pub fn new(open_source: F, target: u64, options: &CalibrationOptions) -> Self {
        Self {
            open_source,
            target,
            options: options.clone(),
        }
    }

    /// Run the search to completion.
    ///
    /// # Errors
    ///
    /// - [`DistillError::TargetOutOfRange`] if the target is zero or exceeds
    ///   the video's decodable frame count — checked before any search pass.
    /// - [`DistillError::Cancelled`] if the attached token is cancelled
    ///   between iterations.
    /// - Any error from the source opener.
    ///
    /// Budget exhaustion is **not** an error: the last candidate is returned
    /// as a best-effort result with `converged == false`.
    pub fn run(mut self) -> Result<InferenceResult, DistillError> {
        let total_frames = {
            let probe = (self.open_source)()?;
            probe.metadata().frame_count
        };

        if self.target == 0 || self.target > total_frames {
            return Err(DistillError::TargetOutOfRange {
                target: self.target,
                total_frames,
            });
        }

        log::debug!(
            "calibrating threshold for {} of {} frames (tolerance {}, budget {} iterations); \
             each pass decodes fresh, caching disabled",
            self.target,
            total_frames,
            self.options.tolerance,
            self.options.max_iterations,
        );

        let selector_options = SelectorOptions::new().with_policy(self.options.policy);
        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            OperationType::ThresholdCalibration,
            Some(self.options.max_iterations as u64),
            1,
        );

        let mut low = 0.0_f64;
        let mut high = 1.0_f64;
        let mut search_path: Vec<SearchStep> = Vec::new();
        let mut last_step: Option<SearchStep> = None;
        let mut iteration = 0_u32;

        while iteration < self.options.max_iterations {
            if self.options.is_cancelled() {
                return Err(DistillError::Cancelled);
            }

            let candidate = (low + high) / 2.0;
            log::debug!(
                "iteration {}/{}: trying threshold {:.5}",
                iteration + 1,
                self.options.max_iterations,
                candidate,
            );

            let source = (self.open_source)()?;
            let selector = KeyframeSelector::new(source, candidate, &selector_options)?;
            let frame_count = selector.count_keyframes();

            let step = SearchStep {
                threshold: candidate,
                frame_count,
            };
            search_path.push(step);
            last_step = Some(step);
            tracker.advance(None);

            if within_tolerance(frame_count, self.target, self.options.tolerance) {
                log::debug!(
                    "threshold {:.5} produced {} frames (target {}), within tolerance",
                    candidate,
                    frame_count,
                    self.target,
                );
                tracker.finish();
                return Ok(InferenceResult {
                    optimal_threshold: candidate,
                    frame_count,
                    iterations: iteration + 1,
                    search_path,
                    converged: true,
                });
            }

            if frame_count < self.target {
                log::debug!("low {:.5} -> {:.5}", low, candidate);
                low = candidate;
            } else {
                log::debug!("high {:.5} -> {:.5}", high, candidate);
                high = candidate;
            }

            iteration += 1;
        }

        tracker.finish();

        // Budget exhausted: the last candidate is the best effort we have.
        let best = last_step.unwrap_or(SearchStep {
            threshold: (low + high) / 2.0,
            frame_count: 0,
        });
        log::warn!(
            "calibration did not converge within {} iterations; threshold {:.5} produced {} frames (target {})",
            self.options.max_iterations,
            best.threshold,
            best.frame_count,
            self.target,
        );

        Ok(InferenceResult {
            optimal_threshold: best.threshold,
            frame_count: best.frame_count,
            iterations: iteration,
            search_path,
            converged: false,
        })
    }
}

/// Relative-error convergence test with an explicit epsilon guard.
///
/// The guard keeps the comparison stable across platforms when the error
/// ratio lands exactly on the tolerance boundary.
pub(crate) fn within_tolerance(frame_count: u64, target: u64, tolerance: f64) -> bool {
    let error_ratio = (frame_count as f64 - target as f64).abs() / target as f64;
    error_ratio <= tolerance + f64::EPSILON
}
