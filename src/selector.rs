//! Keyframe selection.
//!
//! [`KeyframeSelector`] consumes a [`FrameSource`] and a similarity
//! threshold and yields the frames judged sufficiently novel relative to
//! recently retained context. Selection is lazy — frames are scored as the
//! iterator is driven — and restartable by constructing a new selector over
//! a fresh source; context is never reused across streams.
//!
//! Two anchor policies are supported (see [`AnchorPolicy`]). Under both,
//! the first frame of a non-empty stream is always selected and selected
//! indices are strictly increasing from 0.
//!
//! # Example
//!
//! ```no_run
//! use distill::{KeyframeSelector, SelectorOptions, VideoSource};
//!
//! let source = VideoSource::open("input.mp4")?;
//! let selector = KeyframeSelector::new(source, 0.65, &SelectorOptions::default())?;
//! for keyframe in selector {
//!     println!("selected frame {} at {:?}", keyframe.index, keyframe.timestamp);
//! }
//! # Ok::<(), distill::DistillError>(())
//! ```

use std::time::Duration;

use image::{DynamicImage, GrayImage};

use crate::error::DistillError;
use crate::similarity::frame_similarity;
use crate::source::{CachedSource, FrameSource};

/// Which recent frames a candidate is compared against.
///
/// The two call sites in the surrounding system historically used different
/// anchor semantics; both are kept behind this explicit switch so the
/// calibrator and the extraction path can be configured identically and
/// calibration results transfer exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorPolicy {
    /// Compare against the previous frame and the frame two steps back,
    /// whether or not those frames were themselves selected. The two-back
    /// anchor degenerates to the previous frame until two frames have been
    /// observed. A candidate is selected when **either** comparison scores
    /// below the threshold. This is the canonical default.
    #[default]
    DualObserved,
    /// Compare only against the most recently **selected** frame; a
    /// selected candidate replaces it as the sole anchor.
    SingleRetained,
}

/// Keyframe selection settings.
///
/// # Example
///
/// ```
/// use distill::{AnchorPolicy, SelectorOptions};
///
/// let options = SelectorOptions::new()
///     .with_policy(AnchorPolicy::SingleRetained);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct SelectorOptions {
    /// Anchor policy used for similarity comparisons.
    pub policy: AnchorPolicy,
    /// When `false`, the similarity test is skipped entirely and every
    /// decoded frame is yielded.
    pub detect_keyframes: bool,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            policy: AnchorPolicy::default(),
            detect_keyframes: true,
        }
    }
}

impl SelectorOptions {
    /// Create selection options with defaults: dual-observed anchors,
    /// keyframe detection enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the anchor policy.
    pub fn with_policy(mut self, policy: AnchorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable or disable keyframe detection. When disabled every frame is
    /// yielded, which turns extraction into a plain frame dump.
    pub fn with_detect_keyframes(mut self, detect: bool) -> Self {
        self.detect_keyframes = detect;
        self
    }
}

/// A frame selected as sufficiently distinct from recent context.
#[derive(Debug, Clone)]
pub struct Keyframe {
    /// Zero-based index of the frame in the source stream.
    pub index: u64,
    /// Presentation time of the frame.
    pub timestamp: Duration,
    /// Full-colour pixel data, present when the source materializes frames.
    pub image: Option<DynamicImage>,
}

/// Fixed-capacity ring of luma anchors, oldest evicted first.
///
/// Capacity is 1 for [`AnchorPolicy::SingleRetained`] and 2 for
/// [`AnchorPolicy::DualObserved`]; the buffer never grows past it.
struct ContextRing {
    slots: Vec<GrayImage>,
    capacity: usize,
    cursor: usize,
}

impl ContextRing {
    fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    fn push(&mut self, anchor: GrayImage) {
        if self.slots.len() < self.capacity {
            self.slots.push(anchor);
        } else {
            self.slots[self.cursor] = anchor;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    /// The most recently pushed anchor.
    fn latest(&self) -> Option<&GrayImage> {
        if self.slots.is_empty() {
            return None;
        }
        let index = (self.cursor + self.capacity - 1) % self.capacity;
        self.slots.get(index).or_else(|| self.slots.last())
    }

    /// The anchor pushed before the latest one.
    fn previous(&self) -> Option<&GrayImage> {
        if self.slots.len() < 2 {
            return None;
        }
        let index = (self.cursor + self.capacity - 2) % self.capacity;
        self.slots.get(index)
    }

    fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Lazy iterator over the keyframes of a frame stream.
///
/// Driving the iterator is the materializing mode; pixel payloads pass
/// through from the source untouched. [`count_keyframes`](KeyframeSelector::count_keyframes)
/// is the count-only mode used by calibration.
///
/// A mid-stream decode failure ends the pass early with a warning — the
/// keyframes yielded so far are the complete result for the pass. An empty
/// stream yields nothing.
pub struct KeyframeSelector<S: FrameSource> {
    source: S,
    threshold: f64,
    policy: AnchorPolicy,
    detect_keyframes: bool,
    context: ContextRing,
    frames_observed: u64,
    done: bool,
}

impl<S: FrameSource> KeyframeSelector<S> {
    /// Create a selector over `source` with the given similarity threshold.
    ///
    /// # Errors
    ///
    /// Returns [`DistillError::InvalidThreshold`] if `threshold` is outside
    /// `[0.0, 1.0]` or not finite.
    pub fn new(
        source: S,
        threshold: f64,
        options: &SelectorOptions,
    ) -> Result<Self, DistillError> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(DistillError::InvalidThreshold(threshold));
        }

        let capacity = match options.policy {
            AnchorPolicy::SingleRetained => 1,
            AnchorPolicy::DualObserved => 2,
        };

        Ok(Self {
            source,
            threshold,
            policy: options.policy,
            detect_keyframes: options.detect_keyframes,
            context: ContextRing::new(capacity),
            frames_observed: 0,
            done: false,
        })
    }

    /// Number of frames read from the source so far, selected or not.
    pub fn frames_observed(&self) -> u64 {
        self.frames_observed
    }

    /// Consume the selector and count the keyframes without materializing
    /// them.
    ///
    /// This is the calibration fast path: pixel payloads are dropped as
    /// soon as each frame has been scored.
    pub fn count_keyframes(self) -> u64 {
        self.map(|_| ()).count() as u64
    }

    /// Apply the anchor policy to one observed frame's luma plane.
    fn is_novel(&mut self, luma: &GrayImage) -> bool {
        if self.context.is_empty() {
            // First observed frame: always a keyframe.
            self.context.push(luma.clone());
            return true;
        }

        let selected = match self.policy {
            AnchorPolicy::SingleRetained => self
                .context
                .latest()
                .is_some_and(|anchor| frame_similarity(luma, anchor) < self.threshold),
            AnchorPolicy::DualObserved => self.context.latest().is_some_and(|previous| {
                frame_similarity(luma, previous) < self.threshold || {
                    let two_back = self.context.previous().unwrap_or(previous);
                    frame_similarity(luma, two_back) < self.threshold
                }
            }),
        };

        // Dual-observed anchors track every observed frame; the single
        // anchor tracks only retained ones.
        match self.policy {
            AnchorPolicy::DualObserved => self.context.push(luma.clone()),
            AnchorPolicy::SingleRetained if selected => self.context.push(luma.clone()),
            AnchorPolicy::SingleRetained => {}
        }

        selected
    }
}

impl<S: FrameSource> Iterator for KeyframeSelector<S> {
    type Item = Keyframe;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let frame = match self.source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(error) => {
                    // Truncated pass: whatever was selected so far stands.
                    log::warn!(
                        "frame decode failed after {} frames, ending pass early: {error}",
                        self.frames_observed,
                    );
                    self.done = true;
                    return None;
                }
            };

            self.frames_observed += 1;

            if !self.detect_keyframes {
                return Some(Keyframe {
                    index: frame.index,
                    timestamp: frame.timestamp,
                    image: frame.image,
                });
            }

            if self.is_novel(&frame.luma) {
                return Some(Keyframe {
                    index: frame.index,
                    timestamp: frame.timestamp,
                    image: frame.image,
                });
            }
        }
        None
    }
}

/// Count keyframes at several thresholds over a single decode of `source`.
///
/// The source is wrapped in a [`CachedSource`] so frames are decoded once
/// and replayed for every threshold; each pass runs a fresh selector with
/// empty context. Returns one `(threshold, count)` pair per input threshold
/// in the given order.
///
/// # Errors
///
/// Returns [`DistillError::InvalidThreshold`] if any threshold is outside
/// `[0.0, 1.0]`.
pub fn count_keyframes_for_thresholds<S: FrameSource>(
    source: S,
    thresholds: &[f64],
    options: &SelectorOptions,
) -> Result<Vec<(f64, u64)>, DistillError> {
    let mut cached = CachedSource::new(source);
    let mut counts = Vec::with_capacity(thresholds.len());

    for &threshold in thresholds {
        let selector = KeyframeSelector::new(&mut cached, threshold, options)?;
        counts.push((threshold, selector.count_keyframes()));
        cached.rewind();
    }

    Ok(counts)
}
