//! Frame source abstraction.
//!
//! [`FrameSource`] is the narrow interface the selector and calibrator
//! consume: a stream of decoded frames plus the metadata probed at open
//! time. The FFmpeg-backed implementation lives in
//! [`VideoSource`](crate::VideoSource); tests and embedders can provide
//! their own sources (synthetic sequences, pre-decoded buffers).
//!
//! [`CachedSource`] wraps any source with an in-memory replay buffer so
//! repeated passes over the same stream — a threshold sweep, for example —
//! decode each frame only once. The threshold calibrator deliberately does
//! **not** use it: each calibration iteration opens a fresh source so a
//! stale replay can never skew the search.

use std::time::Duration;

use image::{DynamicImage, GrayImage};

use crate::error::DistillError;
use crate::metadata::VideoMetadata;

/// A single decoded frame.
///
/// Frames are transient: the selector consumes them as they are read and
/// retains only the luma planes it keeps as comparison anchors. `image` is
/// populated only when the source was opened in materializing mode; the
/// count-only calibration path never carries pixel payloads beyond `luma`.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Zero-based position of this frame in the stream.
    pub index: u64,
    /// Presentation time, `index / frames_per_second`.
    pub timestamp: Duration,
    /// Single-channel intensity plane used for similarity scoring.
    pub luma: GrayImage,
    /// Full-colour decode of the frame, when materializing.
    pub image: Option<DynamicImage>,
}

/// A restartable-by-reconstruction stream of decoded video frames.
///
/// Implementations yield frames in strictly increasing index order starting
/// at 0 and return `Ok(None)` at end of stream. A decode failure surfaces
/// as [`DistillError::VideoDecodeError`]; callers that tolerate truncated
/// streams (the keyframe selector does) treat the frames read so far as the
/// complete result.
pub trait FrameSource {
    /// Metadata probed when the source was opened.
    fn metadata(&self) -> &VideoMetadata;

    /// Read the next frame, or `Ok(None)` once the stream is exhausted.
    fn read_frame(&mut self) -> Result<Option<Frame>, DistillError>;
}

/// Replay-caching wrapper around a [`FrameSource`].
///
/// The first pass pulls frames from the inner source and records them;
/// [`rewind`](CachedSource::rewind) then restarts the stream from the
/// recorded frames without touching the inner source again. Every pass
/// observes byte-identical frames.
///
/// The cache holds every frame it has served, so memory scales with stream
/// length; intended for count-only passes (luma planes) over videos of
/// moderate size.
///
/// # Example
///
/// ```no_run
/// use distill::{CachedSource, KeyframeSelector, SelectorOptions, VideoSource};
///
/// let source = VideoSource::open("input.mp4")?;
/// let mut cached = CachedSource::new(source);
///
/// for threshold in [0.2, 0.5, 0.8] {
///     let selector = KeyframeSelector::new(&mut cached, threshold, &SelectorOptions::default())?;
///     println!("{threshold}: {} keyframes", selector.count_keyframes());
///     cached.rewind();
/// }
/// # Ok::<(), distill::DistillError>(())
/// ```
pub struct CachedSource<S: FrameSource> {
    inner: S,
    recorded: Vec<Frame>,
    position: usize,
    inner_exhausted: bool,
}

impl<S: FrameSource> CachedSource<S> {
    /// Wrap a source with an empty replay buffer.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            recorded: Vec::new(),
            position: 0,
            inner_exhausted: false,
        }
    }

    /// Restart the stream from the beginning of the replay buffer.
    ///
    /// Frames not yet pulled from the inner source are read (and recorded)
    /// on demand after the buffer is drained.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Number of frames recorded so far.
    pub fn recorded_frames(&self) -> usize {
        self.recorded.len()
    }

    /// Discard the replay buffer and return the inner source.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: FrameSource> FrameSource for CachedSource<S> {
    fn metadata(&self) -> &VideoMetadata {
        self.inner.metadata()
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, DistillError> {
        if self.position < self.recorded.len() {
            let frame = self.recorded[self.position].clone();
            self.position += 1;
            return Ok(Some(frame));
        }

        if self.inner_exhausted {
            return Ok(None);
        }

        match self.inner.read_frame()? {
            Some(frame) => {
                self.recorded.push(frame.clone());
                self.position = self.recorded.len();
                Ok(Some(frame))
            }
            None => {
                self.inner_exhausted = true;
                Ok(None)
            }
        }
    }
}

// A source behind a mutable reference is still a source; this lets the
// selector consume `&mut CachedSource` so the caller can rewind afterwards.
impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn metadata(&self) -> &VideoMetadata {
        (**self).metadata()
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, DistillError> {
        (**self).read_frame()
    }
}
