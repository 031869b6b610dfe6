//! Video metadata types.
//!
//! [`VideoMetadata`] is probed once when a source is opened and cached for
//! the lifetime of the source. The threshold calibrator reads it up front to
//! validate the requested target frame count before any search pass runs.

use std::time::Duration;

/// Metadata for the video stream backing a frame source.
///
/// # Example
///
/// ```no_run
/// use distill::VideoSource;
///
/// let source = VideoSource::open("input.mp4").unwrap();
/// let metadata = source.metadata();
/// println!("{}x{} @ {:.2} fps", metadata.width, metadata.height, metadata.frames_per_second);
/// println!("~{} frames", metadata.frame_count);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (may be approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Estimated total number of decodable frames.
    pub frame_count: u64,
    /// Total duration of the video stream.
    pub duration: Duration,
    /// Codec name (e.g. `"h264"`, `"vp9"`, `"av1"`). Empty for synthetic sources.
    pub codec: String,
}
