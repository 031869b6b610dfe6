//! Shared synthetic frame source for integration tests.
//!
//! Selection and calibration are defined over any [`FrameSource`], so the
//! tests drive them with small in-memory frame sequences whose pairwise
//! similarity is controlled exactly. Frames are kept under the 8x8 SSIM
//! window so scores reduce to the histogram correlation alone, which makes
//! the expected selection decisions easy to reason about:
//!
//! - identical frames score `1.0`;
//! - frames of two disjoint uniform values score just below `0.0`;
//! - two-value blends score anywhere in between.

#![allow(dead_code)]

use std::time::Duration;

use image::{DynamicImage, GrayImage, Luma};

use distill::{DistillError, Frame, FrameSource, VideoMetadata};

pub const FPS: f64 = 25.0;

/// An in-memory frame source over a fixed sequence of luma planes.
pub struct SyntheticSource {
    metadata: VideoMetadata,
    lumas: Vec<GrayImage>,
    position: usize,
    fail_after: Option<usize>,
    materialize: bool,
}

impl SyntheticSource {
    pub fn new(lumas: Vec<GrayImage>) -> Self {
        let (width, height) = lumas
            .first()
            .map(|luma| luma.dimensions())
            .unwrap_or((0, 0));
        let frame_count = lumas.len() as u64;

        Self {
            metadata: VideoMetadata {
                width,
                height,
                frames_per_second: FPS,
                frame_count,
                duration: Duration::from_secs_f64(frame_count as f64 / FPS),
                codec: String::new(),
            },
            lumas,
            position: 0,
            fail_after: None,
            materialize: false,
        }
    }

    /// Report a decode error after `count` frames have been read.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Carry a full-colour decode alongside each luma plane.
    pub fn materializing(mut self) -> Self {
        self.materialize = true;
        self
    }

    /// Override the metadata frame count (e.g. to model an estimate that
    /// disagrees with what actually decodes).
    pub fn with_reported_frame_count(mut self, frame_count: u64) -> Self {
        self.metadata.frame_count = frame_count;
        self
    }
}

impl FrameSource for SyntheticSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, DistillError> {
        if self.fail_after == Some(self.position) {
            return Err(DistillError::VideoDecodeError(
                "synthetic decode failure".to_string(),
            ));
        }

        let Some(luma) = self.lumas.get(self.position) else {
            return Ok(None);
        };

        let index = self.position as u64;
        self.position += 1;

        Ok(Some(Frame {
            index,
            timestamp: Duration::from_secs_f64(index as f64 / FPS),
            luma: luma.clone(),
            image: self
                .materialize
                .then(|| DynamicImage::ImageLuma8(luma.clone())),
        }))
    }
}

/// A 4x4 frame with every pixel set to `value`.
pub fn uniform_frame(value: u8) -> GrayImage {
    GrayImage::from_pixel(4, 4, Luma([value]))
}

/// A 4x4 frame with `bright` of its 16 pixels at 200 and the rest at 0.
///
/// Varying `bright` moves the histogram correlation against other blends
/// smoothly between just below 0.0 (disjoint) and 1.0 (identical).
pub fn blended_frame(bright: u32) -> GrayImage {
    GrayImage::from_fn(4, 4, |x, y| {
        if y * 4 + x < bright {
            Luma([200])
        } else {
            Luma([0])
        }
    })
}

/// `count` frames strictly alternating between two disjoint patterns.
///
/// Adjacent frames score just below 0.0; frames two apart score 1.0.
pub fn alternating_frames(count: usize) -> Vec<GrayImage> {
    (0..count)
        .map(|index| uniform_frame(if index % 2 == 0 { 10 } else { 200 }))
        .collect()
}

/// `count` frames in an AABB-repeating pattern.
///
/// Each pattern repeats once before switching, which is exactly where the
/// two anchor policies diverge: dual-observed anchors still see the change
/// two frames back, a single retained anchor does not.
pub fn paired_frames(count: usize) -> Vec<GrayImage> {
    (0..count)
        .map(|index| uniform_frame(if (index / 2) % 2 == 0 { 10 } else { 200 }))
        .collect()
}

/// `count` frames of gradually accumulating change.
///
/// Frame `i` lights `i` pixels (saturating at all 16), so nearby frames are
/// close blends and distant frames drift apart.
pub fn drifting_frames(count: usize) -> Vec<GrayImage> {
    (0..count)
        .map(|index| blended_frame((index as u32).min(16)))
        .collect()
}

/// `count` frames that are all identical.
pub fn identical_frames(count: usize) -> Vec<GrayImage> {
    (0..count).map(|_| uniform_frame(42)).collect()
}
