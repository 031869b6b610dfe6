//! Internal utility functions.
//!
//! Helpers for pixel-data copying and frame-index/timestamp conversion that
//! do not belong in any single public module.

use std::time::Duration;

use ffmpeg_next::frame::Video as VideoFrame;

/// Copy pixel data from an FFmpeg video frame into a tightly-packed buffer.
///
/// `bytes_per_pixel` is the number of bytes per pixel for the output format
/// (e.g. 3 for RGB24, 1 for GRAY8).
pub fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Convert a frame index to its presentation time using the stream frame rate.
///
/// A non-positive frame rate maps every index to zero rather than producing
/// a nonsensical timestamp.
pub fn frame_index_to_timestamp(frame_index: u64, frames_per_second: f64) -> Duration {
    if frames_per_second <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(frame_index as f64 / frames_per_second)
}
