//! Batch-parallel scoring tests (requires `--features rayon`).
//!
//! The worker pool must be an implementation detail: every configuration
//! has to produce the exact count the sequential selector produces.

#![cfg(feature = "rayon")]

mod common;

use common::{SyntheticSource, alternating_frames, blended_frame, paired_frames};
use distill::{AnchorPolicy, KeyframeSelector, SelectorOptions, count_keyframes_parallel};

fn mixed_blend_frames(count: usize) -> Vec<image::GrayImage> {
    (0..count)
        .map(|index| blended_frame(((index * 7 + 3) % 17) as u32))
        .collect()
}

fn sequential_count(lumas: Vec<image::GrayImage>, threshold: f64) -> u64 {
    KeyframeSelector::new(
        SyntheticSource::new(lumas),
        threshold,
        &SelectorOptions::new(),
    )
    .expect("selector")
    .count_keyframes()
}

#[test]
fn parallel_count_matches_sequential_across_batch_sizes() {
    for batch_size in [1, 2, 3, 7, 64, 1000] {
        for threshold in [0.0, 0.3, 0.6, 0.9, 1.0] {
            let expected = sequential_count(mixed_blend_frames(60), threshold);
            let parallel = count_keyframes_parallel(
                SyntheticSource::new(mixed_blend_frames(60)),
                threshold,
                &SelectorOptions::new(),
                batch_size,
            )
            .expect("parallel count");

            assert_eq!(
                parallel, expected,
                "batch_size {batch_size}, threshold {threshold}"
            );
        }
    }
}

#[test]
fn parallel_count_handles_batch_boundaries_on_paired_content() {
    // Paired patterns make the two-back anchor load-bearing; carrying the
    // previous batch's tail wrongly would show up here.
    for batch_size in [1, 2, 3, 4, 5] {
        let expected = sequential_count(paired_frames(40), 0.01);
        let parallel = count_keyframes_parallel(
            SyntheticSource::new(paired_frames(40)),
            0.01,
            &SelectorOptions::new(),
            batch_size,
        )
        .expect("parallel count");

        assert_eq!(parallel, expected, "batch_size {batch_size}");
    }
}

#[test]
fn parallel_count_of_empty_stream_is_zero() {
    let count = count_keyframes_parallel(
        SyntheticSource::new(Vec::new()),
        0.5,
        &SelectorOptions::new(),
        8,
    )
    .expect("parallel count");
    assert_eq!(count, 0);
}

#[test]
fn parallel_count_truncates_on_decode_failure() {
    let expected = {
        let source = SyntheticSource::new(alternating_frames(20)).failing_after(5);
        KeyframeSelector::new(source, 0.5, &SelectorOptions::new())
            .expect("selector")
            .count_keyframes()
    };

    let parallel = count_keyframes_parallel(
        SyntheticSource::new(alternating_frames(20)).failing_after(5),
        0.5,
        &SelectorOptions::new(),
        3,
    )
    .expect("parallel count");

    assert_eq!(parallel, expected);
}

#[test]
fn single_retained_policy_falls_back_to_sequential() {
    let options = SelectorOptions::new().with_policy(AnchorPolicy::SingleRetained);
    let expected = KeyframeSelector::new(
        SyntheticSource::new(paired_frames(40)),
        0.01,
        &options,
    )
    .expect("selector")
    .count_keyframes();

    let parallel = count_keyframes_parallel(
        SyntheticSource::new(paired_frames(40)),
        0.01,
        &options,
        8,
    )
    .expect("parallel count");

    assert_eq!(parallel, expected);
    assert_eq!(parallel, 20, "single anchor keeps one frame per pair");
}

#[test]
fn zero_batch_size_is_clamped() {
    let count = count_keyframes_parallel(
        SyntheticSource::new(alternating_frames(10)),
        0.5,
        &SelectorOptions::new(),
        0,
    )
    .expect("parallel count");
    assert_eq!(count, 10);
}

#[test]
fn invalid_threshold_is_rejected() {
    let result = count_keyframes_parallel(
        SyntheticSource::new(alternating_frames(10)),
        1.5,
        &SelectorOptions::new(),
        8,
    );
    assert!(result.is_err());
}
