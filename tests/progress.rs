//! Progress and cancellation integration tests.
//!
//! Per-operation progress delivery is covered where the operations live:
//! calibration reporting in `tests/calibration.rs` and extraction
//! reporting (fixture-gated) in `tests/extraction.rs`.

use distill::{CancellationToken, OperationType, ProgressInfo};

// ── CancellationToken ──────────────────────────────────────────────

#[test]
fn cancellation_token_default_not_cancelled() {
    let token = CancellationToken::new();
    assert!(!token.is_cancelled());
}

#[test]
fn cancellation_token_cancel() {
    let token = CancellationToken::new();
    token.cancel();
    assert!(token.is_cancelled());
}

#[test]
fn cancellation_token_clone_shares_state() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());

    token.cancel();
    assert!(clone.is_cancelled());
}

#[test]
fn cancellation_token_cancel_is_idempotent() {
    let token = CancellationToken::default();
    token.cancel();
    token.cancel();
    assert!(token.is_cancelled());
}

#[test]
fn cancellation_observed_across_threads() {
    let token = CancellationToken::new();
    let clone = token.clone();

    let handle = std::thread::spawn(move || {
        clone.cancel();
    });
    handle.join().unwrap();

    assert!(token.is_cancelled());
}

// ── ProgressInfo ───────────────────────────────────────────────────

#[test]
fn ratio_requires_a_known_total() {
    let info = ProgressInfo {
        operation: OperationType::KeyframeSelection,
        current: 5,
        total: None,
        percentage: None,
        elapsed: std::time::Duration::ZERO,
        estimated_remaining: None,
        current_frame: None,
    };
    assert_eq!(info.ratio(), None);
}

#[test]
fn ratio_is_current_over_total() {
    let info = ProgressInfo {
        operation: OperationType::ThresholdCalibration,
        current: 10,
        total: Some(50),
        percentage: Some(20.0),
        elapsed: std::time::Duration::from_secs(1),
        estimated_remaining: None,
        current_frame: None,
    };
    assert_eq!(info.ratio(), Some(0.2));
}

#[test]
fn ratio_caps_at_one() {
    let info = ProgressInfo {
        operation: OperationType::FrameExtraction,
        current: 12,
        total: Some(10),
        percentage: Some(120.0),
        elapsed: std::time::Duration::ZERO,
        estimated_remaining: None,
        current_frame: None,
    };
    assert_eq!(info.ratio(), Some(1.0));
}

#[test]
fn operation_type_debug() {
    assert_eq!(
        format!("{:?}", OperationType::ThresholdCalibration),
        "ThresholdCalibration"
    );
    assert_eq!(
        format!("{:?}", OperationType::FrameExtraction),
        "FrameExtraction"
    );
}
