//! Extraction configuration.
//!
//! [`ExtractOptions`] is a builder that threads progress callbacks,
//! cancellation tokens, and selection policy through the extraction and
//! sweep entry points without polluting every function signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use distill::{CancellationToken, ExtractOptions, ProgressCallback, ProgressInfo};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} done", info.operation, info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = ExtractOptions::new()
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone())
//!     .with_buffer_size(10);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};
use crate::selector::{AnchorPolicy, SelectorOptions};

/// Encoding used for keyframe image files written by extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Lossless PNG. This is the default.
    #[default]
    Png,
    /// JPEG at the `image` crate's default quality.
    Jpeg,
    /// Uncompressed BMP.
    Bmp,
}

impl OutputFormat {
    /// File extension for this format (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Bmp => "bmp",
        }
    }
}

/// Configuration for extraction and sweep operations.
///
/// All fields have sensible defaults — a default-constructed value selects
/// keyframes with dual-observed anchors and writes PNG files with no
/// progress reporting.
#[derive(Clone)]
pub struct ExtractOptions {
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// How many frames are processed between progress reports and output
    /// flushes. Defaults to 1.
    pub(crate) buffer_size: u64,
    /// Anchor policy for keyframe selection.
    pub(crate) policy: AnchorPolicy,
    /// When `false`, every decoded frame is written (plain frame dump).
    pub(crate) detect_keyframes: bool,
    /// Whether multi-pass operations may replay decoded frames from memory.
    ///
    /// Consumed by threshold sweeps; single-pass extraction decodes fresh
    /// regardless, and calibration always runs with caching off.
    pub(crate) enable_cache: bool,
    /// Image encoding for extracted keyframes.
    pub(crate) output_format: OutputFormat,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("has_cancellation", &self.cancellation.is_some())
            .field("buffer_size", &self.buffer_size)
            .field("policy", &self.policy)
            .field("detect_keyframes", &self.detect_keyframes)
            .field("enable_cache", &self.enable_cache)
            .field("output_format", &self.output_format)
            .finish()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            buffer_size: 1,
            policy: AnchorPolicy::default(),
            detect_keyframes: true,
            enable_cache: true,
            output_format: OutputFormat::default(),
        }
    }

    /// Attach a progress callback.
    ///
    /// The callback is invoked every [`buffer_size`](ExtractOptions::with_buffer_size)
    /// frames during extraction.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, the extraction loop stops and returns
    /// [`DistillError::Cancelled`](crate::DistillError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set the frame batch size for progress reports and output flushes.
    ///
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_buffer_size(mut self, size: u64) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Set the anchor policy used for keyframe selection.
    ///
    /// Use the policy the threshold was calibrated with, otherwise the
    /// calibrated count will not transfer.
    #[must_use]
    pub fn with_policy(mut self, policy: AnchorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable or disable keyframe detection. When disabled, extraction
    /// writes every decoded frame and ignores the threshold.
    #[must_use]
    pub fn with_detect_keyframes(mut self, detect: bool) -> Self {
        self.detect_keyframes = detect;
        self
    }

    /// Allow or forbid in-memory frame replay during multi-pass operations.
    ///
    /// Threshold sweeps decode each frame once and replay it per threshold
    /// when this is enabled (the default); disabling trades memory for a
    /// fresh decode per pass.
    #[must_use]
    pub fn with_enable_cache(mut self, enable: bool) -> Self {
        self.enable_cache = enable;
        self
    }

    /// Set the image encoding for extracted keyframes.
    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Selection settings derived from these options.
    pub(crate) fn selector_options(&self) -> SelectorOptions {
        SelectorOptions::new()
            .with_policy(self.policy)
            .with_detect_keyframes(self.detect_keyframes)
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
