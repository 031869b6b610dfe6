//! Frame similarity scoring.
//!
//! Two grayscale frames are compared by combining a 256-bin intensity
//! histogram correlation with a structural similarity (SSIM) measure.
//! Histogram correlation is cheap and robust to global lighting shifts;
//! SSIM captures the spatial change that histograms miss. The combined
//! score is the plain average of the two, bounded to `[-1.0, 1.0]` with
//! higher meaning "more similar".
//!
//! SSIM can legitimately fail to compute (frames smaller than the analysis
//! window, mismatched dimensions). Calibration calls this scorer once or
//! twice per frame for every search iteration — tens of thousands of times
//! per run — so that failure must never abort the caller:
//! [`frame_similarity`] falls back to the histogram score alone and logs
//! the degradation at debug level.
//!
//! # Example
//!
//! ```
//! use image::GrayImage;
//!
//! let a = GrayImage::from_pixel(64, 64, image::Luma([40u8]));
//! let b = GrayImage::from_pixel(64, 64, image::Luma([40u8]));
//! let score = distill::frame_similarity(&a, &b);
//! assert!((score - 1.0).abs() < 1e-9);
//! ```

use image::GrayImage;

/// Number of intensity histogram bins (full 8-bit range).
const HISTOGRAM_BINS: usize = 256;

/// Side length of the uniform SSIM analysis window.
const SSIM_WINDOW: u32 = 8;

/// SSIM luminance stabilisation constant, `(0.01 * 255)^2`.
const SSIM_C1: f64 = 6.5025;

/// SSIM contrast stabilisation constant, `(0.03 * 255)^2`.
const SSIM_C2: f64 = 58.5225;

/// Score the similarity of two grayscale frames.
///
/// Returns `(h + s) / 2` where `h` is the histogram correlation and `s`
/// the structural similarity; when SSIM cannot be computed the histogram
/// score is returned alone. The result is in `[-1.0, 1.0]`, higher meaning
/// more similar. This is a pure function of its two inputs.
pub fn frame_similarity(a: &GrayImage, b: &GrayImage) -> f64 {
    let histogram_score = histogram_correlation(a, b);

    match structural_similarity(a, b) {
        Some(ssim_score) => (histogram_score + ssim_score) / 2.0,
        None => {
            log::debug!(
                "SSIM unavailable for {}x{} vs {}x{} frames; using histogram correlation only",
                a.width(),
                a.height(),
                b.width(),
                b.height(),
            );
            histogram_score
        }
    }
}

/// Pearson correlation of the two frames' 256-bin intensity histograms.
///
/// Returns a value in `[-1.0, 1.0]`. When either histogram is perfectly
/// uniform the correlation is undefined; identical histograms then score
/// `1.0` and differing ones `0.0`.
pub fn histogram_correlation(a: &GrayImage, b: &GrayImage) -> f64 {
    let histogram_a = intensity_histogram(a);
    let histogram_b = intensity_histogram(b);

    let mean_a = histogram_a.iter().sum::<f64>() / HISTOGRAM_BINS as f64;
    let mean_b = histogram_b.iter().sum::<f64>() / HISTOGRAM_BINS as f64;

    let mut covariance = 0.0;
    let mut variance_a = 0.0;
    let mut variance_b = 0.0;

    for bin in 0..HISTOGRAM_BINS {
        let deviation_a = histogram_a[bin] - mean_a;
        let deviation_b = histogram_b[bin] - mean_b;
        covariance += deviation_a * deviation_b;
        variance_a += deviation_a * deviation_a;
        variance_b += deviation_b * deviation_b;
    }

    let denominator = (variance_a * variance_b).sqrt();
    if denominator == 0.0 {
        return if histogram_a == histogram_b { 1.0 } else { 0.0 };
    }

    (covariance / denominator).clamp(-1.0, 1.0)
}

/// Structural similarity of two grayscale frames.
///
/// Computes mean SSIM over dense 8×8 uniform windows using integral-image
/// sums. Returns `None` when the measure cannot be computed: the frames
/// differ in size, or either dimension is smaller than the window.
pub fn structural_similarity(a: &GrayImage, b: &GrayImage) -> Option<f64> {
    if a.dimensions() != b.dimensions() {
        return None;
    }

    let (width, height) = a.dimensions();
    if width < SSIM_WINDOW || height < SSIM_WINDOW {
        return None;
    }

    let sums = WindowSums::new(a, b);
    let pixels_per_window = (SSIM_WINDOW * SSIM_WINDOW) as f64;

    let mut total = 0.0;
    let mut windows = 0u64;

    for window_y in 0..=(height - SSIM_WINDOW) {
        for window_x in 0..=(width - SSIM_WINDOW) {
            let window = sums.window(window_x, window_y, SSIM_WINDOW);

            let mean_a = window.sum_a / pixels_per_window;
            let mean_b = window.sum_b / pixels_per_window;
            let variance_a = window.sum_sq_a / pixels_per_window - mean_a * mean_a;
            let variance_b = window.sum_sq_b / pixels_per_window - mean_b * mean_b;
            let covariance = window.sum_cross / pixels_per_window - mean_a * mean_b;

            let luminance = (2.0 * mean_a * mean_b + SSIM_C1)
                / (mean_a * mean_a + mean_b * mean_b + SSIM_C1);
            let contrast_structure =
                (2.0 * covariance + SSIM_C2) / (variance_a + variance_b + SSIM_C2);

            total += luminance * contrast_structure;
            windows += 1;
        }
    }

    Some((total / windows as f64).clamp(-1.0, 1.0))
}

/// Normalised 256-bin intensity histogram of a grayscale frame.
fn intensity_histogram(image: &GrayImage) -> [f64; HISTOGRAM_BINS] {
    let mut counts = [0u64; HISTOGRAM_BINS];
    for pixel in image.as_raw() {
        counts[*pixel as usize] += 1;
    }

    let total = image.as_raw().len().max(1) as f64;
    let mut histogram = [0.0; HISTOGRAM_BINS];
    for bin in 0..HISTOGRAM_BINS {
        histogram[bin] = counts[bin] as f64 / total;
    }
    histogram
}

/// Per-window pixel sums extracted from the integral images.
struct WindowTotals {
    sum_a: f64,
    sum_b: f64,
    sum_sq_a: f64,
    sum_sq_b: f64,
    sum_cross: f64,
}

/// Integral images over both frames for O(1) window statistics.
///
/// Each table has `(width + 1) × (height + 1)` entries so that the sum over
/// any window is four lookups.
struct WindowSums {
    width: usize,
    sum_a: Vec<u64>,
    sum_b: Vec<u64>,
    sum_sq_a: Vec<u64>,
    sum_sq_b: Vec<u64>,
    sum_cross: Vec<u64>,
}

impl WindowSums {
    fn new(a: &GrayImage, b: &GrayImage) -> Self {
        let (width, height) = a.dimensions();
        let (width, height) = (width as usize, height as usize);
        let stride = width + 1;
        let table_len = stride * (height + 1);

        let mut sums = Self {
            width: stride,
            sum_a: vec![0; table_len],
            sum_b: vec![0; table_len],
            sum_sq_a: vec![0; table_len],
            sum_sq_b: vec![0; table_len],
            sum_cross: vec![0; table_len],
        };

        let pixels_a = a.as_raw();
        let pixels_b = b.as_raw();

        for y in 0..height {
            for x in 0..width {
                let value_a = pixels_a[y * width + x] as u64;
                let value_b = pixels_b[y * width + x] as u64;
                let here = (y + 1) * stride + (x + 1);
                let above = y * stride + (x + 1);
                let left = (y + 1) * stride + x;
                let diagonal = y * stride + x;

                sums.sum_a[here] =
                    value_a + sums.sum_a[above] + sums.sum_a[left] - sums.sum_a[diagonal];
                sums.sum_b[here] =
                    value_b + sums.sum_b[above] + sums.sum_b[left] - sums.sum_b[diagonal];
                sums.sum_sq_a[here] = value_a * value_a + sums.sum_sq_a[above]
                    + sums.sum_sq_a[left]
                    - sums.sum_sq_a[diagonal];
                sums.sum_sq_b[here] = value_b * value_b + sums.sum_sq_b[above]
                    + sums.sum_sq_b[left]
                    - sums.sum_sq_b[diagonal];
                sums.sum_cross[here] = value_a * value_b + sums.sum_cross[above]
                    + sums.sum_cross[left]
                    - sums.sum_cross[diagonal];
            }
        }

        sums
    }

    fn window(&self, x: u32, y: u32, side: u32) -> WindowTotals {
        let (x, y, side) = (x as usize, y as usize, side as usize);
        let top_left = y * self.width + x;
        let top_right = y * self.width + (x + side);
        let bottom_left = (y + side) * self.width + x;
        let bottom_right = (y + side) * self.width + (x + side);

        let lookup = |table: &[u64]| {
            (table[bottom_right] + table[top_left] - table[top_right] - table[bottom_left]) as f64
        };

        WindowTotals {
            sum_a: lookup(&self.sum_a),
            sum_b: lookup(&self.sum_b),
            sum_sq_a: lookup(&self.sum_sq_a),
            sum_sq_b: lookup(&self.sum_sq_b),
            sum_cross: lookup(&self.sum_cross),
        }
    }
}
