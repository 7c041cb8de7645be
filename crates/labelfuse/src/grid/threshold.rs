//! Automatic global thresholding.

use ndarray::ArrayD;

const BINS: usize = 256;

/// Otsu threshold of `values` on a 256-bin histogram spanning their range.
///
/// Returns the centre of the last background bin, or `None` when the data
/// has no finite spread to split.
pub fn otsu_threshold<'a>(values: impl IntoIterator<Item = &'a f32>) -> Option<f32> {
    let finite: Vec<f32> = values.into_iter().copied().filter(|v| v.is_finite()).collect();
    let (lo, hi) = finite
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if finite.is_empty() || !(hi > lo) || !(hi - lo).is_finite() {
        return None;
    }

    let width = (hi - lo) as f64 / BINS as f64;
    let mut histogram = [0u64; BINS];
    for &v in &finite {
        let bin = (((v - lo) as f64 / width) as usize).min(BINS - 1);
        histogram[bin] += 1;
    }
    let centre = |bin: usize| (lo as f64 + (bin as f64 + 0.5) * width) as f32;

    let total = finite.len() as f64;
    let sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut weight_b = 0.0;
    let mut sum_b = 0.0;
    let mut best = (f64::NEG_INFINITY, 0usize);
    for (i, &count) in histogram.iter().enumerate().take(BINS - 1) {
        weight_b += count as f64;
        sum_b += i as f64 * count as f64;
        if weight_b == 0.0 {
            continue;
        }
        let weight_f = total - weight_b;
        if weight_f == 0.0 {
            break;
        }
        let mean_b = sum_b / weight_b;
        let mean_f = (sum - sum_b) / weight_f;
        let variance = weight_b * weight_f * (mean_b - mean_f).powi(2);
        if variance > best.0 {
            best = (variance, i);
        }
    }
    Some(centre(best.1))
}

/// Binarise `field` with its Otsu threshold (strictly greater is foreground).
///
/// A degenerate field cannot be split and becomes all foreground.
pub fn threshold_or_all(field: &ArrayD<f32>) -> ArrayD<bool> {
    match otsu_threshold(field.iter()) {
        Some(t) => field.mapv(|v| v > t),
        None => {
            tracing::warn!(
                shape = ?field.shape(),
                "field has no intensity spread, treating it as all foreground"
            );
            field.mapv(|_| true)
        }
    }
}
