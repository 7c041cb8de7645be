//! Intensity normalisation of raw images.

use ndarray::ArrayD;

const EPS: f32 = 1e-20;

/// Percentile of `sorted` with linear interpolation between order statistics.
pub fn percentile(sorted: &[f32], q: f32) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (q.clamp(0.0, 100.0) / 100.0) as f64 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Map the `lower` percentile to 0 and the `upper` one to 1 (no clipping).
pub fn normalize_percentile(image: &ArrayD<f32>, lower: f32, upper: f32) -> ArrayD<f32> {
    let mut sorted: Vec<f32> = image.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_unstable_by(f32::total_cmp);
    let lo = percentile(&sorted, lower);
    let hi = percentile(&sorted, upper);
    let scale = hi - lo + EPS;
    image.mapv(|v| (v - lo) / scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array1, IxDyn};

    #[test]
    fn percentile_interpolates() {
        let v = [0.0f32, 10.0, 20.0, 30.0, 40.0];
        assert_relative_eq!(percentile(&v, 50.0), 20.0);
        assert_relative_eq!(percentile(&v, 12.5), 5.0);
        assert_relative_eq!(percentile(&v, 100.0), 40.0);
    }

    #[test]
    fn full_range_maps_to_unit_interval() {
        let image = Array1::linspace(5.0f32, 15.0, 11).into_dyn();
        let out = normalize_percentile(&image, 0.0, 100.0);
        assert_relative_eq!(out[IxDyn(&[0])], 0.0);
        assert_relative_eq!(out[IxDyn(&[10])], 1.0, epsilon = 1e-6);
        assert_relative_eq!(out[IxDyn(&[5])], 0.5, epsilon = 1e-6);
    }
}
