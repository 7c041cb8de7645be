//! Marker image construction from seed points.

use ndarray::{ArrayD, IxDyn};

use super::seeds::SeedPoint;
use crate::grid::morphology::dilate_ball;
use crate::LabelImage;

/// Rasterise `seeds` into a marker image of `shape`.
///
/// Seed `i` (list order) receives id `i + 1` at its rounded, clamped
/// coordinate; a later seed landing on the same pixel overwrites an earlier
/// one. Every marker is then dilated by a ball of `radius` (disk in 2D).
pub fn build_markers(seeds: &[SeedPoint], shape: &[usize], radius: usize) -> LabelImage {
    let mut raw: LabelImage = ArrayD::zeros(IxDyn(shape));
    if raw.is_empty() {
        return raw;
    }
    let mut coord = vec![0usize; shape.len()];
    for (i, seed) in seeds.iter().enumerate() {
        for (axis, slot) in coord.iter_mut().enumerate() {
            let c = seed.coord.get(axis).copied().unwrap_or(0.0).round();
            *slot = c.clamp(0.0, (shape[axis] - 1) as f64) as usize;
        }
        raw[IxDyn(&coord)] = i as u32 + 1;
    }
    dilate_ball(&raw, radius)
}
