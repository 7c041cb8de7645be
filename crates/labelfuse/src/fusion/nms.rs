//! Duplicate-instance suppression.
//!
//! Regions are ranked by size (larger first, lower label on ties). Overlap
//! candidates are computed in parallel from one read-only snapshot of the
//! region properties; suppression itself is a sequential greedy pass in rank
//! order, so a region already suppressed never suppresses another.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::grid::{region_props, BoundingBox, RegionProps};
use crate::LabelImage;

/// Overlap ratio of two boxes: intersection volume over the smaller volume.
pub fn overlap_ratio(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let smaller = a.volume().min(b.volume());
    if smaller == 0 {
        return 0.0;
    }
    a.intersection(b)
        .map_or(0.0, |i| i.volume() as f64 / smaller as f64)
}

/// Footprint used for comparison: the in-plane box for volumes, the whole
/// box otherwise.
fn footprint(region: &RegionProps) -> BoundingBox {
    if region.bbox.ndim() == 3 {
        region.bbox.without_leading_axis()
    } else {
        region.bbox.clone()
    }
}

fn comparable(a: &RegionProps, b: &RegionProps, z_thresh: usize) -> bool {
    a.centroid.len() != 3 || (a.centroid[0] - b.centroid[0]).abs() <= z_thresh as f64
}

/// Zero every region whose footprint overlap with a larger kept region
/// exceeds `nms_thresh`.
///
/// In a volume two regions are compared only when their centroids are at
/// most `z_thresh` slices apart, and overlap is measured on their in-plane
/// bounding boxes.
pub fn suppress_duplicates(labels: &LabelImage, nms_thresh: f32, z_thresh: usize) -> LabelImage {
    let mut ranked = region_props(labels);
    ranked.sort_by(|a, b| b.area.cmp(&a.area).then(a.label.cmp(&b.label)));
    let footprints: Vec<BoundingBox> = ranked.iter().map(footprint).collect();
    let thresh = nms_thresh as f64;

    let candidates: Vec<Vec<usize>> = (0..ranked.len())
        .into_par_iter()
        .map(|i| {
            (i + 1..ranked.len())
                .filter(|&j| {
                    comparable(&ranked[i], &ranked[j], z_thresh)
                        && overlap_ratio(&footprints[i], &footprints[j]) > thresh
                })
                .collect()
        })
        .collect();

    let mut suppressed: HashSet<u32> = HashSet::new();
    for (i, dupes) in candidates.iter().enumerate() {
        if suppressed.contains(&ranked[i].label) {
            continue;
        }
        for &j in dupes {
            if suppressed.insert(ranked[j].label) {
                tracing::debug!(
                    kept = ranked[i].label,
                    removed = ranked[j].label,
                    "suppressed duplicate region"
                );
            }
        }
    }
    if suppressed.is_empty() {
        return labels.clone();
    }
    labels.mapv(|v| if suppressed.contains(&v) { 0 } else { v })
}
