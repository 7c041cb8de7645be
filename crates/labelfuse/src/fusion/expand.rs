//! Non-overlapping Euclidean growth of labels into background.

use crate::grid::edt::distance_transform;
use crate::grid::slices::map_slices;
use crate::grid::{flat, from_flat};
use crate::{LabelImage, SemanticMask};

/// Assign every background pixel within `distance` of a label the label of
/// its nearest labelled pixel.
///
/// Existing labels are never overwritten. When two labels are equally near,
/// the winner is whichever nearest feature the distance transform reports.
pub fn expand_labels(labels: &LabelImage, distance: f64) -> LabelImage {
    let data = flat(labels);
    if distance <= 0.0 || data.iter().all(|&v| v == 0) {
        return labels.clone();
    }
    let features: Vec<bool> = data.iter().map(|&v| v != 0).collect();
    let map = distance_transform(labels.shape(), &features);
    let limit = distance * distance;
    let out: Vec<u32> = data
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if v == 0 && map.dist_sq[i] <= limit {
                data[map.nearest[i]]
            } else {
                v
            }
        })
        .collect();
    from_flat(labels.shape(), out)
}

/// Expand each slice along the leading axis independently.
pub fn expand_labels_per_slice(labels: &LabelImage, distance: f64) -> LabelImage {
    map_slices(labels, |slice| expand_labels(&slice, distance))
}

/// Grow a binary mask by `distance` (Euclidean).
pub fn expand_mask(mask: &SemanticMask, distance: f64) -> SemanticMask {
    expand_labels(&mask.mapv(u32::from), distance).mapv(|v| v != 0)
}
