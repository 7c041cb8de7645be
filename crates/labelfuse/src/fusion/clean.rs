//! Label cleaning: validation, hole repair, size filtering and relabelling.

use std::collections::HashMap;

use ndarray::{ArrayD, Zip};

use super::config::CleanConfig;
use crate::error::{ReconcileError, Result};
use crate::grid::morphology::{dilate_mask, fill_holes};
use crate::grid::regionprops::label_areas;
use crate::grid::{label_regions, region_props, Connectivity};
use crate::{LabelImage, RawLabels};

/// Convert externally supplied labels, rejecting negative ids.
pub fn validate_labels(raw: &RawLabels) -> Result<LabelImage> {
    if let Some(&value) = raw.iter().find(|&&v| v < 0) {
        return Err(ReconcileError::NegativeLabel {
            value: value as i64,
        });
    }
    Ok(raw.mapv(|v| v as u32))
}

/// Fill the topological holes of every label.
///
/// Each region is processed inside its bounding box grown by one pixel, so
/// the cost scales with region size rather than image size. Regions are
/// pasted back in ascending label order.
pub fn fill_label_holes(labels: &LabelImage) -> LabelImage {
    let shape = labels.shape().to_vec();
    let mut out = labels.clone();
    for props in region_props(labels) {
        let window = props.bbox.grown(1, &shape);
        let own = window.crop(labels).mapv(|v| v == props.label);
        let filled = fill_holes(&own);
        Zip::from(window.crop_mut(&mut out)).and(&filled).for_each(|d, &f| {
            if f {
                *d = props.label;
            }
        });
    }
    out
}

/// Zero every region with fewer than `min_size` pixels.
pub fn remove_small_objects(labels: &LabelImage, min_size: usize) -> LabelImage {
    filter_by_size(labels, min_size, usize::MAX)
}

/// Zero every region with more than `max_size` pixels.
pub fn remove_big_objects(labels: &LabelImage, max_size: usize) -> LabelImage {
    filter_by_size(labels, 0, max_size)
}

/// Keep regions whose pixel count lies in `[min_size, max_size]`.
pub fn filter_by_size(labels: &LabelImage, min_size: usize, max_size: usize) -> LabelImage {
    let areas = label_areas(labels);
    labels.mapv(|v| match areas.get(&v) {
        Some(&area) if area < min_size || area > max_size => 0,
        _ => v,
    })
}

/// Map ids onto `1..=n` preserving their ascending order.
pub fn relabel_sequential(labels: &LabelImage) -> LabelImage {
    let lut: HashMap<u32, u32> = label_areas(labels)
        .keys()
        .zip(1u32..)
        .map(|(&id, new)| (id, new))
        .collect();
    remap(labels, &lut)
}

/// Grow every label into adjacent background by `iterations` face steps.
///
/// Only pixels that are background in the input are claimed; where two
/// labels reach the same pixel the larger id wins.
pub fn dilate_label_holes(labels: &LabelImage, iterations: usize) -> LabelImage {
    if iterations == 0 {
        return labels.clone();
    }
    let shape = labels.shape().to_vec();
    let mut out = labels.clone();
    for props in region_props(labels) {
        let window = props.bbox.grown(iterations, &shape);
        let own = window.crop(labels).mapv(|v| v == props.label);
        let grown = dilate_mask(&own, iterations);
        Zip::from(window.crop_mut(&mut out))
            .and(window.crop(labels))
            .and(&grown)
            .for_each(|d, &s, &g| {
                if g && s == 0 {
                    *d = props.label;
                }
            });
    }
    out
}

/// Full cleaning pass: hole filling, one component per id, size filtering
/// and sequential relabelling.
pub fn clean_labels(labels: &LabelImage, cfg: &CleanConfig) -> LabelImage {
    let filled = if cfg.fill_holes {
        fill_label_holes(labels)
    } else {
        labels.clone()
    };
    let (split, _) = label_regions(&filled, Connectivity::Full);
    let kept = filter_by_size(&split, cfg.min_size, cfg.max_size);
    let out = relabel_sequential(&kept);
    tracing::debug!(
        regions_in = region_count(labels),
        regions_out = region_count(&out),
        "cleaned labels"
    );
    out
}

/// Number of distinct non-zero ids.
pub fn region_count(labels: &LabelImage) -> usize {
    label_areas(labels).len()
}

/// Remap ids through `lut`; ids missing from the map become background.
pub(crate) fn remap(labels: &LabelImage, lut: &HashMap<u32, u32>) -> LabelImage {
    labels.mapv(|v| if v == 0 { 0 } else { lut.get(&v).copied().unwrap_or(0) })
}

/// Zero labels wherever `mask` is false.
pub fn clip_to_mask(labels: &LabelImage, mask: &ArrayD<bool>) -> Result<LabelImage> {
    if labels.shape() != mask.shape() {
        return Err(ReconcileError::ShapeMismatch {
            what: "mask",
            expected: labels.shape().to_vec(),
            got: mask.shape().to_vec(),
        });
    }
    let mut out = labels.clone();
    Zip::from(&mut out).and(mask).for_each(|v, &m| {
        if !m {
            *v = 0;
        }
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::draw_disk;
    use ndarray::{arr2, IxDyn};

    #[test]
    fn negative_labels_are_rejected() {
        let raw = arr2(&[[0i32, 3], [-2, 1]]).into_dyn();
        match validate_labels(&raw) {
            Err(ReconcileError::NegativeLabel { value }) => assert_eq!(value, -2),
            other => panic!("unexpected {:?}", other),
        }
        let ok = arr2(&[[0i32, 3]]).into_dyn();
        assert_eq!(validate_labels(&ok).unwrap(), arr2(&[[0u32, 3]]).into_dyn());
    }

    #[test]
    fn holes_are_filled_per_label() {
        let labels = arr2(&[
            [0u32, 0, 0, 0, 0],
            [0, 4, 4, 4, 0],
            [0, 4, 0, 4, 0],
            [0, 4, 4, 4, 0],
            [0, 0, 0, 0, 0],
        ])
        .into_dyn();
        let out = fill_label_holes(&labels);
        assert_eq!(out[IxDyn(&[2, 2])], 4);
        assert_eq!(out[IxDyn(&[0, 0])], 0);
    }

    #[test]
    fn hole_of_region_on_image_border_is_filled() {
        let labels = arr2(&[[2u32, 2, 2], [2, 0, 2], [2, 2, 2]]).into_dyn();
        assert_eq!(fill_label_holes(&labels)[IxDyn(&[1, 1])], 2);
    }

    #[test]
    fn size_filter_keeps_only_mid_sized_blob() {
        let mut labels = ArrayD::zeros(IxDyn(&[300, 300]));
        // 5 px
        for x in 0..5 {
            labels[IxDyn(&[2, x])] = 1u32;
        }
        // 500 px
        for y in 10..30 {
            for x in 10..35 {
                labels[IxDyn(&[y, x])] = 2;
            }
        }
        // 20000 px
        for y in 100..300 {
            for x in 200..300 {
                labels[IxDyn(&[y, x])] = 3;
            }
        }
        let out = filter_by_size(&labels, 10, 10_000);
        let areas = label_areas(&out);
        assert!(!areas.contains_key(&1));
        assert_eq!(areas[&2], 500);
        assert!(!areas.contains_key(&3));
    }

    #[test]
    fn size_filter_on_empty_is_noop() {
        let labels: LabelImage = ArrayD::zeros(IxDyn(&[4, 4]));
        assert_eq!(filter_by_size(&labels, 10, 100), labels);
        assert_eq!(remove_small_objects(&labels, 10), labels);
        assert_eq!(remove_big_objects(&labels, 10), labels);
    }

    #[test]
    fn relabel_is_dense_and_idempotent() {
        let labels = arr2(&[[0u32, 7, 7], [3, 0, 12]]).into_dyn();
        let once = relabel_sequential(&labels);
        assert_eq!(once, arr2(&[[0u32, 2, 2], [1, 0, 3]]).into_dyn());
        assert_eq!(relabel_sequential(&once), once);
    }

    #[test]
    fn relabel_handles_ids_near_the_i32_limit() {
        let labels = arr2(&[[0u32, 2_000_000_000], [5, 2_000_000_000]]).into_dyn();
        let out = relabel_sequential(&filter_by_size(&labels, 1, 10));
        assert_eq!(out, arr2(&[[0u32, 2], [1, 2]]).into_dyn());
        assert_eq!(region_count(&labels), 2);
    }

    #[test]
    fn dilation_claims_background_only() {
        let labels = arr2(&[[1u32, 0, 0, 2, 2]]).into_dyn();
        let out = dilate_label_holes(&labels, 1);
        assert_eq!(out, arr2(&[[1u32, 1, 2, 2, 2]]).into_dyn());
    }

    #[test]
    fn cleaning_splits_disconnected_ids() {
        let mut labels = ArrayD::zeros(IxDyn(&[20, 40]));
        draw_disk(&mut labels, [10.0, 8.0], 4.0, 5);
        draw_disk(&mut labels, [10.0, 30.0], 4.0, 5);
        let out = clean_labels(&labels, &CleanConfig::default());
        assert_eq!(region_count(&out), 2);
        assert_eq!(crate::grid::max_label(&out), 2);
    }

    #[test]
    fn clip_zeroes_outside_mask() {
        let labels = arr2(&[[1u32, 1], [2, 2]]).into_dyn();
        let mask = arr2(&[[true, false], [false, true]]).into_dyn();
        let out = clip_to_mask(&labels, &mask).unwrap();
        assert_eq!(out, arr2(&[[1u32, 0], [0, 2]]).into_dyn());
    }
}
