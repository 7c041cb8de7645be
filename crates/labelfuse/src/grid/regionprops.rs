//! Per-label region measurements.

use std::collections::BTreeMap;

use super::{BoundingBox, NdGrid};
use crate::LabelImage;

/// Measurements of one labelled region.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegionProps {
    /// Region id in the source label image.
    pub label: u32,
    /// Pixel (2D) or voxel (3D) count.
    pub area: usize,
    /// Mean pixel coordinate, one entry per axis.
    pub centroid: Vec<f64>,
    /// Tight half-open bounding box.
    pub bbox: BoundingBox,
}

struct Accum {
    area: usize,
    sum: Vec<f64>,
    bbox: BoundingBox,
}

/// Measure every non-zero label, returned in ascending label order.
pub fn region_props(labels: &LabelImage) -> Vec<RegionProps> {
    let grid = NdGrid::new(labels.shape());
    let mut acc: BTreeMap<u32, Accum> = BTreeMap::new();
    let mut coord = vec![0usize; grid.ndim()];

    for (index, &label) in labels.iter().enumerate() {
        if label == 0 {
            continue;
        }
        grid.unravel_into(index, &mut coord);
        let entry = acc.entry(label).or_insert_with(|| Accum {
            area: 0,
            sum: vec![0.0; coord.len()],
            bbox: BoundingBox::at(&coord),
        });
        entry.area += 1;
        for (s, &c) in entry.sum.iter_mut().zip(&coord) {
            *s += c as f64;
        }
        entry.bbox.include(&coord);
    }

    acc.into_iter()
        .map(|(label, a)| RegionProps {
            label,
            area: a.area,
            centroid: a.sum.iter().map(|s| s / a.area as f64).collect(),
            bbox: a.bbox,
        })
        .collect()
}

/// Pixel count of every non-zero label, keyed by id.
///
/// Ids are sparse; a single region may carry any `u32` value.
pub fn label_areas(labels: &LabelImage) -> BTreeMap<u32, usize> {
    let mut counts = BTreeMap::new();
    for &label in labels.iter().filter(|&&l| l != 0) {
        *counts.entry(label).or_insert(0usize) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn centroid_and_bbox_of_square() {
        let labels = arr2(&[[0u32, 0, 0, 0], [0, 3, 3, 0], [0, 3, 3, 0], [0, 0, 0, 0]]).into_dyn();
        let props = region_props(&labels);
        assert_eq!(props.len(), 1);
        let p = &props[0];
        assert_eq!(p.label, 3);
        assert_eq!(p.area, 4);
        assert_relative_eq!(p.centroid[0], 1.5);
        assert_relative_eq!(p.centroid[1], 1.5);
        assert_eq!(p.bbox, BoundingBox::new(vec![1, 1], vec![3, 3]));
    }

    #[test]
    fn props_are_sorted_by_label() {
        let labels = arr2(&[[9u32, 0, 2], [0, 4, 0]]).into_dyn();
        let ids: Vec<u32> = region_props(&labels).iter().map(|p| p.label).collect();
        assert_eq!(ids, vec![2, 4, 9]);
    }

    #[test]
    fn areas_keyed_by_id() {
        let labels = arr2(&[[1u32, 1, 0], [0, 3, 3]]).into_dyn();
        let areas: Vec<(u32, usize)> = label_areas(&labels).into_iter().collect();
        assert_eq!(areas, vec![(1, 2), (3, 2)]);
    }

    #[test]
    fn huge_ids_are_counted_without_dense_storage() {
        let labels = arr2(&[[2_000_000_000u32, 0], [u32::MAX, 2_000_000_000]]).into_dyn();
        let areas = label_areas(&labels);
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[&2_000_000_000], 2);
        assert_eq!(areas[&u32::MAX], 1);
    }
}
