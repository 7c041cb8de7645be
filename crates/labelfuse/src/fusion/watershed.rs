//! Marker-controlled watershed restricted to a foreground mask.
//!
//! Priority flooding with face connectivity: marker pixels enter a min-heap
//! keyed on the (polarity-adjusted) field value; popping a pixel labels
//! each unlabelled in-mask neighbour with the popped label and pushes it.
//! Equal values are flooded first-in first-out, so plateaus split evenly
//! between competing markers.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ndarray::ArrayD;

use crate::error::{ReconcileError, Result};
use crate::grid::{flat, from_flat, Connectivity, NdGrid};
use crate::{LabelImage, SemanticMask};

/// How the supplied field maps onto watershed basins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasinPolarity {
    /// High field values are basin centres (probability, distance).
    Negate,
    /// Low field values are basin centres (flow magnitude).
    Direct,
}

#[derive(Debug, Clone, Copy)]
struct FloodEntry {
    level: f32,
    age: u64,
    index: usize,
}

impl PartialEq for FloodEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloodEntry {}

impl PartialOrd for FloodEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloodEntry {
    // Reversed so the max-heap pops the lowest level, then the oldest entry.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .level
            .total_cmp(&self.level)
            .then_with(|| other.age.cmp(&self.age))
    }
}

/// Grow `markers` over `field`, never leaving `mask`.
///
/// Marker pixels outside the mask are discarded. Pixels not reachable from
/// any marker through the mask stay 0.
pub fn grow_regions(
    field: &ArrayD<f32>,
    markers: &LabelImage,
    mask: Option<&SemanticMask>,
    polarity: BasinPolarity,
) -> Result<LabelImage> {
    if markers.shape() != field.shape() {
        return Err(ReconcileError::ShapeMismatch {
            what: "markers",
            expected: field.shape().to_vec(),
            got: markers.shape().to_vec(),
        });
    }
    if let Some(mask) = mask {
        if mask.shape() != field.shape() {
            return Err(ReconcileError::ShapeMismatch {
                what: "growth mask",
                expected: field.shape().to_vec(),
                got: mask.shape().to_vec(),
            });
        }
    }

    let grid = NdGrid::new(field.shape());
    let inside: Vec<bool> = match mask {
        Some(m) => flat(m),
        None => vec![true; grid.len()],
    };
    let level: Vec<f32> = field
        .iter()
        .map(|&v| {
            let v = if v.is_finite() { v } else { 0.0 };
            match polarity {
                BasinPolarity::Negate => -v,
                BasinPolarity::Direct => v,
            }
        })
        .collect();

    let mut out: Vec<u32> = flat(markers);
    let mut heap = BinaryHeap::new();
    let mut age = 0u64;
    for (index, label) in out.iter_mut().enumerate() {
        if *label == 0 {
            continue;
        }
        if !inside[index] {
            *label = 0;
            continue;
        }
        heap.push(FloodEntry {
            level: level[index],
            age,
            index,
        });
        age += 1;
    }

    let offsets = grid.neighbor_offsets(Connectivity::Face);
    let mut coord = vec![0usize; grid.ndim()];
    let mut nbrs = Vec::with_capacity(offsets.len());
    while let Some(entry) = heap.pop() {
        let label = out[entry.index];
        grid.unravel_into(entry.index, &mut coord);
        grid.neighbors_of(&coord, &offsets, &mut nbrs);
        for &n in &nbrs {
            if out[n] != 0 || !inside[n] {
                continue;
            }
            out[n] = label;
            heap.push(FloodEntry {
                level: level[n],
                age,
                index: n,
            });
            age += 1;
        }
    }

    Ok(from_flat(field.shape(), out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::markers::build_markers;
    use crate::fusion::seeds::{SeedPoint, SeedSource};
    use crate::test_utils::{blurred_field, disks};
    use ndarray::{arr1, arr2, IxDyn};

    #[test]
    fn two_basins_split_at_the_ridge() {
        // peaks at 1 and 7, valley at 4
        let field = arr1(&[0.5f32, 1.0, 0.8, 0.5, 0.2, 0.5, 0.8, 1.0, 0.5]).into_dyn();
        let mut markers = ArrayD::zeros(IxDyn(&[9]));
        markers[IxDyn(&[1])] = 1u32;
        markers[IxDyn(&[7])] = 2;
        let out = grow_regions(&field, &markers, None, BasinPolarity::Negate).unwrap();
        let v: Vec<u32> = out.iter().copied().collect();
        assert_eq!(&v[..4], &[1, 1, 1, 1]);
        assert_eq!(&v[5..], &[2, 2, 2, 2]);
    }

    #[test]
    fn growth_never_leaves_mask() {
        let truth = disks([40, 40], &[([12.0, 12.0], 6.0), ([26.0, 27.0], 7.0)]);
        let prob = blurred_field(&truth, 2.0);
        let mask = truth.mapv(|v| v != 0);
        let seeds = vec![
            SeedPoint {
                coord: vec![12.0, 12.0],
                source: SeedSource::Instance,
                origin_id: 1,
            },
            SeedPoint {
                coord: vec![26.0, 27.0],
                source: SeedSource::Instance,
                origin_id: 2,
            },
            SeedPoint::sentinel(2),
        ];
        let markers = build_markers(&seeds, &[40, 40], 2);
        let out = grow_regions(&prob, &markers, Some(&mask), BasinPolarity::Negate).unwrap();
        for (&l, &m) in out.iter().zip(mask.iter()) {
            assert!(l == 0 || m);
        }
        // every mask pixel is reachable, so each disk is fully claimed
        assert_eq!(out.mapv(|v| v != 0), mask);
        assert_eq!(out[IxDyn(&[12, 12])], 1);
        assert_eq!(out[IxDyn(&[26, 27])], 2);
    }

    #[test]
    fn direct_polarity_floods_from_minima() {
        let field = arr1(&[0.0f32, 0.4, 1.0, 0.4, 0.0]).into_dyn();
        let mut markers = ArrayD::zeros(IxDyn(&[5]));
        markers[IxDyn(&[0])] = 1u32;
        markers[IxDyn(&[4])] = 2;
        let out = grow_regions(&field, &markers, None, BasinPolarity::Direct).unwrap();
        assert_eq!(out[IxDyn(&[1])], 1);
        assert_eq!(out[IxDyn(&[3])], 2);
    }

    #[test]
    fn markers_outside_mask_are_dropped() {
        let field = ArrayD::from_elem(IxDyn(&[2, 2]), 1.0f32);
        let markers = arr2(&[[1u32, 0], [0, 0]]).into_dyn();
        let mask = arr2(&[[false, true], [true, true]]).into_dyn();
        let out = grow_regions(&field, &markers, Some(&mask), BasinPolarity::Negate).unwrap();
        assert!(out.iter().all(|&v| v == 0));
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let field = ArrayD::from_elem(IxDyn(&[2, 2]), 1.0f32);
        let markers: LabelImage = ArrayD::zeros(IxDyn(&[3, 2]));
        assert!(matches!(
            grow_regions(&field, &markers, None, BasinPolarity::Negate),
            Err(ReconcileError::ShapeMismatch { .. })
        ));
    }
}
