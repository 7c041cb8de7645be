//! Connected-component labelling.
//!
//! Components are numbered 1.. in raster order of their first pixel, so the
//! output is deterministic for a given input.

use ndarray::ArrayD;

use super::{flat, from_flat, Connectivity, NdGrid};
use crate::LabelImage;

fn flood_components<F>(shape: &[usize], connectivity: Connectivity, same: F) -> (Vec<u32>, u32)
where
    F: Fn(usize, usize) -> bool,
{
    let grid = NdGrid::new(shape);
    let offsets = grid.neighbor_offsets(connectivity);
    let mut out = vec![0u32; grid.len()];
    let mut next = 0u32;
    let mut stack = Vec::new();
    let mut coord = vec![0usize; grid.ndim()];
    let mut nbrs = Vec::with_capacity(offsets.len());

    for start in 0..grid.len() {
        if out[start] != 0 || !same(start, start) {
            continue;
        }
        next += 1;
        out[start] = next;
        stack.push(start);
        while let Some(index) = stack.pop() {
            grid.unravel_into(index, &mut coord);
            grid.neighbors_of(&coord, &offsets, &mut nbrs);
            for &n in &nbrs {
                if out[n] == 0 && same(index, n) {
                    out[n] = next;
                    stack.push(n);
                }
            }
        }
    }
    (out, next)
}

/// Label the connected foreground components of a binary mask.
///
/// Returns the label image and the number of components found.
pub fn label_mask(mask: &ArrayD<bool>, connectivity: Connectivity) -> (LabelImage, u32) {
    let data = flat(mask);
    let (out, n) = flood_components(mask.shape(), connectivity, |a, b| data[a] && data[b]);
    (from_flat(mask.shape(), out), n)
}

/// Split a label image into connected components of equal value.
///
/// Two pixels join the same output component only if they carry the same
/// non-zero input id and are connected; a disconnected id yields several
/// output ids.
pub fn label_regions(labels: &LabelImage, connectivity: Connectivity) -> (LabelImage, u32) {
    let data = flat(labels);
    let (out, n) = flood_components(labels.shape(), connectivity, |a, b| {
        data[a] != 0 && data[a] == data[b]
    });
    (from_flat(labels.shape(), out), n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, IxDyn};

    #[test]
    fn diagonal_pixels_join_only_with_full_connectivity() {
        let mask = arr2(&[[true, false], [false, true]]).into_dyn();
        let (_, n_face) = label_mask(&mask, Connectivity::Face);
        let (_, n_full) = label_mask(&mask, Connectivity::Full);
        assert_eq!(n_face, 2);
        assert_eq!(n_full, 1);
    }

    #[test]
    fn ids_follow_raster_order() {
        let mask = arr2(&[[false, false, true], [true, false, true]]).into_dyn();
        let (labels, n) = label_mask(&mask, Connectivity::Full);
        assert_eq!(n, 2);
        assert_eq!(labels[IxDyn(&[0, 2])], 1);
        assert_eq!(labels[IxDyn(&[1, 0])], 2);
    }

    #[test]
    fn equal_valued_but_separate_regions_are_split() {
        let labels = arr2(&[[5u32, 0, 5], [5, 0, 7]]).into_dyn();
        let (out, n) = label_regions(&labels, Connectivity::Full);
        assert_eq!(n, 3);
        assert_ne!(out[IxDyn(&[0, 0])], out[IxDyn(&[0, 2])]);
        assert_ne!(out[IxDyn(&[0, 2])], out[IxDyn(&[1, 2])]);
    }
}
