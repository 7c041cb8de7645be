//! N-dimensional array primitives shared by the fusion stages.
//!
//! Everything here works on C-ordered flat buffers addressed through
//! [`NdGrid`], so the same code serves 2D slices, 3D volumes and stacked
//! time series. Stage code converts `ndarray` arrays to flat vectors with
//! [`flat`] and back with [`from_flat`].

pub mod bbox;
pub mod components;
pub mod edt;
pub mod intensity;
pub mod morphology;
pub mod regionprops;
pub mod resample;
pub mod slices;
pub mod threshold;

use ndarray::{ArrayD, IxDyn};

pub use bbox::BoundingBox;
pub use components::{label_mask, label_regions};
pub use regionprops::{region_props, RegionProps};

/// Neighbourhood used when walking between adjacent pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Neighbours sharing a face: 4 in 2D, 6 in 3D.
    #[default]
    Face,
    /// All neighbours in the surrounding hypercube: 8 in 2D, 26 in 3D.
    Full,
}

/// Shape and strides of a C-ordered flat buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdGrid {
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl NdGrid {
    pub fn new(shape: &[usize]) -> Self {
        let mut strides = vec![1usize; shape.len()];
        for axis in (0..shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * shape[axis + 1];
        }
        Self {
            shape: shape.to_vec(),
            strides,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stride(&self, axis: usize) -> usize {
        self.strides[axis]
    }

    /// Flat index of a coordinate. The coordinate must be in bounds.
    #[inline]
    pub fn ravel(&self, coord: &[usize]) -> usize {
        coord
            .iter()
            .zip(&self.strides)
            .map(|(&c, &s)| c * s)
            .sum()
    }

    /// Write the coordinate of `index` into `out`.
    #[inline]
    pub fn unravel_into(&self, mut index: usize, out: &mut [usize]) {
        for (axis, &stride) in self.strides.iter().enumerate() {
            out[axis] = index / stride;
            index %= stride;
        }
    }

    pub fn unravel(&self, index: usize) -> Vec<usize> {
        let mut out = vec![0; self.ndim()];
        self.unravel_into(index, &mut out);
        out
    }

    /// Relative coordinate offsets of the requested neighbourhood
    /// (the origin itself excluded).
    pub fn neighbor_offsets(&self, connectivity: Connectivity) -> Vec<Vec<isize>> {
        let ndim = self.ndim();
        match connectivity {
            Connectivity::Face => {
                let mut out = Vec::with_capacity(2 * ndim);
                for axis in 0..ndim {
                    for delta in [-1isize, 1] {
                        let mut off = vec![0isize; ndim];
                        off[axis] = delta;
                        out.push(off);
                    }
                }
                out
            }
            Connectivity::Full => {
                let total = 3usize.pow(ndim as u32);
                let mut out = Vec::with_capacity(total.saturating_sub(1));
                for code in 0..total {
                    let mut rem = code;
                    let mut off = vec![0isize; ndim];
                    for slot in off.iter_mut().rev() {
                        *slot = (rem % 3) as isize - 1;
                        rem /= 3;
                    }
                    if off.iter().any(|&d| d != 0) {
                        out.push(off);
                    }
                }
                out
            }
        }
    }

    /// Push the flat indices of all in-bounds neighbours of `coord`.
    #[inline]
    pub fn neighbors_of(&self, coord: &[usize], offsets: &[Vec<isize>], out: &mut Vec<usize>) {
        out.clear();
        'offsets: for off in offsets {
            let mut index = 0usize;
            for axis in 0..coord.len() {
                let c = coord[axis] as isize + off[axis];
                if c < 0 || c >= self.shape[axis] as isize {
                    continue 'offsets;
                }
                index += c as usize * self.strides[axis];
            }
            out.push(index);
        }
    }

    /// Whether `coord` lies on the outer face of the grid along any axis.
    pub fn on_border(&self, coord: &[usize]) -> bool {
        coord
            .iter()
            .zip(&self.shape)
            .any(|(&c, &n)| c == 0 || c + 1 == n)
    }
}

/// Copy an array into a C-ordered flat vector.
pub fn flat<T: Clone>(array: &ArrayD<T>) -> Vec<T> {
    array.iter().cloned().collect()
}

/// Wrap a C-ordered flat vector as an array of the given shape.
pub fn from_flat<T>(shape: &[usize], data: Vec<T>) -> ArrayD<T> {
    ArrayD::from_shape_vec(IxDyn(shape), data).expect("flat buffer length matches shape")
}

/// Largest label value, or 0 for an all-background image.
pub fn max_label(labels: &ArrayD<u32>) -> u32 {
    labels.iter().copied().max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ravel_unravel_agree() {
        let grid = NdGrid::new(&[3, 4, 5]);
        for index in 0..grid.len() {
            let coord = grid.unravel(index);
            assert_eq!(grid.ravel(&coord), index);
        }
    }

    #[test]
    fn offsets_have_expected_counts() {
        let g2 = NdGrid::new(&[4, 4]);
        assert_eq!(g2.neighbor_offsets(Connectivity::Face).len(), 4);
        assert_eq!(g2.neighbor_offsets(Connectivity::Full).len(), 8);
        let g3 = NdGrid::new(&[4, 4, 4]);
        assert_eq!(g3.neighbor_offsets(Connectivity::Face).len(), 6);
        assert_eq!(g3.neighbor_offsets(Connectivity::Full).len(), 26);
    }

    #[test]
    fn corner_has_clipped_neighbourhood() {
        let grid = NdGrid::new(&[3, 3]);
        let offsets = grid.neighbor_offsets(Connectivity::Full);
        let mut out = Vec::new();
        grid.neighbors_of(&[0, 0], &offsets, &mut out);
        out.sort_unstable();
        assert_eq!(out, vec![1, 3, 4]);
    }
}
