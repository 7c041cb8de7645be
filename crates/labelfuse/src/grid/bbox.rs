//! Axis-aligned, half-open bounding boxes over N-d grids.

use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Slice};

/// Per-axis half-open interval `[min, max)`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub min: Vec<usize>,
    pub max: Vec<usize>,
}

impl BoundingBox {
    pub fn new(min: Vec<usize>, max: Vec<usize>) -> Self {
        debug_assert_eq!(min.len(), max.len());
        Self { min, max }
    }

    /// Box covering an entire array of `shape`.
    pub fn full(shape: &[usize]) -> Self {
        Self {
            min: vec![0; shape.len()],
            max: shape.to_vec(),
        }
    }

    /// Degenerate box around a single coordinate, to be grown with [`Self::include`].
    pub fn at(coord: &[usize]) -> Self {
        Self {
            min: coord.to_vec(),
            max: coord.iter().map(|&c| c + 1).collect(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.min.len()
    }

    pub fn extent(&self, axis: usize) -> usize {
        self.max[axis].saturating_sub(self.min[axis])
    }

    pub fn shape(&self) -> Vec<usize> {
        (0..self.ndim()).map(|axis| self.extent(axis)).collect()
    }

    /// Number of grid cells inside the box.
    pub fn volume(&self) -> usize {
        (0..self.ndim()).map(|axis| self.extent(axis)).product()
    }

    pub fn is_full(&self, shape: &[usize]) -> bool {
        self.min.iter().all(|&m| m == 0) && self.max == shape
    }

    /// Extend the box so it contains `coord`.
    #[inline]
    pub fn include(&mut self, coord: &[usize]) {
        for axis in 0..self.ndim() {
            self.min[axis] = self.min[axis].min(coord[axis]);
            self.max[axis] = self.max[axis].max(coord[axis] + 1);
        }
    }

    /// Whether a continuous point (e.g. a centroid) lies inside the box.
    pub fn contains_point(&self, point: &[f64]) -> bool {
        point.len() == self.ndim()
            && point
                .iter()
                .enumerate()
                .all(|(axis, &p)| p >= self.min[axis] as f64 && p < self.max[axis] as f64)
    }

    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let mut min = Vec::with_capacity(self.ndim());
        let mut max = Vec::with_capacity(self.ndim());
        for axis in 0..self.ndim() {
            let lo = self.min[axis].max(other.min[axis]);
            let hi = self.max[axis].min(other.max[axis]);
            if lo >= hi {
                return None;
            }
            min.push(lo);
            max.push(hi);
        }
        Some(BoundingBox { min, max })
    }

    /// Grow by `margin` on every side, clipped to `shape`.
    pub fn grown(&self, margin: usize, shape: &[usize]) -> BoundingBox {
        BoundingBox {
            min: self.min.iter().map(|&m| m.saturating_sub(margin)).collect(),
            max: self
                .max
                .iter()
                .zip(shape)
                .map(|(&m, &n)| (m + margin).min(n))
                .collect(),
        }
    }

    /// Drop the leading axis (e.g. go from a ZYX box to its YX footprint).
    pub fn without_leading_axis(&self) -> BoundingBox {
        BoundingBox {
            min: self.min[1..].to_vec(),
            max: self.max[1..].to_vec(),
        }
    }

    /// Prepend an axis spanning `[0, len)`.
    pub fn with_leading_axis(&self, len: usize) -> BoundingBox {
        let mut min = vec![0];
        min.extend_from_slice(&self.min);
        let mut max = vec![len];
        max.extend_from_slice(&self.max);
        BoundingBox { min, max }
    }

    /// Read-only view of the box region of `array`.
    pub fn crop<'a, T>(&self, array: &'a ArrayD<T>) -> ArrayViewD<'a, T> {
        array.slice_each_axis(|ad| {
            let axis = ad.axis.index();
            Slice::from(self.min[axis]..self.max[axis])
        })
    }

    /// Mutable view of the box region of `array`.
    pub fn crop_mut<'a, T>(&self, array: &'a mut ArrayD<T>) -> ArrayViewMutD<'a, T> {
        array.slice_each_axis_mut(|ad| {
            let axis = ad.axis.index();
            Slice::from(self.min[axis]..self.max[axis])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_grows_half_open() {
        let mut b = BoundingBox::at(&[2, 3]);
        b.include(&[4, 1]);
        assert_eq!(b.min, vec![2, 1]);
        assert_eq!(b.max, vec![5, 4]);
        assert_eq!(b.volume(), 9);
    }

    #[test]
    fn centroid_on_max_edge_is_outside() {
        let b = BoundingBox::new(vec![0, 0], vec![4, 4]);
        assert!(b.contains_point(&[3.9, 0.0]));
        assert!(!b.contains_point(&[4.0, 0.0]));
    }

    #[test]
    fn disjoint_boxes_do_not_intersect() {
        let a = BoundingBox::new(vec![0, 0], vec![2, 2]);
        let b = BoundingBox::new(vec![2, 0], vec![4, 2]);
        assert!(a.intersection(&b).is_none());
        let c = BoundingBox::new(vec![1, 1], vec![3, 3]);
        assert_eq!(a.intersection(&c).unwrap().volume(), 1);
    }

    #[test]
    fn grown_is_clipped() {
        let b = BoundingBox::new(vec![0, 3], vec![2, 5]);
        let g = b.grown(1, &[3, 5]);
        assert_eq!(g.min, vec![0, 2]);
        assert_eq!(g.max, vec![3, 5]);
    }
}
