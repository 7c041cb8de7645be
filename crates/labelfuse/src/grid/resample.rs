//! Resampling of predictor fields onto the label grid.

use ndarray::{ArrayD, Axis, IxDyn};

use super::{flat, from_flat, BoundingBox, NdGrid};
use crate::error::{ReconcileError, Result};

/// Upsample by an integer factor per axis with separable linear
/// interpolation.
///
/// Sample centres are aligned (`src = (dst + 0.5) / f - 0.5`) and lookups
/// past either end clamp to the edge value.
pub fn upsample(field: &ArrayD<f32>, factors: &[usize]) -> Result<ArrayD<f32>> {
    if factors.len() != field.ndim() {
        return Err(ReconcileError::ShapeMismatch {
            what: "upsampling factors",
            expected: vec![field.ndim()],
            got: vec![factors.len()],
        });
    }
    let mut shape = field.shape().to_vec();
    let mut data = flat(field);

    for (axis, &factor) in factors.iter().enumerate() {
        if factor <= 1 || shape[axis] == 0 {
            continue;
        }
        let src_len = shape[axis];
        let dst_len = src_len * factor;
        let src_grid = NdGrid::new(&shape);
        let mut dst_shape = shape.clone();
        dst_shape[axis] = dst_len;
        let dst_grid = NdGrid::new(&dst_shape);

        // Per output position: lower source index and weight of the upper one.
        let taps: Vec<(usize, usize, f32)> = (0..dst_len)
            .map(|d| {
                let src = ((d as f64 + 0.5) / factor as f64 - 0.5).max(0.0);
                let i0 = (src.floor() as usize).min(src_len - 1);
                let i1 = (i0 + 1).min(src_len - 1);
                (i0, i1, (src - i0 as f64) as f32)
            })
            .collect();

        let src_stride = src_grid.stride(axis);
        let dst_stride = dst_grid.stride(axis);
        let outer = src_grid.len() / (src_len * src_stride);
        let mut out = vec![0.0f32; dst_grid.len()];
        for o in 0..outer {
            for inner in 0..src_stride {
                let src_base = o * src_len * src_stride + inner;
                let dst_base = o * dst_len * dst_stride + inner;
                for (d, &(i0, i1, w)) in taps.iter().enumerate() {
                    let a = data[src_base + i0 * src_stride];
                    let b = data[src_base + i1 * src_stride];
                    out[dst_base + d * dst_stride] = a + (b - a) * w;
                }
            }
        }
        data = out;
        shape = dst_shape;
    }
    Ok(from_flat(&shape, data))
}

/// Crop or zero-pad `field` to `shape`, anchored at the origin.
pub fn fit_to_shape(field: &ArrayD<f32>, shape: &[usize]) -> Result<ArrayD<f32>> {
    if field.ndim() != shape.len() {
        return Err(ReconcileError::ShapeMismatch {
            what: "fitted field",
            expected: shape.to_vec(),
            got: field.shape().to_vec(),
        });
    }
    if field.shape() == shape {
        return Ok(field.clone());
    }
    let common = BoundingBox::new(
        vec![0; shape.len()],
        field.shape().iter().zip(shape).map(|(&a, &b)| a.min(b)).collect(),
    );
    let mut out = ArrayD::zeros(IxDyn(shape));
    common.crop_mut(&mut out).assign(&common.crop(field));
    Ok(out)
}

/// Maximum over the trailing axis (e.g. per-ray distances to one value).
pub fn max_project_last_axis(field: &ArrayD<f32>) -> ArrayD<f32> {
    let last = Axis(field.ndim() - 1);
    field.map_axis(last, |lane| lane.iter().copied().fold(f32::NEG_INFINITY, f32::max))
}
