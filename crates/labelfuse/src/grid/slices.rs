//! Parallel per-slice processing along the leading axis.

use ndarray::{ArrayD, Axis};
use rayon::prelude::*;

use crate::error::Result;

/// Apply `f` to every sub-array along axis 0 in parallel and restack the
/// results in order.
pub fn map_slices<T, U, F>(array: &ArrayD<T>, f: F) -> ArrayD<U>
where
    T: Clone + Sync,
    U: Clone + Send + Default,
    F: Fn(ArrayD<T>) -> ArrayD<U> + Sync,
{
    let n = array.shape()[0];
    let out: Vec<ArrayD<U>> = (0..n)
        .into_par_iter()
        .map(|i| f(array.index_axis(Axis(0), i).to_owned()))
        .collect();
    restack(array.shape(), out).expect("per-slice results share a shape")
}

/// Fallible variant of [`map_slices`]; any failing slice aborts the whole map.
pub fn try_map_slices<T, U, F>(array: &ArrayD<T>, f: F) -> Result<ArrayD<U>>
where
    T: Clone + Sync,
    U: Clone + Send + Default,
    F: Fn(usize, ArrayD<T>) -> Result<ArrayD<U>> + Sync + Send,
{
    let n = array.shape()[0];
    let out: Vec<ArrayD<U>> = (0..n)
        .into_par_iter()
        .map(|i| f(i, array.index_axis(Axis(0), i).to_owned()))
        .collect::<Result<Vec<_>>>()?;
    restack(array.shape(), out)
}

/// Stack equally shaped arrays along a new leading axis.
///
/// `full_shape` is only used when `parts` is empty.
pub fn restack<U: Clone + Default>(full_shape: &[usize], parts: Vec<ArrayD<U>>) -> Result<ArrayD<U>> {
    if parts.is_empty() {
        return Ok(ArrayD::default(full_shape));
    }
    let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;
    use ndarray::{arr2, IxDyn};

    #[test]
    fn slices_are_processed_in_order() {
        let a = arr2(&[[1u32, 2], [3, 4], [5, 6]]).into_dyn();
        let out = map_slices(&a, |s| s.mapv(|v| v * 10));
        assert_eq!(out, arr2(&[[10u32, 20], [30, 40], [50, 60]]).into_dyn());
    }

    #[test]
    fn first_error_is_reported() {
        let a = ArrayD::<u32>::zeros(IxDyn(&[4, 2]));
        let res = try_map_slices(&a, |i, s| {
            if i >= 2 {
                Err(ReconcileError::Config(format!("slice {}", i)))
            } else {
                Ok(s)
            }
        });
        assert!(matches!(res, Err(ReconcileError::Config(_))));
    }
}
