//! Exact Euclidean distance transform with nearest-feature indices.
//!
//! Separable lower-envelope algorithm (Felzenszwalb & Huttenlocher): one
//! 1D pass per axis over squared distances, carrying the flat index of the
//! feature that realises each minimum. Works for any dimensionality.

use super::NdGrid;

/// Squared distance to, and flat index of, the nearest feature pixel.
#[derive(Debug, Clone)]
pub struct DistanceMap {
    /// Squared Euclidean distance per pixel; `f64::INFINITY` when the image
    /// holds no feature at all.
    pub dist_sq: Vec<f64>,
    /// Flat index of the nearest feature; `usize::MAX` when there is none.
    pub nearest: Vec<usize>,
}

/// Compute the distance transform of `features` (true = feature pixel).
pub fn distance_transform(shape: &[usize], features: &[bool]) -> DistanceMap {
    let grid = NdGrid::new(shape);
    let n = grid.len();
    let mut dist_sq: Vec<f64> = features
        .iter()
        .map(|&f| if f { 0.0 } else { f64::INFINITY })
        .collect();
    let mut nearest: Vec<usize> = features
        .iter()
        .enumerate()
        .map(|(i, &f)| if f { i } else { usize::MAX })
        .collect();
    if n == 0 {
        return DistanceMap { dist_sq, nearest };
    }

    let max_len = shape.iter().copied().max().unwrap_or(0);
    let mut f = vec![0.0f64; max_len];
    let mut d = vec![0.0f64; max_len];
    let mut arg = vec![0usize; max_len];
    let mut v = vec![0usize; max_len];
    let mut z = vec![0.0f64; max_len + 1];
    let mut line_nearest = vec![0usize; max_len];

    for axis in 0..grid.ndim() {
        let len = shape[axis];
        let stride = grid.stride(axis);
        if len <= 1 {
            continue;
        }
        // Every line along `axis` starts at an index whose coordinate on that axis is 0.
        for start in 0..n {
            if (start / stride) % len != 0 {
                continue;
            }
            let mut any = false;
            for q in 0..len {
                let idx = start + q * stride;
                f[q] = dist_sq[idx];
                line_nearest[q] = nearest[idx];
                any |= f[q].is_finite();
            }
            if !any {
                continue;
            }
            lower_envelope(&f[..len], &mut d[..len], &mut arg[..len], &mut v, &mut z);
            for q in 0..len {
                let idx = start + q * stride;
                dist_sq[idx] = d[q];
                nearest[idx] = line_nearest[arg[q]];
            }
        }
    }

    DistanceMap { dist_sq, nearest }
}

/// 1D squared-distance transform of the sampled function `f`.
///
/// Only finite samples become parabola sites; at least one must exist.
fn lower_envelope(f: &[f64], d: &mut [f64], arg: &mut [usize], v: &mut [usize], z: &mut [f64]) {
    let n = f.len();
    let mut k = 0usize;
    let mut started = false;

    for q in 0..n {
        if !f[q].is_finite() {
            continue;
        }
        if !started {
            v[0] = q;
            z[0] = f64::NEG_INFINITY;
            z[1] = f64::INFINITY;
            started = true;
            continue;
        }
        let qf = q as f64;
        let mut s;
        loop {
            let p = v[k] as f64;
            s = ((f[q] + qf * qf) - (f[v[k]] + p * p)) / (2.0 * qf - 2.0 * p);
            if s <= z[k] && k > 0 {
                k -= 1;
            } else {
                break;
            }
        }
        if s <= z[k] {
            // k == 0 and the new site dominates the whole envelope.
            v[0] = q;
            z[0] = f64::NEG_INFINITY;
            z[1] = f64::INFINITY;
            continue;
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }

    let mut k = 0usize;
    for q in 0..n {
        let qf = q as f64;
        while z[k + 1] < qf {
            k += 1;
        }
        let p = v[k] as f64;
        d[q] = (qf - p) * (qf - p) + f[v[k]];
        arg[q] = v[k];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn brute_force(shape: &[usize], features: &[bool]) -> Vec<f64> {
        let grid = NdGrid::new(shape);
        let sites: Vec<Vec<usize>> = (0..grid.len())
            .filter(|&i| features[i])
            .map(|i| grid.unravel(i))
            .collect();
        (0..grid.len())
            .map(|i| {
                let c = grid.unravel(i);
                sites
                    .iter()
                    .map(|s| {
                        s.iter()
                            .zip(&c)
                            .map(|(&a, &b)| (a as f64 - b as f64).powi(2))
                            .sum::<f64>()
                    })
                    .fold(f64::INFINITY, f64::min)
            })
            .collect()
    }

    #[test]
    fn one_dimensional_line() {
        let features = [false, true, false, false, false, false, true];
        let map = distance_transform(&[7], &features);
        let expect = [1.0, 0.0, 1.0, 4.0, 4.0, 1.0, 0.0];
        for (got, want) in map.dist_sq.iter().zip(expect) {
            assert_relative_eq!(*got, want);
        }
        assert_eq!(map.nearest[0], 1);
        assert_eq!(map.nearest[5], 6);
    }

    #[test]
    fn matches_brute_force_on_random_3d_volume() {
        let mut rng = StdRng::seed_from_u64(7);
        let shape = [5, 7, 6];
        let features: Vec<bool> = (0..5 * 7 * 6).map(|_| rng.gen_bool(0.08)).collect();
        let map = distance_transform(&shape, &features);
        let expect = brute_force(&shape, &features);
        let grid = NdGrid::new(&shape);
        for i in 0..grid.len() {
            assert_relative_eq!(map.dist_sq[i], expect[i], epsilon = 1e-9);
            if map.nearest[i] != usize::MAX {
                let a = grid.unravel(i);
                let b = grid.unravel(map.nearest[i]);
                let d: f64 = a
                    .iter()
                    .zip(&b)
                    .map(|(&x, &y)| (x as f64 - y as f64).powi(2))
                    .sum();
                assert_relative_eq!(d, expect[i], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn no_features_leaves_infinity() {
        let map = distance_transform(&[3, 3], &[false; 9]);
        assert!(map.dist_sq.iter().all(|d| d.is_infinite()));
        assert!(map.nearest.iter().all(|&n| n == usize::MAX));
    }
}
