//! Binary morphology and boundary extraction with face connectivity.
//!
//! Iterated dilation/erosion by the cross structuring element is the same
//! as thresholding the city-block distance, so both are computed with a
//! single breadth-first pass instead of `iterations` image sweeps.

use std::collections::VecDeque;

use ndarray::ArrayD;

use super::{flat, from_flat, Connectivity, NdGrid};
use crate::LabelImage;

fn city_block_within(
    grid: &NdGrid,
    seeds: impl Iterator<Item = (usize, usize)>,
    limit: usize,
    visited: &mut [bool],
) {
    let offsets = grid.neighbor_offsets(Connectivity::Face);
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    for (index, dist) in seeds {
        if !visited[index] {
            visited[index] = true;
            queue.push_back((index, dist));
        }
    }
    let mut coord = vec![0usize; grid.ndim()];
    let mut nbrs = Vec::with_capacity(offsets.len());
    while let Some((index, dist)) = queue.pop_front() {
        if dist >= limit {
            continue;
        }
        grid.unravel_into(index, &mut coord);
        grid.neighbors_of(&coord, &offsets, &mut nbrs);
        for &n in &nbrs {
            if !visited[n] {
                visited[n] = true;
                queue.push_back((n, dist + 1));
            }
        }
    }
}

/// Binary dilation repeated `iterations` times.
pub fn dilate_mask(mask: &ArrayD<bool>, iterations: usize) -> ArrayD<bool> {
    if iterations == 0 {
        return mask.clone();
    }
    let grid = NdGrid::new(mask.shape());
    let data = flat(mask);
    let mut out = vec![false; grid.len()];
    let seeds = data
        .iter()
        .enumerate()
        .filter(|(_, &v)| v)
        .map(|(i, _)| (i, 0));
    city_block_within(&grid, seeds, iterations, &mut out);
    from_flat(mask.shape(), out)
}

/// Binary erosion repeated `iterations` times.
///
/// Pixels outside the array count as background, so foreground touching
/// the border erodes from that side too.
pub fn erode_mask(mask: &ArrayD<bool>, iterations: usize) -> ArrayD<bool> {
    if iterations == 0 {
        return mask.clone();
    }
    let grid = NdGrid::new(mask.shape());
    let data = flat(mask);
    let mut coord = vec![0usize; grid.ndim()];
    let mut seeds = Vec::new();
    for (i, &v) in data.iter().enumerate() {
        if !v {
            seeds.push((i, 0));
        } else {
            grid.unravel_into(i, &mut coord);
            if grid.on_border(&coord) {
                seeds.push((i, 1));
            }
        }
    }
    // Seeds at distance 0 must be expanded before the border seeds.
    seeds.sort_by_key(|&(_, d)| d);
    let mut eroded_away = vec![false; grid.len()];
    city_block_within(&grid, seeds.into_iter(), iterations, &mut eroded_away);
    let out: Vec<bool> = eroded_away.iter().map(|&gone| !gone).collect();
    from_flat(mask.shape(), out)
}

/// Fill background cavities that are not connected to the array border.
pub fn fill_holes(mask: &ArrayD<bool>) -> ArrayD<bool> {
    let grid = NdGrid::new(mask.shape());
    let data = flat(mask);
    let mut reached = vec![false; grid.len()];
    let mut coord = vec![0usize; grid.ndim()];
    let mut stack = Vec::new();
    for (i, &v) in data.iter().enumerate() {
        if v {
            continue;
        }
        grid.unravel_into(i, &mut coord);
        if grid.on_border(&coord) {
            reached[i] = true;
            stack.push(i);
        }
    }
    let offsets = grid.neighbor_offsets(Connectivity::Face);
    let mut nbrs = Vec::with_capacity(offsets.len());
    while let Some(index) = stack.pop() {
        grid.unravel_into(index, &mut coord);
        grid.neighbors_of(&coord, &offsets, &mut nbrs);
        for &n in &nbrs {
            if !data[n] && !reached[n] {
                reached[n] = true;
                stack.push(n);
            }
        }
    }
    let out: Vec<bool> = data
        .iter()
        .zip(&reached)
        .map(|(&v, &outside)| v || !outside)
        .collect();
    from_flat(mask.shape(), out)
}

/// Outer boundaries of a label image.
///
/// A background pixel is a boundary when a face neighbour is labelled. A
/// labelled pixel is a boundary when it touches a different value across a
/// face and some neighbour in its full neighbourhood carries a different
/// non-zero label, i.e. where two regions meet.
pub fn find_outer_boundaries(labels: &LabelImage) -> ArrayD<bool> {
    let grid = NdGrid::new(labels.shape());
    let data = flat(labels);
    let face = grid.neighbor_offsets(Connectivity::Face);
    let full = grid.neighbor_offsets(Connectivity::Full);
    let mut coord = vec![0usize; grid.ndim()];
    let mut nbrs = Vec::with_capacity(full.len());
    let mut out = vec![false; grid.len()];

    for (i, &v) in data.iter().enumerate() {
        grid.unravel_into(i, &mut coord);
        grid.neighbors_of(&coord, &face, &mut nbrs);
        if v == 0 {
            out[i] = nbrs.iter().any(|&n| data[n] != 0);
            continue;
        }
        if !nbrs.iter().any(|&n| data[n] != v) {
            continue;
        }
        grid.neighbors_of(&coord, &full, &mut nbrs);
        out[i] = nbrs.iter().any(|&n| data[n] != 0 && data[n] != v);
    }
    from_flat(labels.shape(), out)
}

/// Grey dilation of sparse markers by a Euclidean ball of `radius`.
///
/// Where balls of different markers overlap the larger id wins.
pub fn dilate_ball(markers: &LabelImage, radius: usize) -> LabelImage {
    if radius == 0 {
        return markers.clone();
    }
    let grid = NdGrid::new(markers.shape());
    let ndim = grid.ndim();
    let r = radius as isize;
    let r2 = r * r;

    let mut ball: Vec<Vec<isize>> = Vec::new();
    let side = (2 * r + 1) as usize;
    let total = side.pow(ndim as u32);
    for code in 0..total {
        let mut rem = code;
        let mut off = vec![0isize; ndim];
        for slot in off.iter_mut().rev() {
            *slot = (rem % side) as isize - r;
            rem /= side;
        }
        if off.iter().map(|d| d * d).sum::<isize>() <= r2 {
            ball.push(off);
        }
    }

    let data = flat(markers);
    let mut out = data.clone();
    let mut coord = vec![0usize; ndim];
    let mut nbrs = Vec::with_capacity(ball.len());
    for (i, &v) in data.iter().enumerate() {
        if v == 0 {
            continue;
        }
        grid.unravel_into(i, &mut coord);
        grid.neighbors_of(&coord, &ball, &mut nbrs);
        for &n in &nbrs {
            out[n] = out[n].max(v);
        }
    }
    from_flat(markers.shape(), out)
}
