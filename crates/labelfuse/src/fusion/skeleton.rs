//! One-pixel skeletons of label boundaries.
//!
//! Thinning is the two-subiteration Zhang-Suen scheme on 2D planes; volumes
//! are thinned plane by plane along their trailing two axes.

use ndarray::{ArrayD, Zip};

use crate::error::{ReconcileError, Result};
use crate::grid::morphology::find_outer_boundaries;
use crate::grid::{flat, from_flat};
use crate::{LabelImage, ProbabilityField, SemanticMask};

/// Thin every 2D plane of `mask` to a one-pixel-wide skeleton.
pub fn thin(mask: &SemanticMask) -> SemanticMask {
    if mask.ndim() < 2 {
        return mask.clone();
    }
    let shape = mask.shape().to_vec();
    let (h, w) = (shape[shape.len() - 2], shape[shape.len() - 1]);
    let mut data = flat(mask);
    if h * w > 0 {
        for plane in data.chunks_mut(h * w) {
            zhang_suen(plane, h, w);
        }
    }
    from_flat(&shape, data)
}

fn zhang_suen(plane: &mut [bool], h: usize, w: usize) {
    let at = |p: &[bool], y: isize, x: isize| -> bool {
        y >= 0 && x >= 0 && (y as usize) < h && (x as usize) < w && p[y as usize * w + x as usize]
    };
    let mut removal = Vec::new();
    loop {
        let mut changed = false;
        for step in 0..2 {
            removal.clear();
            for y in 0..h as isize {
                for x in 0..w as isize {
                    if !plane[y as usize * w + x as usize] {
                        continue;
                    }
                    // P2..P9 clockwise from north
                    let n = [
                        at(plane, y - 1, x),
                        at(plane, y - 1, x + 1),
                        at(plane, y, x + 1),
                        at(plane, y + 1, x + 1),
                        at(plane, y + 1, x),
                        at(plane, y + 1, x - 1),
                        at(plane, y, x - 1),
                        at(plane, y - 1, x - 1),
                    ];
                    let count = n.iter().filter(|&&v| v).count();
                    if !(2..=6).contains(&count) {
                        continue;
                    }
                    let transitions = (0..8).filter(|&i| !n[i] && n[(i + 1) % 8]).count();
                    if transitions != 1 {
                        continue;
                    }
                    let (p2, p4, p6, p8) = (n[0], n[2], n[4], n[6]);
                    let keep = if step == 0 {
                        (p2 && p4 && p6) || (p4 && p6 && p8)
                    } else {
                        (p2 && p4 && p8) || (p2 && p6 && p8)
                    };
                    if !keep {
                        removal.push(y as usize * w + x as usize);
                    }
                }
            }
            for &i in &removal {
                plane[i] = false;
            }
            changed |= !removal.is_empty();
        }
        if !changed {
            break;
        }
    }
}

/// Skeleton of the outer boundaries of `labels`.
pub fn boundary_skeleton(labels: &LabelImage) -> SemanticMask {
    thin(&find_outer_boundaries(labels))
}

/// Probability-weighted boundary skeleton.
///
/// A pixel enters the thinning input when `(1 - p) + boundary >= cutoff`;
/// with the default cutoff of 1.2 that keeps boundary pixels whose interior
/// probability is at most 0.8.
pub fn probability_skeleton(
    labels: &LabelImage,
    probability: &ProbabilityField,
    cutoff: f32,
) -> Result<SemanticMask> {
    if labels.shape() != probability.shape() {
        return Err(ReconcileError::ShapeMismatch {
            what: "probability field",
            expected: labels.shape().to_vec(),
            got: probability.shape().to_vec(),
        });
    }
    let boundary = find_outer_boundaries(labels);
    let mut input = ArrayD::from_elem(labels.raw_dim(), false);
    Zip::from(&mut input)
        .and(&boundary)
        .and(probability)
        .for_each(|out, &b, &p| {
            let score = (1.0 - p) + if b { 1.0 } else { 0.0 };
            *out = score >= cutoff;
        });
    Ok(thin(&input))
}
