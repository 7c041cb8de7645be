//! Propagation of label identity across slices or frames.
//!
//! Each step is a pure function of the previous *output* slice and the
//! current *input* slice; [`stitch`] folds it strictly left to right over
//! the leading axis. Slice 0 passes through unchanged.

use std::collections::{BTreeSet, HashMap};

use ndarray::{ArrayD, Axis};
use rstar::{RTree, AABB};

use super::clean::remap;
use super::config::MatchStrategy;
use crate::error::{ReconcileError, Result};
use crate::grid::slices::restack;
use crate::grid::{region_props, RegionProps};
use crate::LabelImage;

// ── IoU matching ───────────────────────────────────────────────────────────

/// Relabel `cur` so regions overlapping `prev` with IoU at or above
/// `iou_threshold` inherit the previous id.
///
/// Pairs are accepted greedily by descending IoU, one-to-one. Unmatched
/// regions draw, in ascending label order, from the smallest ids in
/// `1..=n_regions` not taken by a match.
pub fn match_slice_iou(prev: &LabelImage, cur: &LabelImage, iou_threshold: f64) -> LabelImage {
    let mut prev_area: HashMap<u32, usize> = HashMap::new();
    let mut cur_area: HashMap<u32, usize> = HashMap::new();
    let mut overlap: HashMap<(u32, u32), usize> = HashMap::new();
    for (&p, &c) in prev.iter().zip(cur.iter()) {
        if p != 0 {
            *prev_area.entry(p).or_default() += 1;
        }
        if c != 0 {
            *cur_area.entry(c).or_default() += 1;
            if p != 0 {
                *overlap.entry((c, p)).or_default() += 1;
            }
        }
    }

    let mut candidates: Vec<(f64, u32, u32)> = overlap
        .iter()
        .map(|(&(c, p), &inter)| {
            let union = cur_area[&c] + prev_area[&p] - inter;
            (inter as f64 / union as f64, c, p)
        })
        .filter(|&(iou, _, _)| iou >= iou_threshold)
        .collect();
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut mapping: HashMap<u32, u32> = HashMap::new();
    let mut targets: BTreeSet<u32> = BTreeSet::new();
    for (iou, c, p) in candidates {
        if mapping.contains_key(&c) || targets.contains(&p) {
            continue;
        }
        tracing::trace!(from = c, to = p, iou, "iou match");
        mapping.insert(c, p);
        targets.insert(p);
    }

    let mut cur_ids: Vec<u32> = cur_area.keys().copied().collect();
    cur_ids.sort_unstable();
    let n = cur_ids.len() as u32;
    let mut reservoir = (1..=n).filter(|id| !targets.contains(id));
    for id in cur_ids {
        if !mapping.contains_key(&id) {
            if let Some(fresh) = reservoir.next() {
                mapping.insert(id, fresh);
            }
        }
    }
    remap(cur, &mapping)
}

/// IoU-stitch a stack of 2D slices (3D input) or 3D volumes (4D input).
pub fn match_labels(stack: &LabelImage, iou_threshold: f64) -> Result<LabelImage> {
    stitch(stack, &MatchStrategy::Iou { iou_threshold })
}

// ── nearest-centroid linking ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct CentroidEntry<const N: usize> {
    point: [f64; N],
    label: u32,
}

impl<const N: usize> rstar::RTreeObject for CentroidEntry<N>
where
    [f64; N]: rstar::Point<Scalar = f64>,
{
    type Envelope = AABB<[f64; N]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl<const N: usize> rstar::PointDistance for CentroidEntry<N>
where
    [f64; N]: rstar::Point<Scalar = f64>,
{
    fn distance_2(&self, point: &[f64; N]) -> f64 {
        self.point
            .iter()
            .zip(point)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

fn point<const N: usize>(centroid: &[f64]) -> [f64; N] {
    std::array::from_fn(|i| centroid[i])
}

/// Map each current region to the previous label it should adopt.
fn nearest_links<const N: usize>(
    prev: &[RegionProps],
    cur: &[RegionProps],
    max_distance: f64,
) -> Vec<(f64, u32, u32)>
where
    [f64; N]: rstar::Point<Scalar = f64>,
{
    let tree = RTree::bulk_load(
        prev.iter()
            .map(|r| CentroidEntry::<N> {
                point: point(&r.centroid),
                label: r.label,
            })
            .collect(),
    );
    let max_d2 = max_distance * max_distance;
    cur.iter()
        .filter_map(|r| {
            let query: [f64; N] = point(&r.centroid);
            let hit = tree.nearest_neighbor(&query)?;
            let d2 = rstar::PointDistance::distance_2(hit, &query);
            (d2 <= max_d2).then_some((d2, r.label, hit.label))
        })
        .collect()
}

/// Relabel `cur` by linking each region to the nearest centroid of `prev`.
///
/// A region within `max_distance` of a previous centroid adopts that
/// region's label; when several compete for one previous label the closest
/// wins. Regions left unlinked keep their own id, or take a fresh id above
/// every label in play when their own id was adopted by a linked region.
pub fn relink_nearest(prev: &LabelImage, cur: &LabelImage, max_distance: f64) -> Result<LabelImage> {
    let prev_props = region_props(prev);
    let cur_props = region_props(cur);
    let mut links = match cur.ndim() {
        2 => nearest_links::<2>(&prev_props, &cur_props, max_distance),
        3 => nearest_links::<3>(&prev_props, &cur_props, max_distance),
        got => {
            return Err(ReconcileError::Dimension {
                expected: "2D or 3D slice",
                got,
            })
        }
    };
    links.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut mapping: HashMap<u32, u32> = HashMap::new();
    let mut claimed: BTreeSet<u32> = BTreeSet::new();
    for (_, c, p) in links {
        if mapping.contains_key(&c) || claimed.contains(&p) {
            continue;
        }
        mapping.insert(c, p);
        claimed.insert(p);
    }

    let mut next = prev_props
        .iter()
        .chain(&cur_props)
        .map(|r| r.label)
        .max()
        .unwrap_or(0);
    for r in &cur_props {
        if mapping.contains_key(&r.label) {
            continue;
        }
        let id = if claimed.contains(&r.label) {
            next += 1;
            next
        } else {
            r.label
        };
        mapping.insert(r.label, id);
        claimed.insert(id);
    }
    Ok(remap(cur, &mapping))
}

// ── fold ───────────────────────────────────────────────────────────────────

/// Stitch a 3D or 4D stack along its leading axis with `strategy`.
pub fn stitch(stack: &LabelImage, strategy: &MatchStrategy) -> Result<LabelImage> {
    if !(3..=4).contains(&stack.ndim()) {
        return Err(ReconcileError::Dimension {
            expected: "3D or 4D label stack",
            got: stack.ndim(),
        });
    }
    let mut out: Vec<LabelImage> = Vec::with_capacity(stack.shape()[0]);
    for slice in stack.axis_iter(Axis(0)) {
        let cur: ArrayD<u32> = slice.to_owned();
        let next = match out.last() {
            None => cur,
            Some(prev) => match *strategy {
                MatchStrategy::Iou { iou_threshold } => match_slice_iou(prev, &cur, iou_threshold),
                MatchStrategy::NearestCentroid { max_distance } => {
                    relink_nearest(prev, &cur, max_distance)?
                }
            },
        };
        out.push(next);
    }
    tracing::debug!(slices = out.len(), ?strategy, "stitched label stack");
    restack(stack.shape(), out)
}
