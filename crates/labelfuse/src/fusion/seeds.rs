//! Seed-point collection for marker-controlled growing.
//!
//! Coverage is judged with one geometric predicate throughout: a point is
//! covered by a region when it lies inside the region's half-open bounding
//! box.

use std::cmp::Ordering;
use std::collections::HashSet;

use ndarray::Zip;

use crate::error::{ReconcileError, Result};
use crate::grid::{label_mask, region_props, Connectivity, RegionProps};
use crate::{LabelImage, SemanticMask};

/// Where a seed point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedSource {
    /// Centroid of an instance-predictor region.
    Instance,
    /// Centroid of a semantic component no instance covers.
    SemanticOnly,
    /// Fixed seed at the coordinate origin.
    Sentinel,
}

/// One growth seed.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SeedPoint {
    /// Continuous coordinate, one entry per axis.
    pub coord: Vec<f64>,
    pub source: SeedSource,
    /// Id of the originating region (0 for the sentinel).
    pub origin_id: u32,
}

impl SeedPoint {
    pub fn sentinel(ndim: usize) -> Self {
        Self {
            coord: vec![0.0; ndim],
            source: SeedSource::Sentinel,
            origin_id: 0,
        }
    }

    fn from_region(region: &RegionProps, source: SeedSource) -> Self {
        Self {
            coord: region.centroid.clone(),
            source,
            origin_id: region.label,
        }
    }
}

/// Output of [`collect_seeds`].
#[derive(Debug, Clone)]
pub struct SeedCollection {
    /// Instance seeds, then semantic-only seeds, then the sentinel.
    pub seeds: Vec<SeedPoint>,
    /// Semantic mask with uncontested instance regions painted in.
    pub growth_mask: SemanticMask,
}

impl SeedCollection {
    pub fn count(&self, source: SeedSource) -> usize {
        self.seeds.iter().filter(|s| s.source == source).count()
    }
}

fn covers_any(region: &RegionProps, points: &[&[f64]]) -> bool {
    points.iter().any(|p| region.bbox.contains_point(p))
}

/// Lexicographic order of two coordinates, leading axis first.
fn cmp_coords(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Collect seeds from instance regions and the semantic mask.
///
/// Instance seeds follow label order in 2D; in a volume they are ordered by
/// centroid (z, then y, then x), which fixes the marker ids they receive.
///
/// An instance region is painted into the mask when no semantic component
/// centroid lies inside its bounding box. With `seed_pool`, every semantic
/// component (of the painted mask) whose bounding box holds no instance
/// centroid contributes its own centroid as a seed.
pub fn collect_seeds(
    instances: &LabelImage,
    mask: &SemanticMask,
    seed_pool: bool,
) -> Result<SeedCollection> {
    if instances.shape() != mask.shape() {
        return Err(ReconcileError::ShapeMismatch {
            what: "semantic mask",
            expected: instances.shape().to_vec(),
            got: mask.shape().to_vec(),
        });
    }
    let instance_props = region_props(instances);
    let semantic_props = region_props(&label_mask(mask, Connectivity::Full).0);
    let semantic_centroids: Vec<&[f64]> =
        semantic_props.iter().map(|r| r.centroid.as_slice()).collect();

    let painted: HashSet<u32> = instance_props
        .iter()
        .filter(|r| !covers_any(r, &semantic_centroids))
        .map(|r| r.label)
        .collect();
    let mut growth_mask = mask.clone();
    if !painted.is_empty() {
        Zip::from(&mut growth_mask).and(instances).for_each(|m, &l| {
            if l != 0 && painted.contains(&l) {
                *m = true;
            }
        });
    }

    let mut seeds: Vec<SeedPoint> = instance_props
        .iter()
        .map(|r| SeedPoint::from_region(r, SeedSource::Instance))
        .collect();
    if instances.ndim() == 3 {
        seeds.sort_by(|a, b| cmp_coords(&a.coord, &b.coord));
    }

    if seed_pool {
        let instance_centroids: Vec<&[f64]> =
            instance_props.iter().map(|r| r.centroid.as_slice()).collect();
        let pooled = if painted.is_empty() {
            semantic_props
        } else {
            region_props(&label_mask(&growth_mask, Connectivity::Full).0)
        };
        seeds.extend(
            pooled
                .iter()
                .filter(|r| !covers_any(r, &instance_centroids))
                .map(|r| SeedPoint::from_region(r, SeedSource::SemanticOnly)),
        );
    }
    seeds.push(SeedPoint::sentinel(instances.ndim()));

    let out = SeedCollection { seeds, growth_mask };
    tracing::debug!(
        instance = out.count(SeedSource::Instance),
        semantic_only = out.count(SeedSource::SemanticOnly),
        painted = painted.len(),
        "seeds collected"
    );
    Ok(out)
}

/// Seeds for instance regions that no flow region covers, plus the sentinel.
///
/// With no flow regions at all every instance centroid is kept.
pub fn collect_uncovered_seeds(instances: &LabelImage, flow_labels: &LabelImage) -> Vec<SeedPoint> {
    let flow_props = region_props(flow_labels);
    let mut seeds: Vec<SeedPoint> = region_props(instances)
        .iter()
        .filter(|r| !flow_props.iter().any(|f| f.bbox.contains_point(&r.centroid)))
        .map(|r| SeedPoint::from_region(r, SeedSource::Instance))
        .collect();
    seeds.push(SeedPoint::sentinel(instances.ndim()));
    seeds
}
