//! Semantic foreground mask construction.
//!
//! A continuous foreground field is Otsu-thresholded, split into connected
//! components, size-filtered and hole-repaired. Volumes additionally get
//! the permissive "overall" mask, a per-slice morphological closing that
//! bridges gaps between nearby cells and serves as the looser growth
//! boundary downstream.

use ndarray::ArrayD;

use super::clean::{fill_label_holes, filter_by_size, relabel_sequential};
use super::config::{MatchStrategy, SemanticMaskConfig};
use super::stitch::stitch;
use crate::error::Result;
use crate::grid::morphology::{dilate_mask, erode_mask, fill_holes};
use crate::grid::slices::map_slices;
use crate::grid::threshold::threshold_or_all;
use crate::grid::{label_mask, Connectivity};
use crate::{LabelImage, ProbabilityField, SemanticMask};

/// Result of [`build_semantic_mask`].
#[derive(Debug, Clone)]
pub struct SemanticMaskOutput {
    /// Connected foreground components, sequential ids.
    pub labels: LabelImage,
    /// `labels > 0`.
    pub mask: SemanticMask,
    /// Closed and hole-filled mask, volumes only.
    pub overall: Option<SemanticMask>,
}

impl SemanticMaskOutput {
    /// Mask that bounds region growing: the overall mask when present.
    pub fn growth_mask(&self) -> &SemanticMask {
        self.overall.as_ref().unwrap_or(&self.mask)
    }
}

/// Build the semantic foreground mask of a 2D or 3D field.
///
/// With `cfg.slice_merge` on a volume, slices are labelled independently
/// and stitched with `slice_matching`.
pub fn build_semantic_mask(
    field: &ProbabilityField,
    cfg: &SemanticMaskConfig,
    slice_matching: &MatchStrategy,
) -> Result<SemanticMaskOutput> {
    let binary = threshold_or_all(field);
    let volumetric = binary.ndim() == 3;

    let labels = if volumetric && cfg.slice_merge {
        let per_slice = map_slices(&binary, |slice| label_mask(&slice, Connectivity::Full).0);
        stitch(&per_slice, slice_matching)?
    } else {
        label_mask(&binary, Connectivity::Full).0
    };
    let labels = filter_by_size(&labels, cfg.min_size, cfg.max_size);
    let labels = relabel_sequential(&fill_label_holes(&labels));
    let mask = labels.mapv(|v| v != 0);

    let overall = match cfg.closing_iterations {
        Some(iterations) if volumetric => Some(overall_mask(&mask, iterations)),
        _ => None,
    };

    tracing::info!(
        shape = ?field.shape(),
        regions = crate::grid::max_label(&labels),
        foreground = mask.iter().filter(|&&v| v).count(),
        overall = overall.is_some(),
        "semantic mask built"
    );
    Ok(SemanticMaskOutput {
        labels,
        mask,
        overall,
    })
}

/// Per-slice closing by `iterations` followed by hole filling.
pub fn overall_mask(mask: &SemanticMask, iterations: usize) -> SemanticMask {
    map_slices(mask, |slice: ArrayD<bool>| {
        let closed = erode_mask(&dilate_mask(&slice, iterations), iterations);
        fill_holes(&closed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{blurred_field, disks, stack_slices};
    use ndarray::IxDyn;

    #[test]
    fn blobs_become_components() {
        let truth = disks([40, 40], &[([10.0, 10.0], 5.0), ([28.0, 28.0], 6.0)]);
        let field = truth.mapv(|v| if v != 0 { 0.9f32 } else { 0.05 });
        let out = build_semantic_mask(&field, &SemanticMaskConfig::default(), &MatchStrategy::default())
            .unwrap();
        assert_eq!(crate::grid::max_label(&out.labels), 2);
        assert!(out.overall.is_none());
        assert!(out.mask[IxDyn(&[10, 10])]);
        assert!(!out.mask[IxDyn(&[0, 0])]);
    }

    #[test]
    fn constant_field_falls_back_to_all_foreground() {
        let field = ArrayD::from_elem(IxDyn(&[8, 8]), 0.3f32);
        let out = build_semantic_mask(&field, &SemanticMaskConfig::default(), &MatchStrategy::default())
            .unwrap();
        assert!(out.mask.iter().all(|&v| v));
        assert_eq!(crate::grid::max_label(&out.labels), 1);
    }

    #[test]
    fn small_components_are_dropped() {
        let truth = disks([30, 30], &[([5.0, 5.0], 1.0), ([18.0, 18.0], 6.0)]);
        let field = truth.mapv(|v| if v != 0 { 1.0f32 } else { 0.0 });
        let out = build_semantic_mask(&field, &SemanticMaskConfig::default(), &MatchStrategy::default())
            .unwrap();
        assert!(!out.mask[IxDyn(&[5, 5])]);
        assert!(out.mask[IxDyn(&[18, 18])]);
    }

    #[test]
    fn volume_gets_overall_mask_covering_semantic_mask() {
        let slice = disks([32, 32], &[([12.0, 12.0], 5.0), ([12.0, 22.0], 4.0)]);
        let prob = blurred_field(&slice, 1.0);
        let field = stack_slices(&[prob.clone(), prob.clone(), prob]);
        let cfg = SemanticMaskConfig {
            closing_iterations: Some(3),
            slice_merge: true,
            ..SemanticMaskConfig::default()
        };
        let out = build_semantic_mask(&field, &cfg, &MatchStrategy::default()).unwrap();
        let overall = out.overall.as_ref().unwrap();
        assert!(out
            .mask
            .iter()
            .zip(overall.iter())
            .all(|(&m, &o)| !m || o));
        assert!(std::ptr::eq(out.growth_mask(), overall));
    }
}
