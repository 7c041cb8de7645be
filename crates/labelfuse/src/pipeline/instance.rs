//! Instance path: predictor call, field preparation and seeded growth.

use ndarray::{ArrayD, Axis};
use rayon::prelude::*;

use crate::error::{ReconcileError, Result};
use crate::fusion::semantic_mask::SemanticMaskOutput;
use crate::fusion::{
    build_markers, clean_labels, collect_seeds, grow_regions, relabel_sequential, stitch,
    suppress_duplicates, validate_labels, BasinPolarity, ReconcileConfig,
};
use crate::grid::intensity::normalize_percentile;
use crate::grid::resample::{fit_to_shape, max_project_last_axis, upsample};
use crate::grid::slices::restack;
use crate::predictor::{predictor_failed, InstancePrediction, InstancePredictor, Layout};
use crate::{LabelImage, ProbabilityField, SemanticMask};

/// Instance-predictor fields at label resolution.
#[derive(Debug, Clone)]
pub(crate) struct InstanceFields {
    pub probability: ProbabilityField,
    pub distance: ArrayD<f32>,
}

/// Bring the predictor's auxiliary fields onto the label grid.
///
/// An empty `grid` means the fields are already at full resolution.
pub(crate) fn prepare_instance_fields(
    prediction: &InstancePrediction,
    grid: &[usize],
    shape: &[usize],
    global_threshold: f32,
) -> Result<InstanceFields> {
    let ones;
    let factors = if grid.is_empty() {
        ones = vec![1; shape.len()];
        &ones
    } else {
        grid
    };
    if factors.len() != shape.len() {
        return Err(ReconcileError::ShapeMismatch {
            what: "instance predictor grid",
            expected: vec![shape.len()],
            got: vec![factors.len()],
        });
    }

    let mut probability = fit_to_shape(&upsample(&prediction.probability, factors)?, shape)?;
    probability.mapv_inplace(|p| if p < global_threshold { 0.0 } else { p });

    let distance = if prediction.distance.ndim() == shape.len() + 1 {
        max_project_last_axis(&prediction.distance)
    } else {
        prediction.distance.clone()
    };
    let distance = fit_to_shape(&upsample(&distance, factors)?, shape)?;
    Ok(InstanceFields {
        probability,
        distance,
    })
}

/// Everything the instance path hands to the frame assembler.
#[derive(Debug, Clone)]
pub(crate) struct InstanceOutcome {
    /// Grown, suppressed and cleaned labels.
    pub labels: LabelImage,
    /// Validated predictor labels.
    pub predicted: LabelImage,
    pub probability: ProbabilityField,
    pub markers: LabelImage,
    /// Growth boundary including painted-in instance regions.
    pub growth_mask: SemanticMask,
    pub stitched: bool,
}

struct Grown {
    labels: LabelImage,
    markers: LabelImage,
    growth_mask: SemanticMask,
}

fn grow(
    instances: &LabelImage,
    mask: &SemanticMask,
    field: &ArrayD<f32>,
    cfg: &ReconcileConfig,
) -> Result<Grown> {
    let seeds = collect_seeds(instances, mask, cfg.instance.seed_pool)?;
    let markers = build_markers(&seeds.seeds, instances.shape(), cfg.instance.marker_radius);
    let grown = grow_regions(field, &markers, Some(&seeds.growth_mask), BasinPolarity::Negate)?;
    Ok(Grown {
        labels: clean_labels(&grown, &cfg.clean),
        markers,
        growth_mask: seeds.growth_mask,
    })
}

fn grow_per_slice(
    instances: &LabelImage,
    mask: &SemanticMask,
    field: &ArrayD<f32>,
    cfg: &ReconcileConfig,
) -> Result<Grown> {
    let slices: Vec<Grown> = (0..instances.shape()[0])
        .into_par_iter()
        .map(|z| {
            grow(
                &instances.index_axis(Axis(0), z).to_owned(),
                &mask.index_axis(Axis(0), z).to_owned(),
                &field.index_axis(Axis(0), z).to_owned(),
                cfg,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let shape = instances.shape();
    let mut labels = Vec::with_capacity(slices.len());
    let mut markers = Vec::with_capacity(slices.len());
    let mut masks = Vec::with_capacity(slices.len());
    for s in slices {
        labels.push(s.labels);
        markers.push(s.markers);
        masks.push(s.growth_mask);
    }
    let stacked = restack(shape, labels)?;
    Ok(Grown {
        labels: stitch(&stacked, &cfg.slice_matching)?,
        markers: restack(shape, markers)?,
        growth_mask: restack(shape, masks)?,
    })
}

/// Run the instance predictor and grow its detections inside the semantic mask.
///
/// Without a semantic result the predictor's own foreground bounds growth.
pub(crate) fn run_instance_stage(
    image: &ArrayD<f32>,
    layout: Layout,
    predictor: &dyn InstancePredictor,
    semantic: Option<&SemanticMaskOutput>,
    cfg: &ReconcileConfig,
) -> Result<InstanceOutcome> {
    let input = if cfg.normalize.enable {
        normalize_percentile(
            image,
            cfg.normalize.lower_percentile,
            cfg.normalize.upper_percentile,
        )
    } else {
        image.clone()
    };
    let prediction = predictor
        .predict(
            &input,
            layout,
            &cfg.n_tiles,
            cfg.instance.prob_thresh,
            cfg.instance.nms_thresh,
        )
        .map_err(predictor_failed("instance"))?;

    let predicted = validate_labels(&prediction.labels)?;
    if predicted.shape() != image.shape() {
        return Err(ReconcileError::ShapeMismatch {
            what: "instance labels",
            expected: image.shape().to_vec(),
            got: predicted.shape().to_vec(),
        });
    }
    let fields = prepare_instance_fields(
        &prediction,
        &predictor.grid(),
        image.shape(),
        cfg.instance.global_threshold,
    )?;
    let field = if cfg.instance.use_probability {
        &fields.probability
    } else {
        &fields.distance
    };

    let own_mask;
    let mask = match semantic {
        Some(s) => s.growth_mask(),
        None => {
            own_mask = predicted.mapv(|v| v != 0);
            &own_mask
        }
    };

    let per_slice = cfg.instance.grow_per_slice && layout.is_volumetric();
    let grown = if per_slice {
        grow_per_slice(&predicted, mask, field, cfg)?
    } else {
        grow(&predicted, mask, field, cfg)?
    };

    let suppressed = suppress_duplicates(&grown.labels, cfg.instance_nms_thresh(), cfg.nms.z_thresh);
    // stitched slices can reuse an id for disjoint regions; cleaning splits them
    let labels = if per_slice {
        clean_labels(&suppressed, &cfg.clean)
    } else {
        relabel_sequential(&suppressed)
    };
    tracing::info!(
        predicted = crate::fusion::clean::region_count(&predicted),
        grown = crate::fusion::clean::region_count(&labels),
        per_slice,
        "instance labels grown"
    );
    Ok(InstanceOutcome {
        labels,
        predicted,
        probability: fields.probability,
        markers: grown.markers,
        growth_mask: grown.growth_mask,
        stitched: per_slice,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{blurred_field, disks};
    use approx::assert_abs_diff_eq;
    use ndarray::IxDyn;

    #[test]
    fn downsampled_fields_are_brought_to_label_shape() {
        let prediction = InstancePrediction {
            labels: ArrayD::zeros(IxDyn(&[8, 9])),
            probability: ArrayD::from_elem(IxDyn(&[4, 5]), 0.5),
            distance: ArrayD::from_shape_fn(IxDyn(&[4, 5, 3]), |ix| ix[2] as f32),
        };
        let fields = prepare_instance_fields(&prediction, &[2, 2], &[8, 9], 1e-2).unwrap();
        assert_eq!(fields.probability.shape(), &[8, 9]);
        assert_eq!(fields.distance.shape(), &[8, 9]);
        assert_abs_diff_eq!(fields.probability[IxDyn(&[3, 3])], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(fields.distance[IxDyn(&[7, 7])], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn weak_probability_is_zeroed() {
        let prediction = InstancePrediction {
            labels: ArrayD::zeros(IxDyn(&[2, 2])),
            probability: ArrayD::from_elem(IxDyn(&[2, 2]), 0.005),
            distance: ArrayD::zeros(IxDyn(&[2, 2])),
        };
        let fields = prepare_instance_fields(&prediction, &[], &[2, 2], 1e-2).unwrap();
        assert!(fields.probability.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn mismatched_grid_is_rejected() {
        let prediction = InstancePrediction {
            labels: ArrayD::zeros(IxDyn(&[2, 2])),
            probability: ArrayD::zeros(IxDyn(&[2, 2])),
            distance: ArrayD::zeros(IxDyn(&[2, 2])),
        };
        assert!(prepare_instance_fields(&prediction, &[1, 1, 1], &[2, 2], 1e-2).is_err());
    }

    #[test]
    fn per_slice_growth_keeps_identity_along_z() {
        let plane = disks([32, 32], &[([10.0, 10.0], 5.0), ([22.0, 22.0], 5.0)]);
        let instances = crate::test_utils::stack_slices(&[plane.clone(), plane.clone(), plane.clone()]);
        let mask = instances.mapv(|v| v != 0);
        let field_plane = blurred_field(&plane, 1.5);
        let field = crate::test_utils::stack_slices(&[field_plane.clone(), field_plane.clone(), field_plane]);
        let cfg = ReconcileConfig::default();
        let grown = grow_per_slice(&instances, &mask, &field, &cfg).unwrap();
        let first = grown.labels[IxDyn(&[0, 10, 10])];
        assert_ne!(first, 0);
        assert_eq!(grown.labels[IxDyn(&[2, 10, 10])], first);
        assert_ne!(grown.labels[IxDyn(&[2, 22, 22])], first);
    }
}
