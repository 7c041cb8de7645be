//! Reconciliation of a single spatial frame (2D image or 3D volume).

use ndarray::ArrayD;

use super::instance::{run_instance_stage, InstanceOutcome};
use super::result::ReconcileResult;
use crate::error::{ReconcileError, Result};
use crate::fusion::flow::clean_flow_labels;
use crate::fusion::semantic_mask::SemanticMaskOutput;
use crate::fusion::{
    boundary_skeleton, build_semantic_mask, clean_labels, clip_to_mask, expand_labels,
    expand_labels_per_slice, expand_mask, fuse_flow_labels, locate_roi, probability_skeleton,
    validate_labels, CleanConfig, FlowFusionParams, ReconcileConfig, TileRegionEmbedder,
};
use crate::predictor::{predictor_failed, Layout, Predictors};
use crate::{LabelImage, SemanticMask};

fn check_shape(what: &'static str, expected: &[usize], got: &[usize]) -> Result<()> {
    if expected != got {
        return Err(ReconcileError::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            got: got.to_vec(),
        });
    }
    Ok(())
}

fn embed_channel<T: Clone + Default>(
    embedder: &TileRegionEmbedder,
    channel: Option<ArrayD<T>>,
) -> Result<Option<ArrayD<T>>> {
    channel.map(|c| embedder.embed(&c)).transpose()
}

struct PrimaryOutcome {
    semantic: Option<SemanticMaskOutput>,
    instance: Option<InstanceOutcome>,
}

// ── semantic + instance ──

fn run_semantic_stage(
    image: &ArrayD<f32>,
    layout: Layout,
    predictors: &Predictors<'_>,
    cfg: &ReconcileConfig,
) -> Result<Option<SemanticMaskOutput>> {
    let predicted;
    let field = match predictors.semantic {
        Some(p) => {
            predicted = p
                .predict(image, layout, &cfg.n_tiles)
                .map_err(predictor_failed("semantic"))?;
            check_shape("semantic probability", image.shape(), predicted.shape())?;
            &predicted
        }
        None if cfg.semantic.threshold_image => image,
        None => return Ok(None),
    };
    build_semantic_mask(field, &cfg.semantic, &cfg.slice_matching).map(Some)
}

fn run_primary(
    image: &ArrayD<f32>,
    layout: Layout,
    predictors: &Predictors<'_>,
    cfg: &ReconcileConfig,
) -> Result<PrimaryOutcome> {
    let semantic = run_semantic_stage(image, layout, predictors, cfg)?;
    let instance = match predictors.instance {
        Some(p) => Some(run_instance_stage(image, layout, p, semantic.as_ref(), cfg)?),
        None => None,
    };
    Ok(PrimaryOutcome { semantic, instance })
}

// ── frame ──

/// Reconcile one frame; `layout` must be a spatial layout.
pub(crate) fn reconcile_frame(
    image: &ArrayD<f32>,
    layout: Layout,
    predictors: &Predictors<'_>,
    cfg: &ReconcileConfig,
) -> Result<ReconcileResult> {
    let mut out = ReconcileResult::empty(layout, image.shape());

    let denoised = match predictors.denoise {
        Some(p) => {
            let d = p
                .predict(image, layout, &cfg.n_tiles)
                .map_err(predictor_failed("denoise"))?;
            check_shape("denoised image", image.shape(), d.shape())?;
            out.stages.denoise = true;
            Some(d.mapv(|v| v.max(0.0)))
        }
        None => None,
    };
    let working = denoised.as_ref().unwrap_or(image);

    let embedder = match predictors.roi {
        Some(p) => {
            let field = p
                .predict(working, layout, &cfg.n_tiles)
                .map_err(predictor_failed("roi"))?;
            out.stages.roi = true;
            match locate_roi(&field, working.shape())? {
                Some(loc) => {
                    out.roi_mask = Some(loc.mask);
                    out.roi_bbox = Some(loc.bbox.clone());
                    TileRegionEmbedder::new(working.shape(), loc.bbox)?
                }
                None => TileRegionEmbedder::identity(working.shape()),
            }
        }
        None => TileRegionEmbedder::identity(working.shape()),
    };
    let cropped = embedder.crop(working)?;

    let (primary, flow) = rayon::join(
        || run_primary(&cropped, layout, predictors, cfg),
        || {
            predictors
                .flow
                .map(|p| p.eval(&cropped, layout).map_err(predictor_failed("flow")))
                .transpose()
        },
    );
    let PrimaryOutcome { semantic, instance } = primary?;
    let flow = match flow? {
        Some(f) => {
            let labels = validate_labels(&f.labels)?;
            check_shape("flow labels", cropped.shape(), labels.shape())?;
            check_shape("flow field", cropped.shape(), f.field.shape())?;
            Some((labels, f.field))
        }
        None => None,
    };
    out.stages.semantic = semantic.is_some();
    out.stages.instance = instance.is_some();
    out.stages.flow = flow.is_some();
    out.stages.slice_stitching = instance.as_ref().map_or(false, |i| i.stitched);

    // the mask the final labels must respect
    let mut mask: Option<SemanticMask> = match (&semantic, &instance) {
        (Some(_), Some(i)) => Some(i.growth_mask.clone()),
        (Some(s), None) => Some(s.growth_mask().clone()),
        (None, _) => None,
    };
    let mut semantic_labels = semantic.as_ref().map(|s| s.labels.clone());

    let params = FlowFusionParams {
        flow: &cfg.flow,
        clean: &cfg.clean,
        nms_thresh: cfg.nms.nms_thresh,
        marker_radius: cfg.instance.marker_radius,
    };
    let semantic_only = instance.is_none() && flow.is_none();
    let labels: Option<LabelImage> = match (&instance, &flow) {
        (Some(i), Some((flow_labels, flow_field))) => {
            out.stages.fusion = true;
            Some(fuse_flow_labels(&i.labels, flow_labels, flow_field, &params)?)
        }
        (Some(i), None) => Some(i.labels.clone()),
        (None, Some((flow_labels, _))) => Some(clean_flow_labels(flow_labels, &params)),
        (None, None) => semantic_labels.clone(),
    };

    let overall = semantic.as_ref().and_then(|s| s.overall.as_ref());
    let labels = match labels {
        Some(l) if cfg.expand.enable => {
            out.stages.expansion = true;
            match overall {
                Some(_) if semantic_only => {
                    Some(expand_labels_per_slice(&l, cfg.expand.overall_distance))
                }
                _ => {
                    let d = cfg.expand.distance;
                    mask = mask.map(|m| expand_mask(&m, d));
                    semantic_labels = semantic_labels.map(|s| expand_labels(&s, d));
                    Some(expand_labels(&l, d))
                }
            }
        }
        other => other,
    };

    // clipping can cut an id into pieces; each piece becomes its own region
    let split = CleanConfig {
        fill_holes: false,
        ..cfg.clean.clone()
    };
    let labels = match (labels, &mask) {
        (Some(l), Some(m)) => Some(clean_labels(&clip_to_mask(&l, m)?, &split)),
        (l, _) => l,
    };

    let skeleton = match &labels {
        Some(l) if cfg.skeleton.enable => {
            out.stages.skeleton = true;
            Some(match &instance {
                Some(i) => probability_skeleton(l, &i.probability, cfg.skeleton.cutoff)?,
                None => boundary_skeleton(l),
            })
        }
        _ => None,
    };

    tracing::info!(
        shape = ?image.shape(),
        instances = labels.as_ref().map_or(0, crate::fusion::clean::region_count),
        semantic = out.stages.semantic,
        instance = out.stages.instance,
        flow = out.stages.flow,
        cropped = !embedder.is_identity(),
        "frame reconciled"
    );

    let overall = semantic.as_ref().and_then(|s| s.overall.clone());
    let (predicted, probability, markers) = match instance {
        Some(i) => (Some(i.predicted), Some(i.probability), Some(i.markers)),
        None => (None, None, None),
    };
    out.instance_labels = embed_channel(&embedder, labels)?;
    out.semantic_labels = embed_channel(&embedder, semantic_labels)?;
    out.semantic_mask = embed_channel(&embedder, mask)?;
    out.overall_mask = embed_channel(&embedder, overall)?;
    out.predicted_instances = embed_channel(&embedder, predicted)?;
    out.probability = embed_channel(&embedder, probability)?;
    out.markers = embed_channel(&embedder, markers)?;
    out.skeleton = embed_channel(&embedder, skeleton)?;
    out.flow_labels = embed_channel(&embedder, flow.map(|(l, _)| l))?;
    out.denoised = denoised;
    Ok(out)
}
