//! Fusion of flow-based instances with instance-predictor detections.
//!
//! Flow labels are trusted where they exist. Instance detections the flow
//! result missed seed a watershed on the flow field, and the grown regions
//! fill in the flow result's background.

use ndarray::{ArrayD, Zip};

use super::clean::{dilate_label_holes, fill_label_holes, filter_by_size, relabel_sequential};
use super::config::{CleanConfig, FlowConfig};
use super::markers::build_markers;
use super::nms::suppress_duplicates;
use super::seeds::collect_uncovered_seeds;
use super::watershed::{grow_regions, BasinPolarity};
use crate::error::{ReconcileError, Result};
use crate::grid::morphology::{erode_mask, fill_holes};
use crate::grid::threshold::threshold_or_all;
use crate::grid::{label_regions, max_label, Connectivity};
use crate::LabelImage;

/// Parameters of [`fuse_flow_labels`] drawn from several config sections.
#[derive(Debug, Clone)]
pub struct FlowFusionParams<'a> {
    pub flow: &'a FlowConfig,
    pub clean: &'a CleanConfig,
    pub nms_thresh: f32,
    pub marker_radius: usize,
}

/// Flow labels split into connected components, with suppressed duplicates
/// and out-of-range sizes removed, numbered `1..=n`.
pub fn clean_flow_labels(flow_labels: &LabelImage, params: &FlowFusionParams<'_>) -> LabelImage {
    let (components, _) = label_regions(flow_labels, Connectivity::Full);
    let suppressed = suppress_duplicates(&components, params.nms_thresh, params.flow.z_thresh);
    relabel_sequential(&filter_by_size(
        &suppressed,
        params.clean.min_size,
        params.clean.max_size,
    ))
}

/// Combine instance labels with flow labels and their flow field.
pub fn fuse_flow_labels(
    instances: &LabelImage,
    flow_labels: &LabelImage,
    flow_field: &ArrayD<f32>,
    params: &FlowFusionParams<'_>,
) -> Result<LabelImage> {
    for (what, shape) in [("flow labels", flow_labels.shape()), ("flow field", flow_field.shape())] {
        if shape != instances.shape() {
            return Err(ReconcileError::ShapeMismatch {
                what,
                expected: instances.shape().to_vec(),
                got: shape.to_vec(),
            });
        }
    }

    let flow_clean = clean_flow_labels(flow_labels, params);
    let seeds = collect_uncovered_seeds(instances, &flow_clean);

    let thresholded = threshold_or_all(flow_field);
    let mask = fill_holes(&erode_mask(&thresholded, params.flow.erosion_iterations));

    let markers = build_markers(&seeds, instances.shape(), params.marker_radius);
    let grown = grow_regions(flow_field, &markers, Some(&mask), BasinPolarity::Direct)?;
    let grown = dilate_label_holes(&fill_label_holes(&grown), params.flow.hole_dilation);

    // keep grown ids clear of flow ids before merging
    let offset = max_label(&flow_clean);
    let mut combined = flow_clean;
    Zip::from(&mut combined).and(&grown).for_each(|c, &g| {
        if *c == 0 && g != 0 {
            *c = g + offset;
        }
    });

    let (components, _) = label_regions(&combined, Connectivity::Full);
    let suppressed = suppress_duplicates(&components, params.nms_thresh, params.flow.z_thresh);
    let out = relabel_sequential(&fill_label_holes(&suppressed));
    tracing::info!(
        uncovered_seeds = seeds.len() - 1,
        regions = max_label(&out),
        "fused flow and instance labels"
    );
    Ok(out)
}
