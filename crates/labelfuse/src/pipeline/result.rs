use ndarray::{ArrayD, Axis};

use crate::error::Result;
use crate::fusion::clean::region_count;
use crate::grid::BoundingBox;
use crate::predictor::Layout;
use crate::{LabelImage, ProbabilityField, SemanticMask};

/// Which pipeline stages actually ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StagePresence {
    pub denoise: bool,
    pub roi: bool,
    pub semantic: bool,
    pub instance: bool,
    pub flow: bool,
    /// Flow and instance labels were fused.
    pub fusion: bool,
    /// Slice-wise growth results were stitched along z.
    pub slice_stitching: bool,
    pub expansion: bool,
    pub skeleton: bool,
    pub frame_linking: bool,
}

/// Reconciled outputs for one image (all frames of a time series stacked).
///
/// Every array has the full input shape; channels whose stage did not run
/// are `None`.
#[derive(Debug, Clone)]
pub struct ReconcileResult {
    pub layout: Layout,
    pub shape: Vec<usize>,
    pub stages: StagePresence,
    /// Final instance labelling.
    pub instance_labels: Option<LabelImage>,
    /// Connected components of the semantic mask.
    pub semantic_labels: Option<LabelImage>,
    /// Mask that bounds the final labels.
    pub semantic_mask: Option<SemanticMask>,
    /// Permissive closed mask (volumes).
    pub overall_mask: Option<SemanticMask>,
    /// Validated instance-predictor labels before growth.
    pub predicted_instances: Option<LabelImage>,
    /// Full-resolution instance probability.
    pub probability: Option<ProbabilityField>,
    pub markers: Option<LabelImage>,
    pub skeleton: Option<SemanticMask>,
    /// Validated flow-predictor labels.
    pub flow_labels: Option<LabelImage>,
    /// Denoised image, negative values clamped to 0.
    pub denoised: Option<ArrayD<f32>>,
    /// Thresholded region-of-interest field, in the field's own shape.
    pub roi_mask: Option<SemanticMask>,
    /// Crop box of the region of interest in image coordinates.
    pub roi_bbox: Option<BoundingBox>,
}

impl ReconcileResult {
    /// Result with no channels for an image of `shape`.
    pub fn empty(layout: Layout, shape: &[usize]) -> Self {
        Self {
            layout,
            shape: shape.to_vec(),
            stages: StagePresence::default(),
            instance_labels: None,
            semantic_labels: None,
            semantic_mask: None,
            overall_mask: None,
            predicted_instances: None,
            probability: None,
            markers: None,
            skeleton: None,
            flow_labels: None,
            denoised: None,
            roi_mask: None,
            roi_bbox: None,
        }
    }

    /// Number of final instances.
    pub fn instance_count(&self) -> usize {
        self.instance_labels.as_ref().map_or(0, region_count)
    }

    /// Serializable overview of the result.
    pub fn summary(&self) -> ReconcileSummary {
        let count = |m: &Option<SemanticMask>| m.as_ref().map(|m| m.iter().filter(|&&v| v).count());
        ReconcileSummary {
            layout: self.layout,
            shape: self.shape.clone(),
            stages: self.stages,
            instance_count: self.instance_count(),
            semantic_regions: self.semantic_labels.as_ref().map(region_count),
            semantic_foreground: count(&self.semantic_mask),
            marker_count: self.markers.as_ref().map(region_count),
            skeleton_pixels: count(&self.skeleton),
            roi_bbox: self.roi_bbox.clone(),
        }
    }

    /// Stack per-frame results along a new leading time axis.
    ///
    /// A channel present in only some frames is filled with zeros in the
    /// others. The ROI box becomes the union of the per-frame boxes.
    pub(crate) fn stack_frames(layout: Layout, frames: Vec<ReconcileResult>) -> Result<Self> {
        let mut shape = vec![frames.len()];
        if let Some(first) = frames.first() {
            shape.extend_from_slice(&first.shape);
        }
        let mut out = Self::empty(layout, &shape);
        for f in &frames {
            let s = &mut out.stages;
            let t = f.stages;
            s.denoise |= t.denoise;
            s.roi |= t.roi;
            s.semantic |= t.semantic;
            s.instance |= t.instance;
            s.flow |= t.flow;
            s.fusion |= t.fusion;
            s.slice_stitching |= t.slice_stitching;
            s.expansion |= t.expansion;
            s.skeleton |= t.skeleton;
        }

        out.instance_labels = stack_channel(&frames, |f| f.instance_labels.as_ref())?;
        out.semantic_labels = stack_channel(&frames, |f| f.semantic_labels.as_ref())?;
        out.semantic_mask = stack_channel(&frames, |f| f.semantic_mask.as_ref())?;
        out.overall_mask = stack_channel(&frames, |f| f.overall_mask.as_ref())?;
        out.predicted_instances = stack_channel(&frames, |f| f.predicted_instances.as_ref())?;
        out.probability = stack_channel(&frames, |f| f.probability.as_ref())?;
        out.markers = stack_channel(&frames, |f| f.markers.as_ref())?;
        out.skeleton = stack_channel(&frames, |f| f.skeleton.as_ref())?;
        out.flow_labels = stack_channel(&frames, |f| f.flow_labels.as_ref())?;
        out.denoised = stack_channel(&frames, |f| f.denoised.as_ref())?;
        out.roi_mask = stack_channel(&frames, |f| f.roi_mask.as_ref())?;

        out.roi_bbox = frames
            .iter()
            .enumerate()
            .filter_map(|(t, f)| f.roi_bbox.as_ref().map(|b| (t, b)))
            .fold(None, |acc: Option<BoundingBox>, (t, b)| {
                let mut framed = BoundingBox::new(vec![t], vec![t + 1]);
                framed.min.extend_from_slice(&b.min);
                framed.max.extend_from_slice(&b.max);
                Some(match acc {
                    None => framed,
                    Some(mut acc) => {
                        acc.include(&framed.min);
                        acc.include(&framed.max.iter().map(|&v| v - 1).collect::<Vec<_>>());
                        acc
                    }
                })
            });
        Ok(out)
    }
}

fn stack_channel<T, F>(frames: &[ReconcileResult], get: F) -> Result<Option<ArrayD<T>>>
where
    T: Clone + Default,
    F: Fn(&ReconcileResult) -> Option<&ArrayD<T>>,
{
    let Some(template) = frames.iter().find_map(&get) else {
        return Ok(None);
    };
    let filler = ArrayD::<T>::default(template.raw_dim());
    let views: Vec<_> = frames
        .iter()
        .map(|f| get(f).unwrap_or(&filler).view())
        .collect();
    Ok(Some(ndarray::stack(Axis(0), &views)?))
}

/// Compact, serializable description of a [`ReconcileResult`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ReconcileSummary {
    pub layout: Layout,
    pub shape: Vec<usize>,
    pub stages: StagePresence,
    pub instance_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_regions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_foreground: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton_pixels: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roi_bbox: Option<BoundingBox>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn frame(value: u32, with_mask: bool) -> ReconcileResult {
        let mut r = ReconcileResult::empty(Layout::Yx, &[2, 3]);
        r.instance_labels = Some(ArrayD::from_elem(IxDyn(&[2, 3]), value));
        if with_mask {
            r.semantic_mask = Some(ArrayD::from_elem(IxDyn(&[2, 3]), true));
            r.roi_bbox = Some(BoundingBox::new(vec![0, 1], vec![1, 3]));
        }
        r.stages.instance = true;
        r
    }

    #[test]
    fn frames_stack_along_a_leading_axis() {
        let out = ReconcileResult::stack_frames(Layout::Tyx, vec![frame(1, true), frame(2, false)]).unwrap();
        assert_eq!(out.shape, vec![2, 2, 3]);
        let labels = out.instance_labels.unwrap();
        assert_eq!(labels.shape(), &[2, 2, 3]);
        assert_eq!(labels[IxDyn(&[1, 0, 0])], 2);
        let mask = out.semantic_mask.unwrap();
        assert!(mask[IxDyn(&[0, 1, 2])]);
        assert!(!mask[IxDyn(&[1, 1, 2])]);
        assert!(out.probability.is_none());
        assert!(out.stages.instance);
        assert_eq!(out.roi_bbox, Some(BoundingBox::new(vec![0, 0, 1], vec![1, 1, 3])));
    }

    #[test]
    fn summary_serializes_without_absent_channels() {
        let json = serde_json::to_string(&frame(3, false).summary()).unwrap();
        assert!(json.contains("\"instance_count\":1"));
        assert!(!json.contains("skeleton_pixels"));
        assert!(json.contains("\"layout\":\"YX\""));
    }
}
