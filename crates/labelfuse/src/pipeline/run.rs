//! Top-level orchestrator: per-frame reconciliation → stacking → frame linking.

use ndarray::{ArrayD, Axis};
use rayon::prelude::*;

use super::frame::reconcile_frame;
use super::result::ReconcileResult;
use crate::error::{ReconcileError, Result};
use crate::fusion::{stitch, ReconcileConfig};
use crate::predictor::{Layout, Predictors};

fn check_layout(image: &ArrayD<f32>, layout: Layout) -> Result<()> {
    if image.ndim() != layout.ndim() {
        return Err(ReconcileError::Dimension {
            expected: match layout {
                Layout::Yx => "a 2D (YX)",
                Layout::Zyx => "a 3D (ZYX)",
                Layout::Tyx => "a 3D (TYX)",
                Layout::Tzyx => "a 4D (TZYX)",
            },
            got: image.ndim(),
        });
    }
    Ok(())
}

/// Reconcile an image of any supported layout.
pub(crate) fn reconcile(
    image: &ArrayD<f32>,
    layout: Layout,
    predictors: &Predictors<'_>,
    cfg: &ReconcileConfig,
) -> Result<ReconcileResult> {
    check_layout(image, layout)?;
    if !layout.has_time() {
        return reconcile_frame(image, layout, predictors, cfg);
    }

    let spatial = layout.spatial();
    let n_frames = image.shape()[0];
    tracing::info!(frames = n_frames, layout = %layout, "reconciling time series");
    let frames = (0..n_frames)
        .into_par_iter()
        .map(|t| {
            let frame = image.index_axis(Axis(0), t).to_owned();
            reconcile_frame(&frame, spatial, predictors, cfg)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut out = ReconcileResult::stack_frames(layout, frames)?;
    if let (Some(strategy), Some(labels)) = (&cfg.frame_linking, out.instance_labels.as_ref()) {
        out.instance_labels = Some(stitch(labels, strategy)?);
        out.stages.frame_linking = true;
    }
    Ok(out)
}
