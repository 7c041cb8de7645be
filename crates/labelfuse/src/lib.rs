//! labelfuse: reconciliation of pixel-predictor outputs into instance labels.
//!
//! Takes the raw outputs of independent predictors (semantic foreground,
//! star-convex instances, flow-based instances, plus optional denoising and
//! region-of-interest models) and fuses them into one consistent instance
//! labelling for 2D, 3D and time-lapse data. The stages are:
//!
//! 1. **Semantic mask** – Otsu thresholding, component filtering, hole repair
//!    and the permissive closed "overall" mask for volumes.
//! 2. **Seeds & markers** – instance centroids plus centroids of uncovered
//!    semantic components, dilated into a marker image.
//! 3. **Growth** – marker-controlled watershed restricted to the mask.
//! 4. **Cleaning** – label hole filling, size filtering, sequential ids.
//! 5. **Stitching** – IoU or nearest-centroid identity propagation across
//!    z-slices and time frames.
//! 6. **Suppression** – bounding-volume NMS between overlapping instances.
//! 7. **Expansion & skeleton** – Euclidean label growth and boundary thinning.
//! 8. **Embedding** – results computed on an ROI crop pasted back full-size.
//!
//! # Public API
//! - [`Reconciler`] and [`ReconcileConfig`] as entry points
//! - predictor traits in [`predictor`] and the [`Predictors`] bundle
//! - [`ReconcileResult`] with its serializable [`ReconcileSummary`]
//! - every stage as a free function in [`fusion`] and the array primitives
//!   in [`grid`]

mod api;
pub mod error;
pub mod fusion;
pub mod grid;
mod pipeline;
pub mod predictor;
pub mod raster;

#[cfg(test)]
pub(crate) mod test_utils;

use ndarray::ArrayD;

/// Instance labels: 0 is background, positive values are object ids.
pub type LabelImage = ArrayD<u32>;
/// Continuous interior-strength field in `[0, 1]`.
pub type ProbabilityField = ArrayD<f32>;
/// Binary foreground map.
pub type SemanticMask = ArrayD<bool>;
/// Label array as delivered by an external predictor, before validation.
pub type RawLabels = ArrayD<i32>;

pub use api::Reconciler;
pub use error::{ReconcileError, Result};
pub use fusion::{MatchStrategy, ReconcileConfig};
pub use grid::{BoundingBox, Connectivity, RegionProps};
pub use pipeline::{ReconcileResult, ReconcileSummary, StagePresence};
pub use predictor::{
    DenoisePredictor, FlowPrediction, FlowPredictor, InstancePrediction, InstancePredictor, Layout,
    PredictorError, Predictors, RegionOfInterestPredictor, SemanticPredictor,
};
