//! Reconciliation parameters.
//!
//! Every section deserializes with `#[serde(default)]`, so a JSON file only
//! needs the fields it changes.

use std::path::Path;

use crate::error::{ReconcileError, Result};

/// Semantic foreground mask construction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SemanticMaskConfig {
    /// Threshold the working image itself when no semantic predictor is supplied.
    pub threshold_image: bool,
    /// Components smaller than this (pixels/voxels) are dropped.
    pub min_size: usize,
    /// Components larger than this are dropped.
    pub max_size: usize,
    /// Per-slice closing iterations for the permissive overall mask of a
    /// volume; `None` skips the overall mask.
    pub closing_iterations: Option<usize>,
    /// Label volume slices independently and stitch them by IoU.
    pub slice_merge: bool,
}

impl Default for SemanticMaskConfig {
    fn default() -> Self {
        Self {
            threshold_image: true,
            min_size: 10,
            max_size: 10_000_000,
            closing_iterations: Some(15),
            slice_merge: false,
        }
    }
}

/// Instance-predictor driven region growing.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Probability threshold forwarded to the instance predictor.
    pub prob_thresh: Option<f32>,
    /// NMS threshold forwarded to the instance predictor; also overrides
    /// [`NmsConfig::nms_thresh`] for the instance path.
    pub nms_thresh: Option<f32>,
    /// Grow on the probability field (`true`) or the distance field.
    pub use_probability: bool,
    /// Add seeds for semantic regions no instance covers.
    pub seed_pool: bool,
    /// Probability values below this are zeroed.
    pub global_threshold: f32,
    /// Radius of the ball each seed is dilated by.
    pub marker_radius: usize,
    /// Grow each z-slice of a volume independently, then stitch.
    pub grow_per_slice: bool,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            prob_thresh: None,
            nms_thresh: None,
            use_probability: true,
            seed_pool: true,
            global_threshold: 1e-2,
            marker_radius: 2,
            grow_per_slice: false,
        }
    }
}

/// Label cleaning after growth.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    pub min_size: usize,
    pub max_size: usize,
    /// Fill topological holes of every label.
    pub fill_holes: bool,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            min_size: 10,
            max_size: 10_000_000,
            fill_holes: true,
        }
    }
}

/// Duplicate-instance suppression.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NmsConfig {
    /// Overlap ratio above which the smaller region is removed.
    pub nms_thresh: f32,
    /// Maximum centroid separation along z for two regions to be compared.
    pub z_thresh: usize,
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            nms_thresh: 0.4,
            z_thresh: 1,
        }
    }
}

/// Fusion of flow-based instances with instance-predictor seeds.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// z window for duplicate suppression of flow labels.
    pub z_thresh: usize,
    /// Erosion applied to the thresholded flow field before growing.
    pub erosion_iterations: usize,
    /// Per-label dilation closing the gaps left by hole filling.
    pub hole_dilation: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            z_thresh: 2,
            erosion_iterations: 1,
            hole_dilation: 1,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExpandConfig {
    /// Grow final labels into the background by `distance`. Turn off to
    /// keep labels at their grown extent.
    pub enable: bool,
    /// Growth distance (pixels) applied to final labels.
    pub distance: f64,
    /// Per-slice growth distance in the semantic-only path.
    pub overall_distance: f64,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            enable: true,
            distance: 1.0,
            overall_distance: 50.0,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SkeletonConfig {
    pub enable: bool,
    /// Pixels with `(1 - p) + boundary` at or above this survive into the
    /// thinning input.
    pub cutoff: f32,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            enable: true,
            cutoff: 1.2,
        }
    }
}

/// Percentile normalisation ahead of the instance predictor.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub enable: bool,
    pub lower_percentile: f32,
    pub upper_percentile: f32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            enable: true,
            lower_percentile: 1.0,
            upper_percentile: 99.8,
        }
    }
}

/// How label identity is carried from one slice or frame to the next.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Inherit the id of the previous region with IoU at or above the threshold.
    Iou { iou_threshold: f64 },
    /// Inherit the id of the nearest previous centroid within `max_distance`.
    NearestCentroid { max_distance: f64 },
}

impl Default for MatchStrategy {
    fn default() -> Self {
        Self::Iou { iou_threshold: 0.3 }
    }
}

impl MatchStrategy {
    pub fn nearest_centroid() -> Self {
        Self::NearestCentroid { max_distance: 3.0 }
    }
}

/// Top-level reconciliation configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Tiling hint forwarded to every predictor.
    pub n_tiles: Vec<usize>,
    pub semantic: SemanticMaskConfig,
    pub instance: InstanceConfig,
    pub clean: CleanConfig,
    pub nms: NmsConfig,
    pub flow: FlowConfig,
    pub expand: ExpandConfig,
    pub skeleton: SkeletonConfig,
    pub normalize: NormalizeConfig,
    /// Stitching of slice-wise results inside one volume.
    pub slice_matching: MatchStrategy,
    /// Stitching of final labels across time frames; `None` leaves frames independent.
    pub frame_linking: Option<MatchStrategy>,
}

impl ReconcileConfig {
    /// Load a (possibly partial) JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| ReconcileError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&data)
            .map_err(|e| ReconcileError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Duplicate-suppression threshold used on the instance path.
    pub fn instance_nms_thresh(&self) -> f32 {
        self.instance.nms_thresh.unwrap_or(self.nms.nms_thresh)
    }
}
