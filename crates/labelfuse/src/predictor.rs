//! Injected predictor capabilities.
//!
//! The engine never runs inference itself. Callers hand in implementations
//! of these traits; any of them may be absent, which simply skips the
//! stages that depend on it. Every predictor sees one spatial frame (2D or
//! 3D) at a time, described by its spatial [`Layout`].

use std::str::FromStr;

use ndarray::ArrayD;

use crate::error::ReconcileError;
use crate::{ProbabilityField, RawLabels};

/// Error type predictors report; wrapped as [`ReconcileError::Predictor`].
pub type PredictorError = Box<dyn std::error::Error + Send + Sync>;

pub type PredictorResult<T> = std::result::Result<T, PredictorError>;

/// Axis layout of an input image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Layout {
    Yx,
    Zyx,
    /// Time series of 2D frames.
    Tyx,
    /// Time series of 3D frames.
    Tzyx,
}

impl Layout {
    /// Parse an axis string such as `"ZYX"` (case-insensitive).
    pub fn from_axes(axes: &str) -> Result<Self, ReconcileError> {
        match axes.trim().to_ascii_uppercase().as_str() {
            "YX" => Ok(Self::Yx),
            "ZYX" => Ok(Self::Zyx),
            "TYX" => Ok(Self::Tyx),
            "TZYX" => Ok(Self::Tzyx),
            _ => Err(ReconcileError::InvalidLayout {
                axes: axes.to_string(),
            }),
        }
    }

    pub fn axes(self) -> &'static str {
        match self {
            Self::Yx => "YX",
            Self::Zyx => "ZYX",
            Self::Tyx => "TYX",
            Self::Tzyx => "TZYX",
        }
    }

    pub fn ndim(self) -> usize {
        self.axes().len()
    }

    pub fn has_time(self) -> bool {
        matches!(self, Self::Tyx | Self::Tzyx)
    }

    /// Layout of a single frame.
    pub fn spatial(self) -> Self {
        match self {
            Self::Yx | Self::Tyx => Self::Yx,
            Self::Zyx | Self::Tzyx => Self::Zyx,
        }
    }

    pub fn spatial_ndim(self) -> usize {
        self.spatial().ndim()
    }

    pub fn is_volumetric(self) -> bool {
        self.spatial() == Self::Zyx
    }
}

impl FromStr for Layout {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_axes(s)
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.axes())
    }
}

/// Foreground probability predictor.
pub trait SemanticPredictor: Send + Sync {
    fn predict(
        &self,
        image: &ArrayD<f32>,
        layout: Layout,
        n_tiles: &[usize],
    ) -> PredictorResult<ProbabilityField>;
}

/// Raw output of an instance predictor.
#[derive(Debug, Clone)]
pub struct InstancePrediction {
    /// Instance labels at full image resolution.
    pub labels: RawLabels,
    /// Object probability, possibly downsampled by [`InstancePredictor::grid`].
    pub probability: ProbabilityField,
    /// Distance field, downsampled like `probability`; may carry one extra
    /// trailing axis (per-ray distances) that is max-projected away.
    pub distance: ArrayD<f32>,
}

/// Instance/boundary predictor (star-convex style).
pub trait InstancePredictor: Send + Sync {
    fn predict(
        &self,
        image: &ArrayD<f32>,
        layout: Layout,
        n_tiles: &[usize],
        prob_thresh: Option<f32>,
        nms_thresh: Option<f32>,
    ) -> PredictorResult<InstancePrediction>;

    /// Per-axis downsampling factor of the auxiliary fields.
    fn grid(&self) -> Vec<usize>;
}

/// Raw output of a flow-based predictor.
#[derive(Debug, Clone)]
pub struct FlowPrediction {
    pub labels: RawLabels,
    /// Continuous field at full resolution (cell probability or flow magnitude).
    pub field: ArrayD<f32>,
}

/// Flow-based instance predictor.
pub trait FlowPredictor: Send + Sync {
    fn eval(&self, image: &ArrayD<f32>, layout: Layout) -> PredictorResult<FlowPrediction>;
}

/// Image restoration applied before every other predictor.
pub trait DenoisePredictor: Send + Sync {
    fn predict(
        &self,
        image: &ArrayD<f32>,
        layout: Layout,
        n_tiles: &[usize],
    ) -> PredictorResult<ArrayD<f32>>;
}

/// Coarse region-of-interest predictor.
///
/// For a 3D frame it may return either a 3D field or a 2D (YX) field that
/// applies to every z-slice.
pub trait RegionOfInterestPredictor: Send + Sync {
    fn predict(
        &self,
        image: &ArrayD<f32>,
        layout: Layout,
        n_tiles: &[usize],
    ) -> PredictorResult<ProbabilityField>;
}

/// The set of predictors available for one reconciliation call.
#[derive(Clone, Copy, Default)]
pub struct Predictors<'a> {
    pub semantic: Option<&'a dyn SemanticPredictor>,
    pub instance: Option<&'a dyn InstancePredictor>,
    pub flow: Option<&'a dyn FlowPredictor>,
    pub denoise: Option<&'a dyn DenoisePredictor>,
    pub roi: Option<&'a dyn RegionOfInterestPredictor>,
}

impl<'a> Predictors<'a> {
    pub fn with_semantic(mut self, p: &'a dyn SemanticPredictor) -> Self {
        self.semantic = Some(p);
        self
    }

    pub fn with_instance(mut self, p: &'a dyn InstancePredictor) -> Self {
        self.instance = Some(p);
        self
    }

    pub fn with_flow(mut self, p: &'a dyn FlowPredictor) -> Self {
        self.flow = Some(p);
        self
    }

    pub fn with_denoise(mut self, p: &'a dyn DenoisePredictor) -> Self {
        self.denoise = Some(p);
        self
    }

    pub fn with_roi(mut self, p: &'a dyn RegionOfInterestPredictor) -> Self {
        self.roi = Some(p);
        self
    }
}

impl std::fmt::Debug for Predictors<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictors")
            .field("semantic", &self.semantic.is_some())
            .field("instance", &self.instance.is_some())
            .field("flow", &self.flow.is_some())
            .field("denoise", &self.denoise.is_some())
            .field("roi", &self.roi.is_some())
            .finish()
    }
}

/// Attach the failing stage to a predictor error.
pub(crate) fn predictor_failed(stage: &'static str) -> impl FnOnce(PredictorError) -> ReconcileError {
    move |source| ReconcileError::Predictor { stage, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_parse_case_insensitively() {
        assert_eq!(Layout::from_axes("zyx").unwrap(), Layout::Zyx);
        assert_eq!("TZYX".parse::<Layout>().unwrap(), Layout::Tzyx);
        assert_eq!(Layout::Tyx.spatial(), Layout::Yx);
        assert_eq!(Layout::Tzyx.spatial_ndim(), 3);
        assert!(Layout::Tyx.has_time());
        assert!(!Layout::Zyx.has_time());
    }

    #[test]
    fn unknown_axes_are_rejected() {
        match Layout::from_axes("XYC") {
            Err(ReconcileError::InvalidLayout { axes }) => assert_eq!(axes, "XYC"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn predictor_errors_name_the_stage() {
        let err = predictor_failed("semantic")("model not loaded".into());
        assert!(err.to_string().contains("semantic"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
