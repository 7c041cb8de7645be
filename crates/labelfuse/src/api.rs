//! High-level reconciliation API.
//!
//! [`Reconciler`] is the primary entry point. It wraps a
//! [`ReconcileConfig`] and runs the full pipeline against whichever
//! predictors the caller supplies.

use std::path::Path;

use ndarray::ArrayD;

use crate::error::Result;
use crate::fusion::ReconcileConfig;
use crate::pipeline::{self, ReconcileResult};
use crate::predictor::{Layout, Predictors};

/// Primary reconciliation interface.
///
/// Create once, reconcile many images.
///
/// # Examples
///
/// ```no_run
/// use labelfuse::{Layout, Predictors, Reconciler};
/// use ndarray::{ArrayD, IxDyn};
///
/// let reconciler = Reconciler::default();
/// let image = ArrayD::<f32>::zeros(IxDyn(&[256, 256]));
/// let result = reconciler
///     .reconcile(&image, Layout::Yx, &Predictors::default())
///     .unwrap();
/// println!("Found {} instances", result.instance_count());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    /// Load a JSON configuration file and create a reconciler in one step.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        Ok(Self::new(ReconcileConfig::from_json_file(path)?))
    }

    /// Replace the configuration, builder style.
    pub fn with_config(mut self, config: ReconcileConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ReconcileConfig {
        &mut self.config
    }

    /// Reconcile predictor outputs for one image.
    ///
    /// `image` must have one axis per letter of `layout`. Absent predictors
    /// skip their stages; a failing predictor aborts the call.
    pub fn reconcile(
        &self,
        image: &ArrayD<f32>,
        layout: Layout,
        predictors: &Predictors<'_>,
    ) -> Result<ReconcileResult> {
        pipeline::reconcile(image, layout, predictors, &self.config)
    }
}
