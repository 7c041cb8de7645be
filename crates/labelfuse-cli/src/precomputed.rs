//! Predictor adapters over precomputed rasters.
//!
//! Each adapter holds a full-image array. When the pipeline hands it a
//! region-of-interest crop, the adapter cuts the same window out of its
//! array.

use ndarray::ArrayD;

use labelfuse::predictor::{
    FlowPrediction, FlowPredictor, InstancePrediction, InstancePredictor, Layout, PredictorResult,
    RegionOfInterestPredictor, SemanticPredictor,
};
use labelfuse::{BoundingBox, LabelImage, ProbabilityField, RawLabels};

#[derive(Debug, Clone)]
pub struct Precomputed<T> {
    full: ArrayD<T>,
    window: Option<BoundingBox>,
}

impl<T: Clone> Precomputed<T> {
    pub fn new(full: ArrayD<T>, window: Option<BoundingBox>) -> Self {
        Self { full, window }
    }

    fn for_image(&self, image: &ArrayD<f32>) -> PredictorResult<ArrayD<T>> {
        if image.shape() == self.full.shape() {
            return Ok(self.full.clone());
        }
        match &self.window {
            Some(bbox) if bbox.shape() == image.shape() => Ok(bbox.crop(&self.full).to_owned()),
            _ => Err(format!(
                "precomputed raster has shape {:?}, working image has {:?}",
                self.full.shape(),
                image.shape()
            )
            .into()),
        }
    }
}

fn to_raw(labels: &LabelImage) -> PredictorResult<RawLabels> {
    let mut raw = RawLabels::zeros(labels.raw_dim());
    for (r, &l) in raw.iter_mut().zip(labels.iter()) {
        *r = i32::try_from(l).map_err(|_| format!("label id {} exceeds i32", l))?;
    }
    Ok(raw)
}

fn foreground(labels: &LabelImage) -> ProbabilityField {
    labels.mapv(|v| if v != 0 { 1.0 } else { 0.0 })
}

pub struct SemanticRaster(pub Precomputed<f32>);

impl SemanticPredictor for SemanticRaster {
    fn predict(&self, image: &ArrayD<f32>, _: Layout, _: &[usize]) -> PredictorResult<ProbabilityField> {
        self.0.for_image(image)
    }
}

pub struct RoiRaster(pub ProbabilityField);

impl RegionOfInterestPredictor for RoiRaster {
    fn predict(&self, _: &ArrayD<f32>, _: Layout, _: &[usize]) -> PredictorResult<ProbabilityField> {
        Ok(self.0.clone())
    }
}

/// Instance labels with an optional probability raster; without one the
/// label foreground stands in for probability.
pub struct InstanceRaster {
    pub labels: Precomputed<u32>,
    pub probability: Option<Precomputed<f32>>,
}

impl InstancePredictor for InstanceRaster {
    fn predict(
        &self,
        image: &ArrayD<f32>,
        _: Layout,
        _: &[usize],
        _: Option<f32>,
        _: Option<f32>,
    ) -> PredictorResult<InstancePrediction> {
        let labels = self.labels.for_image(image)?;
        let probability = match &self.probability {
            Some(p) => p.for_image(image)?,
            None => foreground(&labels),
        };
        Ok(InstancePrediction {
            labels: to_raw(&labels)?,
            distance: probability.clone(),
            probability,
        })
    }

    fn grid(&self) -> Vec<usize> {
        Vec::new()
    }
}

pub struct FlowRaster {
    pub labels: Precomputed<u32>,
    pub field: Option<Precomputed<f32>>,
}

impl FlowPredictor for FlowRaster {
    fn eval(&self, image: &ArrayD<f32>, _: Layout) -> PredictorResult<FlowPrediction> {
        let labels = self.labels.for_image(image)?;
        let field = match &self.field {
            Some(f) => f.for_image(image)?,
            None => foreground(&labels),
        };
        Ok(FlowPrediction {
            labels: to_raw(&labels)?,
            field,
        })
    }
}
