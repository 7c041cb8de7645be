//! Region-of-interest cropping and re-embedding into full-image buffers.

use ndarray::{ArrayD, IxDyn};

use crate::error::{ReconcileError, Result};
use crate::grid::threshold::threshold_or_all;
use crate::grid::{label_mask, region_props, BoundingBox, Connectivity};
use crate::{LabelImage, ProbabilityField, SemanticMask};

/// Maps results computed on a crop back into full-image coordinates.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TileRegionEmbedder {
    full_shape: Vec<usize>,
    bbox: BoundingBox,
}

impl TileRegionEmbedder {
    /// Embedder for a crop `bbox` of an image of `full_shape`.
    pub fn new(full_shape: &[usize], bbox: BoundingBox) -> Result<Self> {
        let fits = bbox.ndim() == full_shape.len()
            && bbox
                .min
                .iter()
                .zip(&bbox.max)
                .zip(full_shape)
                .all(|((&lo, &hi), &n)| lo < hi && hi <= n);
        if !fits {
            return Err(ReconcileError::ShapeMismatch {
                what: "region of interest",
                expected: full_shape.to_vec(),
                got: bbox.max.clone(),
            });
        }
        Ok(Self {
            full_shape: full_shape.to_vec(),
            bbox,
        })
    }

    /// The whole image: cropping and embedding are plain copies.
    pub fn identity(full_shape: &[usize]) -> Self {
        Self {
            full_shape: full_shape.to_vec(),
            bbox: BoundingBox::full(full_shape),
        }
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn full_shape(&self) -> &[usize] {
        &self.full_shape
    }

    pub fn is_identity(&self) -> bool {
        self.bbox.is_full(&self.full_shape)
    }

    /// Cut the region of interest out of a full-size array.
    pub fn crop<T: Clone>(&self, full: &ArrayD<T>) -> Result<ArrayD<T>> {
        self.check(full.shape(), &self.full_shape, "full-size array")?;
        if self.is_identity() {
            return Ok(full.clone());
        }
        Ok(self.bbox.crop(full).to_owned())
    }

    /// Paste a crop-sized array into a default-filled full-size buffer.
    pub fn embed<T: Clone + Default>(&self, part: &ArrayD<T>) -> Result<ArrayD<T>> {
        self.check(part.shape(), &self.bbox.shape(), "cropped array")?;
        if self.is_identity() {
            return Ok(part.clone());
        }
        let mut out = ArrayD::default(IxDyn(&self.full_shape));
        self.bbox.crop_mut(&mut out).assign(part);
        Ok(out)
    }

    fn check(&self, got: &[usize], expected: &[usize], what: &'static str) -> Result<()> {
        if got != expected {
            return Err(ReconcileError::ShapeMismatch {
                what,
                expected: expected.to_vec(),
                got: got.to_vec(),
            });
        }
        Ok(())
    }
}

/// Bounding box of the largest region (first in label order on ties).
pub fn largest_region_bbox(labels: &LabelImage) -> Option<BoundingBox> {
    let mut best: Option<(usize, BoundingBox)> = None;
    for r in region_props(labels) {
        if best.as_ref().map_or(true, |(area, _)| r.area > *area) {
            best = Some((r.area, r.bbox));
        }
    }
    best.map(|(_, bbox)| bbox)
}

/// Located region of interest.
#[derive(Debug, Clone)]
pub struct RoiLocation {
    /// Thresholded ROI field, in the field's own dimensionality.
    pub mask: SemanticMask,
    /// Crop box in image coordinates.
    pub bbox: BoundingBox,
}

/// Threshold an ROI probability field and box its largest component.
///
/// A 2D field for a 3D image yields a box spanning every z-slice. Returns
/// `None` when the field holds no foreground.
pub fn locate_roi(field: &ProbabilityField, image_shape: &[usize]) -> Result<Option<RoiLocation>> {
    let plane_only = field.ndim() + 1 == image_shape.len();
    let expected = if plane_only {
        &image_shape[1..]
    } else {
        image_shape
    };
    if field.shape() != expected {
        return Err(ReconcileError::ShapeMismatch {
            what: "region-of-interest field",
            expected: expected.to_vec(),
            got: field.shape().to_vec(),
        });
    }
    let mask = threshold_or_all(field);
    let (components, _) = label_mask(&mask, Connectivity::Full);
    let Some(bbox) = largest_region_bbox(&components) else {
        tracing::warn!("region of interest not found, processing the whole image");
        return Ok(None);
    };
    let bbox = if plane_only {
        bbox.with_leading_axis(image_shape[0])
    } else {
        bbox
    };
    tracing::info!(min = ?bbox.min, max = ?bbox.max, "region of interest located");
    Ok(Some(RoiLocation { mask, bbox }))
}
