//! Conversions between 2D `image` buffers and label/field arrays.
//!
//! Arrays are indexed `[y, x]`; image buffers are `width x height`.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use ndarray::{ArrayD, IxDyn};

use crate::error::{ReconcileError, Result};
use crate::grid::max_label;
use crate::{LabelImage, SemanticMask};

/// 16-bit single-channel image, used for label rasters.
pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

fn plane_dims<T>(array: &ArrayD<T>) -> Result<(u32, u32)> {
    if array.ndim() != 2 {
        return Err(ReconcileError::Dimension {
            expected: "a 2D (YX)",
            got: array.ndim(),
        });
    }
    Ok((array.shape()[1] as u32, array.shape()[0] as u32))
}

/// Intensities scaled to `[0, 1]`.
pub fn image_to_field(img: &DynamicImage) -> ArrayD<f32> {
    let luma = img.to_luma32f();
    let (w, h) = luma.dimensions();
    ArrayD::from_shape_fn(IxDyn(&[h as usize, w as usize]), |ix| {
        luma.get_pixel(ix[1] as u32, ix[0] as u32)[0]
    })
}

/// Label ids stored as raw 8- or 16-bit gray values.
///
/// Other pixel formats are rejected; converting them would rescale ids.
pub fn image_to_labels(img: &DynamicImage) -> Result<LabelImage> {
    match img {
        DynamicImage::ImageLuma8(buf) => {
            let (w, h) = buf.dimensions();
            Ok(ArrayD::from_shape_fn(IxDyn(&[h as usize, w as usize]), |ix| {
                buf.get_pixel(ix[1] as u32, ix[0] as u32)[0] as u32
            }))
        }
        DynamicImage::ImageLuma16(buf) => Ok(luma16_to_labels(buf)),
        other => Err(ReconcileError::Shape(format!(
            "label raster must be 8- or 16-bit grayscale, got {:?}",
            other.color()
        ))),
    }
}

pub fn luma16_to_labels(img: &Gray16Image) -> LabelImage {
    let (w, h) = img.dimensions();
    ArrayD::from_shape_fn(IxDyn(&[h as usize, w as usize]), |ix| {
        img.get_pixel(ix[1] as u32, ix[0] as u32)[0] as u32
    })
}

/// Label image as a 16-bit raster; ids above `u16::MAX` are an error.
pub fn labels_to_luma16(labels: &LabelImage) -> Result<Gray16Image> {
    let (w, h) = plane_dims(labels)?;
    if max_label(labels) > u16::MAX as u32 {
        tracing::warn!(max = max_label(labels), "label ids do not fit a 16-bit raster");
        return Err(ReconcileError::LabelOverflow {
            max: u16::MAX as u32,
        });
    }
    Ok(ImageBuffer::from_fn(w, h, |x, y| {
        Luma([labels[IxDyn(&[y as usize, x as usize])] as u16])
    }))
}

/// Mask as 0/255 gray.
pub fn mask_to_gray(mask: &SemanticMask) -> Result<GrayImage> {
    let (w, h) = plane_dims(mask)?;
    Ok(ImageBuffer::from_fn(w, h, |x, y| {
        Luma([if mask[IxDyn(&[y as usize, x as usize])] { 255 } else { 0 }])
    }))
}

/// Field clamped to `[0, 1]` and scaled to 8 bits.
pub fn field_to_gray(field: &ArrayD<f32>) -> Result<GrayImage> {
    let (w, h) = plane_dims(field)?;
    Ok(ImageBuffer::from_fn(w, h, |x, y| {
        let v = field[IxDyn(&[y as usize, x as usize])];
        let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        Luma([(v * 255.0).round() as u8])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_survive_a_16_bit_raster() {
        let mut labels: LabelImage = ArrayD::zeros(IxDyn(&[3, 5]));
        labels[IxDyn(&[2, 4])] = 40_000;
        labels[IxDyn(&[0, 1])] = 7;
        let img = labels_to_luma16(&labels).unwrap();
        assert_eq!(img.dimensions(), (5, 3));
        assert_eq!(img.get_pixel(4, 2)[0], 40_000);
        assert_eq!(luma16_to_labels(&img), labels);
        let dynamic = DynamicImage::ImageLuma16(img);
        assert_eq!(image_to_labels(&dynamic).unwrap(), labels);
    }

    #[test]
    fn oversized_ids_are_rejected() {
        let labels: LabelImage = ArrayD::from_elem(IxDyn(&[2, 2]), 70_000);
        assert!(matches!(
            labels_to_luma16(&labels),
            Err(ReconcileError::LabelOverflow { max: 65535 })
        ));
    }

    #[test]
    fn volumes_cannot_be_rasterised() {
        let mask = ArrayD::from_elem(IxDyn(&[2, 2, 2]), true);
        assert!(matches!(mask_to_gray(&mask), Err(ReconcileError::Dimension { got: 3, .. })));
    }

    #[test]
    fn gray_values_map_to_unit_range() {
        let img = GrayImage::from_fn(4, 2, |x, _| Luma([if x == 3 { 255 } else { 0 }]));
        let field = image_to_field(&DynamicImage::ImageLuma8(img.clone()));
        assert_eq!(field.shape(), &[2, 4]);
        assert_eq!(field[IxDyn(&[1, 3])], 1.0);
        assert_eq!(field_to_gray(&field).unwrap(), img);
    }
}
