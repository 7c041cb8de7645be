//! Shared synthetic-data helpers for unit tests.

use image::{ImageBuffer, Luma};
use ndarray::{ArrayD, IxDyn};

use crate::LabelImage;

/// Paint a filled disk of `value` into a 2D label image (`center` is `[y, x]`).
pub(crate) fn draw_disk(labels: &mut LabelImage, center: [f64; 2], radius: f64, value: u32) {
    let (h, w) = (labels.shape()[0], labels.shape()[1]);
    for y in 0..h {
        for x in 0..w {
            let dy = y as f64 - center[0];
            let dx = x as f64 - center[1];
            if dy * dy + dx * dx <= radius * radius {
                labels[IxDyn(&[y, x])] = value;
            }
        }
    }
}

/// Paint a filled ball of `value` into a 3D label volume (`center` is `[z, y, x]`).
pub(crate) fn draw_ball(labels: &mut LabelImage, center: [f64; 3], radius: f64, value: u32) {
    let shape = labels.shape().to_vec();
    for z in 0..shape[0] {
        for y in 0..shape[1] {
            for x in 0..shape[2] {
                let d2 = (z as f64 - center[0]).powi(2)
                    + (y as f64 - center[1]).powi(2)
                    + (x as f64 - center[2]).powi(2);
                if d2 <= radius * radius {
                    labels[IxDyn(&[z, y, x])] = value;
                }
            }
        }
    }
}

/// 2D label image with one disk per `(center, radius)`, ids 1.. in order.
pub(crate) fn disks(shape: [usize; 2], blobs: &[([f64; 2], f64)]) -> LabelImage {
    let mut labels = ArrayD::zeros(IxDyn(&shape));
    for (i, &(center, radius)) in blobs.iter().enumerate() {
        draw_disk(&mut labels, center, radius, i as u32 + 1);
    }
    labels
}

/// Smooth interior-probability field of a 2D label image: foreground is
/// 1, background 0, Gaussian-blurred via `imageproc` and rescaled to peak 1.
pub(crate) fn blurred_field(labels: &LabelImage, sigma: f32) -> ArrayD<f32> {
    let (h, w) = (labels.shape()[0], labels.shape()[1]);
    let mut img = ImageBuffer::<Luma<f32>, Vec<f32>>::new(w as u32, h as u32);
    for y in 0..h {
        for x in 0..w {
            let v = if labels[IxDyn(&[y, x])] != 0 { 1.0 } else { 0.0 };
            img.put_pixel(x as u32, y as u32, Luma([v]));
        }
    }
    let blurred = imageproc::filter::gaussian_blur_f32(&img, sigma);
    let peak = blurred.pixels().map(|p| p[0]).fold(0.0f32, f32::max).max(1e-6);
    let mut out = ArrayD::zeros(IxDyn(&[h, w]));
    for y in 0..h {
        for x in 0..w {
            out[IxDyn(&[y, x])] = blurred.get_pixel(x as u32, y as u32)[0] / peak;
        }
    }
    out
}

/// Stack 2D slices along a new leading axis.
pub(crate) fn stack_slices<T: Clone>(slices: &[ArrayD<T>]) -> ArrayD<T> {
    let views: Vec<_> = slices.iter().map(|s| s.view()).collect();
    ndarray::stack(ndarray::Axis(0), &views).expect("slices share a shape")
}
