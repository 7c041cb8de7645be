use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use labelfuse::fusion::{
    build_markers, collect_seeds, expand_labels, fill_label_holes, grow_regions, BasinPolarity,
};
use labelfuse::LabelImage;

/// Random non-overlapping-ish disks with a hole punched in each.
fn make_cells(h: usize, w: usize, n: usize, seed: u64) -> LabelImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut labels = ArrayD::zeros(IxDyn(&[h, w]));
    for id in 1..=n as u32 {
        let cy = rng.gen_range(12.0..(h as f64 - 12.0));
        let cx = rng.gen_range(12.0..(w as f64 - 12.0));
        let r = rng.gen_range(5.0f64..10.0);
        let (y0, y1) = ((cy - r).floor() as usize, (cy + r).ceil() as usize);
        let (x0, x1) = ((cx - r).floor() as usize, (cx + r).ceil() as usize);
        for y in y0..=y1.min(h - 1) {
            for x in x0..=x1.min(w - 1) {
                let d2 = (y as f64 - cy).powi(2) + (x as f64 - cx).powi(2);
                if d2 <= r * r && d2 > 2.0 && labels[IxDyn(&[y, x])] == 0 {
                    labels[IxDyn(&[y, x])] = id;
                }
            }
        }
    }
    labels
}

/// Distance-like field peaking at cell centres.
fn make_field(labels: &LabelImage) -> ArrayD<f32> {
    let inside = labels.mapv(|v| v != 0);
    let mut field = ArrayD::zeros(labels.raw_dim());
    for (ix, &v) in inside.indexed_iter() {
        if v {
            let y = ix[0] as f32;
            let x = ix[1] as f32;
            field[ix] = 0.5 + 0.5 * ((y * 0.3).sin() * (x * 0.3).cos()).abs();
        }
    }
    field
}

fn bench_expand(c: &mut Criterion) {
    let labels = make_cells(512, 512, 300, 7);
    c.bench_function("expand_labels_512x512_d3", |b| {
        b.iter(|| black_box(expand_labels(black_box(&labels), 3.0)))
    });
}

fn bench_watershed(c: &mut Criterion) {
    let labels = make_cells(512, 512, 300, 11);
    let field = make_field(&labels);
    let mask = labels.mapv(|v| v != 0);
    let seeds = collect_seeds(&labels, &mask, true).expect("fixture shapes agree");
    let markers = build_markers(&seeds.seeds, labels.shape(), 2);
    c.bench_function("grow_regions_512x512", |b| {
        b.iter(|| {
            let grown = grow_regions(
                black_box(&field),
                black_box(&markers),
                Some(&seeds.growth_mask),
                BasinPolarity::Negate,
            )
            .expect("fixture shapes agree");
            black_box(grown)
        })
    });
}

fn bench_fill_holes(c: &mut Criterion) {
    let labels = make_cells(512, 512, 300, 23);
    c.bench_function("fill_label_holes_512x512", |b| {
        b.iter(|| black_box(fill_label_holes(black_box(&labels))))
    });
}

criterion_group!(hotpaths, bench_expand, bench_watershed, bench_fill_holes);
criterion_main!(hotpaths);
