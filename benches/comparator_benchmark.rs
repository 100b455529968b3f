use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{Rgba, RgbaImage};
use refshot::compare::{ImageComparator, PixelComparator};
use std::io::Cursor;

fn encode(img: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn benchmark_pixel_comparator(c: &mut Criterion) {
    let reference = RgbaImage::from_pixel(640, 480, Rgba([200, 200, 200, 255]));
    let mut changed = reference.clone();
    for x in 100..300 {
        changed.put_pixel(x, 200, Rgba([255, 0, 0, 255]));
    }
    let reference = encode(&reference);
    let changed = encode(&changed);
    let comparator = PixelComparator::new();

    c.bench_function("pixel_compare_640x480", |b| {
        b.iter(|| {
            let result = comparator.compare(black_box(&changed), black_box(&reference));
            assert!(result.is_ok());
        })
    });
}

criterion_group!(benches, benchmark_pixel_comparator);
criterion_main!(benches);
