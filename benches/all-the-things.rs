use criterion::{criterion_group, criterion_main, Criterion};
use neural_style as ns;

use burn::tensor::{Distribution, Tensor};
use ns::image;

fn gram_matrix(c: &mut Criterion) {
    let device = Default::default();
    let features =
        Tensor::<ns::DefaultBackend, 4>::random([1, 64, 32, 32], Distribution::Default, &device);

    c.bench_function("gram 64x32x32", move |b| {
        b.iter(|| ns::gram_matrix(&features));
    });
}

fn toy_session(c: &mut Criterion) {
    let content = image::DynamicImage::ImageRgba8(image::RgbaImage::from_fn(16, 16, |x, y| {
        image::Rgba([(x * 16) as u8, (y * 16) as u8, 100, 255])
    }));
    let style = image::DynamicImage::ImageRgba8(image::RgbaImage::from_fn(16, 16, |x, y| {
        image::Rgba([((x + y) * 8) as u8, 50, 200, 255])
    }));

    c.bench_function("16x16 single iteration", move |b| {
        b.iter(|| {
            let device = Default::default();
            let session = ns::Session::builder()
                .content(content.clone())
                .style(style.clone())
                .layers(vec![
                    ns::Layer::conv3x3(3, 8, &device),
                    ns::Layer::activation(),
                    ns::Layer::conv3x3(8, 8, &device),
                    ns::Layer::activation(),
                ])
                .content_depths(&[2])
                .style_depths(&[1])
                .iterations(1)
                .build()
                .unwrap();
            session.run(None)
        });
    });
}

criterion_group!(benches, gram_matrix, toy_session);
criterion_main!(benches);
