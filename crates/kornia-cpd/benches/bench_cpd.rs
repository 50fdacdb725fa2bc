use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use kornia_cpd::{AffineTransform2d, Cpd, CpdParams, PointCloud2d};

fn create_points(num_points: usize) -> Vec<[f64; 2]> {
    (0..num_points)
        .map(|i| {
            let a = i as f64 * 0.37;
            [a.cos() * (1.0 + 0.01 * i as f64), a.sin() * (2.0 + 0.02 * i as f64)]
        })
        .collect()
}

fn bench_affine_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpd_affine_step");

    let transform = AffineTransform2d {
        linear: [[1.0, 0.1], [-0.1, 1.0]],
        translation: [0.5, -0.5],
    };

    for num_points in [64, 256, 1024] {
        let source = create_points(num_points);
        let target = transform.apply(&source);

        group.bench_with_input(
            BenchmarkId::new("step", num_points),
            &(target, source),
            |b, (target, source)| {
                b.iter_batched(
                    || {
                        Cpd::affine(
                            PointCloud2d::new(target.clone()).expect("non-empty"),
                            PointCloud2d::new(source.clone()).expect("non-empty"),
                            CpdParams::default(),
                        )
                        .expect("valid params")
                    },
                    |mut cpd| {
                        std::hint::black_box(cpd.step().ok());
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_affine_step);
criterion_main!(benches);
