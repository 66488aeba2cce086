//! Benchmarks for shader generation and CPU-side operations.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{Vec3, Vec4};

use triad::technique::integrate_reference;
use triad::{shaders, ForceField};

fn bench_shader_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("shader_gen");

    group.bench_function("compute_step", |b| {
        b.iter(|| black_box(shaders::compute_step_shader(5, 2.0, 256)))
    });

    group.bench_function("stream_step", |b| {
        b.iter(|| black_box(shaders::stream_step_shader(5, 2.0)))
    });

    group.bench_function("image_update", |b| {
        b.iter(|| black_box(shaders::image_update_shader(5, 2.0, 512)))
    });

    group.bench_function("point_from_buffer", |b| {
        b.iter(|| black_box(shaders::point_shader_from_buffer()))
    });

    group.bench_function("point_from_texture", |b| {
        b.iter(|| black_box(shaders::point_shader_from_texture(512)))
    });

    group.finish();
}

fn bench_force_field(c: &mut Criterion) {
    let mut group = c.benchmark_group("force_field");

    for dim in [5u32, 9, 17] {
        group.bench_with_input(BenchmarkId::new("generate", dim), &dim, |b, &dim| {
            b.iter(|| black_box(ForceField::generate(dim, 2.0, 42)))
        });
    }

    let field = ForceField::generate(5, 2.0, 42);
    group.bench_function("sample", |b| {
        b.iter(|| black_box(field.sample(Vec3::new(0.3, -0.7, 1.1))))
    });

    group.finish();
}

fn bench_reference_integration(c: &mut Criterion) {
    let field = ForceField::generate(5, 2.0, 42);
    let mut group = c.benchmark_group("integrate_reference");

    for count in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::new("particles", count), &count, |b, &count| {
            let particles: Vec<(Vec4, Vec4)> = (0..count)
                .map(|i| {
                    let t = i as f32 / count as f32;
                    (
                        Vec4::new(t * 2.0 - 1.0, t, -t, 1.0),
                        Vec4::new(t, 1.0 - t, 0.5, 0.0),
                    )
                })
                .collect();
            b.iter(|| {
                for (p, v) in &particles {
                    black_box(integrate_reference(&field, *p, *v, 1.0 / 60.0));
                }
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_shader_generation,
    bench_force_field,
    bench_reference_integration,
);
criterion_main!(benches);
